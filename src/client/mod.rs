//! HTTP client for the Keep REST API.
//!
//! Every request carries the `X-API-Key` header. JSON requests also set
//! `Content-Type: application/json`; multipart uploads let reqwest set the
//! form boundary instead. A non-success status is decoded into a
//! [`ProviderError::Api`] or [`ProviderError::PermissionDenied`].

pub mod models;

use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ErrorResponse, ProviderError};

use models::{
    AvailableProvider, AvailableProviders, ExtractionRequest, ExtractionRule,
    InstallProviderRequest, InstallProviderResponse, InstalledProvider, MappingRequest,
    MappingRule, Workflow, WorkflowCreated,
};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

const MISSING_SCOPE: &str = "Missing scope";

/// A configured Keep backend client.
///
/// Cheap to share behind an `Arc`; reqwest pools connections internally.
#[derive(Debug, Clone)]
pub struct KeepClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KeepClient {
    /// Build a client from a resolved configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.backend_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn json_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path)
            .header(CONTENT_TYPE, "application/json")
    }

    fn json_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<RequestBuilder, ProviderError> {
        Ok(self.json_request(method, path).body(serde_json::to_vec(body)?))
    }

    /// Send a request and return the raw body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ProviderError> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, "Sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status.is_success() {
            debug!(%method, %path, status = status.as_u16(), "Request succeeded");
            Ok(body)
        } else {
            let err = decode_error(status.as_u16(), &body);
            warn!(%method, %path, status = status.as_u16(), error = %err, "Request failed");
            Err(err)
        }
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let body = self.execute(request).await?;
        serde_json::from_slice(&body).map_err(|e| {
            ProviderError::Parse(format!(
                "failed to parse response: {}. Response body: {}",
                e,
                String::from_utf8_lossy(&body)
            ))
        })
    }

    // Providers

    /// Provider types the backend can install.
    pub async fn available_providers(&self) -> Result<Vec<AvailableProvider>, ProviderError> {
        let response: AvailableProviders = self
            .execute_json(self.json_request(Method::GET, "/providers"))
            .await?;
        Ok(response.providers)
    }

    /// Installed providers with their details.
    pub async fn installed_providers(&self) -> Result<Vec<InstalledProvider>, ProviderError> {
        self.execute_json(self.json_request(Method::GET, "/providers/export"))
            .await
    }

    /// Install a provider.
    pub async fn install_provider(
        &self,
        request: &InstallProviderRequest,
    ) -> Result<InstallProviderResponse, ProviderError> {
        self.execute_json(self.json_body(Method::POST, "/providers/install", request)?)
            .await
    }

    /// Install the webhook of an installed provider.
    pub async fn install_provider_webhook(
        &self,
        provider_type: &str,
        id: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("/providers/install/webhook/{}/{}", provider_type, id);
        self.execute(self.json_request(Method::POST, &path)).await?;
        Ok(())
    }

    /// Ask the backend to test an installed provider.
    pub async fn test_provider(&self, provider_type: &str, id: &str) -> Result<(), ProviderError> {
        let path = format!("/providers/{}/{}/test", provider_type, id);
        self.execute(self.json_request(Method::POST, &path)).await?;
        Ok(())
    }

    /// Uninstall a provider.
    pub async fn delete_provider(&self, provider_type: &str, id: &str) -> Result<(), ProviderError> {
        let path = format!("/providers/{}/{}", provider_type, id);
        self.execute(self.json_request(Method::DELETE, &path)).await?;
        Ok(())
    }

    // Workflows

    /// All workflows.
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, ProviderError> {
        self.execute_json(self.json_request(Method::GET, "/workflows"))
            .await
    }

    /// A single workflow.
    pub async fn get_workflow(&self, id: &str) -> Result<Workflow, ProviderError> {
        self.execute_json(self.json_request(Method::GET, &format!("/workflows/{}", id)))
            .await
    }

    /// Create or update a workflow from its JSON form.
    pub async fn create_workflow_json(
        &self,
        workflow: &Value,
    ) -> Result<WorkflowCreated, ProviderError> {
        self.execute_json(self.json_body(Method::POST, "/workflows/json", workflow)?)
            .await
    }

    /// Upload a workflow file as multipart field `file`.
    pub async fn upload_workflow(&self, path: &Path) -> Result<WorkflowCreated, ProviderError> {
        let form = workflow_form(path).await?;
        self.execute_json(self.request(Method::POST, "/workflows").multipart(form))
            .await
    }

    /// Replace an existing workflow with the content of a file.
    pub async fn replace_workflow(
        &self,
        id: &str,
        path: &Path,
    ) -> Result<WorkflowCreated, ProviderError> {
        let form = workflow_form(path).await?;
        self.execute_json(
            self.request(Method::PUT, &format!("/workflows/{}", id))
                .multipart(form),
        )
        .await
    }

    /// Delete a workflow.
    pub async fn delete_workflow(&self, id: &str) -> Result<(), ProviderError> {
        self.execute(self.json_request(Method::DELETE, &format!("/workflows/{}", id)))
            .await?;
        Ok(())
    }

    // Mapping rules

    /// All mapping rules.
    pub async fn list_mappings(&self) -> Result<Vec<MappingRule>, ProviderError> {
        self.execute_json(self.json_request(Method::GET, "/mapping"))
            .await
    }

    /// Create a mapping rule.
    pub async fn create_mapping(
        &self,
        request: &MappingRequest,
    ) -> Result<MappingRule, ProviderError> {
        self.execute_json(self.json_body(Method::POST, "/mapping", request)?)
            .await
    }

    /// Delete a mapping rule.
    pub async fn delete_mapping(&self, id: &str) -> Result<(), ProviderError> {
        self.execute(self.json_request(Method::DELETE, &format!("/mapping/{}", id)))
            .await?;
        Ok(())
    }

    // Extraction rules

    /// All extraction rules.
    pub async fn list_extractions(&self) -> Result<Vec<ExtractionRule>, ProviderError> {
        self.execute_json(self.json_request(Method::GET, "/extraction"))
            .await
    }

    /// Create an extraction rule.
    pub async fn create_extraction(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionRule, ProviderError> {
        self.execute_json(self.json_body(Method::POST, "/extraction", request)?)
            .await
    }

    /// Update an extraction rule in place.
    pub async fn update_extraction(
        &self,
        id: &str,
        request: &ExtractionRequest,
    ) -> Result<(), ProviderError> {
        let path = format!("/extraction/{}", id);
        self.execute(self.json_body(Method::PUT, &path, request)?)
            .await?;
        Ok(())
    }

    /// Delete an extraction rule.
    pub async fn delete_extraction(&self, id: &str) -> Result<(), ProviderError> {
        self.execute(self.json_request(Method::DELETE, &format!("/extraction/{}", id)))
            .await?;
        Ok(())
    }
}

async fn workflow_form(path: &Path) -> Result<Form, ProviderError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow.yaml".to_string());
    let part = Part::bytes(content)
        .file_name(file_name)
        .mime_str("application/x-yaml")?;
    Ok(Form::new().part("file", part))
}

/// Turn a non-success response into a provider error.
pub(crate) fn decode_error(status: u16, body: &[u8]) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    if let Some(scopes) = parsed.as_ref().and_then(missing_scopes) {
        return ProviderError::PermissionDenied(ErrorResponse::new(
            "Insufficient permissions",
            format!("Missing required scopes: [{}]", scopes.join(", ")),
        ));
    }

    let response = match parsed {
        Some(Value::Object(obj)) => {
            let text = |key: &str| {
                obj.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            let (error, details) = (text("error"), text("details"));
            if !error.is_empty() || !details.is_empty() {
                Some(ErrorResponse::new(error, details))
            } else {
                obj.get("detail")
                    .and_then(Value::as_str)
                    .map(|detail| ErrorResponse::new(format!("request failed with status {}", status), detail))
            }
        },
        _ => None,
    };

    let response = response.unwrap_or_else(|| {
        ErrorResponse::new(
            format!("request failed with status {}", status),
            String::from_utf8_lossy(body).into_owned(),
        )
    });

    ProviderError::Api { status, response }
}

fn missing_scopes(body: &Value) -> Option<Vec<String>> {
    let detail = body.get("detail")?.as_object()?;
    let mut scopes: Vec<String> = detail
        .iter()
        .filter(|(_, v)| v.as_str() == Some(MISSING_SCOPE))
        .map(|(k, _)| k.clone())
        .collect();
    if scopes.is_empty() {
        return None;
    }
    scopes.sort();
    Some(scopes)
}
