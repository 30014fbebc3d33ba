//! `keep_provider`: an installed Keep provider (Prometheus, Slack, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{decode, encode, ResourceHandler};
use crate::client::models::{InstallProviderRequest, InstalledProvider};
use crate::client::KeepClient;
use crate::error::{ignore_gone, ProviderError};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "keep_provider";

/// State of a `keep_provider` resource.
///
/// Fields are the schema attributes of the same name.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderState {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub name: String,
    pub auth_config: BTreeMap<String, String>,
    pub install_webhook: bool,
}

impl ProviderState {
    fn mirror(&mut self, installed: &InstalledProvider) {
        self.id = Some(installed.id.clone());
        self.provider_type = installed.provider_type.clone();
        if let Some(name) = &installed.details.name {
            self.name = name.clone();
        }
        if let Some(auth) = &installed.details.authentication {
            self.auth_config = auth
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect();
        }
    }
}

/// Handler for `keep_provider`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderResource;

impl ProviderResource {
    /// Install the provider described by `state` and return its new ID.
    async fn install(&self, client: &KeepClient, state: &ProviderState) -> Result<String, ProviderError> {
        let available = client.available_providers().await?;
        if !available.iter().any(|p| p.provider_type == state.provider_type) {
            let mut types: Vec<&str> = available.iter().map(|p| p.provider_type.as_str()).collect();
            types.sort_unstable();
            return Err(ProviderError::Validation(format!(
                "provider type '{}' is not available. Available types: [{}]",
                state.provider_type,
                types.join(", ")
            )));
        }

        let request = InstallProviderRequest {
            provider_id: state.provider_type.clone(),
            provider_name: state.name.clone(),
            auth_config: state.auth_config.clone(),
        };
        let id = client
            .install_provider(&request)
            .await?
            .id
            .ok_or_else(|| ProviderError::Parse("id missing from install response".to_string()))?;
        info!(provider_id = %id, provider_type = %state.provider_type, name = %state.name, "Provider installed");

        if state.install_webhook {
            client
                .install_provider_webhook(&state.provider_type, &id)
                .await?;
            info!(provider_id = %id, "Provider webhook installed");
        }
        Ok(id)
    }

    async fn refresh(&self, client: &KeepClient, state: &ProviderState) -> Result<Value, ProviderError> {
        let id = state.id.clone().unwrap_or_default();
        self.read(client, encode(state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("provider {} vanished after install", id)))
    }
}

#[async_trait::async_trait]
impl ResourceHandler for ProviderResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A provider installed in Keep")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Provider type, e.g. 'prometheus'"),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "auth_config",
                Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::required())
                    .sensitive()
                    .with_description("Authentication settings for the provider type"),
            )
            .with_attribute(
                "install_webhook",
                Attribute::optional_bool().with_default(json!(false)),
            )
    }

    #[instrument(skip_all, name = "keep_provider.create")]
    async fn create(&self, client: &KeepClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ProviderState = decode(&self.schema(), planned)?;
        state.id = Some(self.install(client, &state).await?);
        self.refresh(client, &state).await
    }

    #[instrument(skip_all, name = "keep_provider.read")]
    async fn read(&self, client: &KeepClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ProviderState = decode(&self.schema(), state)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        let installed = client.installed_providers().await?;
        match installed.iter().find(|p| p.id == id) {
            Some(provider) => {
                state.mirror(provider);
                Ok(Some(encode(&state)?))
            },
            None => {
                info!(provider_id = %id, "Provider not installed, removing from state");
                Ok(None)
            },
        }
    }

    #[instrument(skip_all, name = "keep_provider.update")]
    async fn update(
        &self,
        client: &KeepClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ProviderState = decode(&self.schema(), prior)?;
        let mut state: ProviderState = decode(&self.schema(), planned)?;
        state.id = prior.id.clone();

        let changed = prior.name != state.name
            || prior.auth_config != state.auth_config
            || prior.install_webhook != state.install_webhook;
        if changed {
            if let Some(old_id) = &prior.id {
                ignore_gone(client.delete_provider(&prior.provider_type, old_id).await)?;
                info!(provider_id = %old_id, "Provider removed for reinstall");
            }
            state.id = Some(self.install(client, &state).await?);
        }
        self.refresh(client, &state).await
    }

    #[instrument(skip_all, name = "keep_provider.delete")]
    async fn delete(&self, client: &KeepClient, state: Value) -> Result<(), ProviderError> {
        let state: ProviderState = decode(&self.schema(), state)?;
        match state.id {
            Some(id) => ignore_gone(client.delete_provider(&state.provider_type, &id).await),
            None => Ok(()),
        }
    }
}
