//! The Keep provider: handler registry, configuration and dispatch.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::KeepClient;
use crate::config::{process_env, provider_schema, EnvLookup, ProviderConfig};
use crate::data_sources::{DataSourceHandler, MappingDataSource, WorkflowDataSource};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{
    ExtractionResource, MappingResource, ProviderResource, ResourceHandler, WorkflowResource,
};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Provider for a Keep backend.
///
/// Holds no client until [`ProviderService::configure`] succeeds; every
/// resource and data source call before that fails with
/// [`ProviderError::Configuration`].
pub struct KeepProvider {
    client: RwLock<Option<Arc<KeepClient>>>,
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>>,
    env: EnvLookup,
}

impl Default for KeepProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeepProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepProvider")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl KeepProvider {
    /// Create a provider reading fallbacks from the process environment.
    pub fn new() -> Self {
        Self::with_env(process_env)
    }

    /// Create a provider with a custom environment lookup.
    pub fn with_env(env: EnvLookup) -> Self {
        let mut resources: BTreeMap<&'static str, Box<dyn ResourceHandler>> = BTreeMap::new();
        for handler in [
            Box::new(ProviderResource) as Box<dyn ResourceHandler>,
            Box::new(WorkflowResource),
            Box::new(MappingResource),
            Box::new(ExtractionResource),
        ] {
            resources.insert(handler.type_name(), handler);
        }

        let mut data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>> = BTreeMap::new();
        for handler in [
            Box::new(WorkflowDataSource) as Box<dyn DataSourceHandler>,
            Box::new(MappingDataSource),
        ] {
            data_sources.insert(handler.type_name(), handler);
        }

        Self {
            client: RwLock::new(None),
            resources,
            data_sources,
            env,
        }
    }

    /// Whether `configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.client.read().map(|c| c.is_some()).unwrap_or(false)
    }

    /// The configured client.
    pub fn client(&self) -> Result<Arc<KeepClient>, ProviderError> {
        let guard = self
            .client
            .read()
            .map_err(|_| ProviderError::Configuration("client lock poisoned".to_string()))?;
        guard.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured; configure must succeed before any other call"
                    .to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    /// Schema diagnostics plus everything resolution reports.
    fn check_config(&self, config: &Value) -> (Vec<Diagnostic>, Option<ProviderConfig>) {
        let mut diagnostics = validate(&provider_schema(), config);
        if has_errors(&diagnostics) {
            return (diagnostics, None);
        }
        match ProviderConfig::resolve(config, self.env) {
            Ok(resolved) => (diagnostics, Some(resolved)),
            Err(errors) => {
                diagnostics.extend(errors);
                (diagnostics, None)
            },
        }
    }
}

#[async_trait::async_trait]
impl ProviderService for KeepProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, handler) in &self.resources {
            schema = schema.with_resource(*name, handler.schema());
        }
        for (name, handler) in &self.data_sources {
            schema = schema.with_data_source(*name, handler.schema());
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.check_config(&config).0)
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let (diagnostics, resolved) = self.check_config(&config);
        let Some(resolved) = resolved else {
            warn!(diagnostics = diagnostics.len(), "Provider configuration rejected");
            return Ok(diagnostics);
        };

        let client = KeepClient::new(&resolved)?;
        *self
            .client
            .write()
            .map_err(|_| ProviderError::Configuration("client lock poisoned".to_string()))? =
            Some(Arc::new(client));

        info!(config = %resolved.redacted(), "Provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        if let Ok(mut client) = self.client.write() {
            client.take();
        }
        debug!("Provider stopped");
        Ok(())
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.resource(resource_type)?;
        let plan = plan_resource(handler, prior_state, proposed_state).await?;
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Plan computed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client()?;
        handler.create(&client, planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client()?;
        Ok(handler
            .read(&client, current_state)
            .await?
            .unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client()?;
        handler.update(&client, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client()?;
        handler.delete(&client, current_state).await
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client()?;
        let state = handler
            .read(&client, handler.import_state(id))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} {}", resource_type, id)))?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        let client = self.client()?;
        handler.read(&client, config).await
    }
}
