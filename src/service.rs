//! The provider lifecycle as an async trait.
//!
//! A host drives a provider through this trait: schema discovery,
//! configuration, planning, CRUD and data source reads. State and
//! configuration travel as `serde_json::Value`, shaped by the schemas the
//! provider advertises.

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::validate;

/// Operations a provider exposes to its host.
///
/// Only the provider block, the CRUD calls and data source reads need an
/// implementation. Validation falls back to checking values against the
/// advertised schema.
///
/// # Example
///
/// ```ignore
/// use keep_provider::{KeepProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = KeepProvider::new();
/// provider
///     .configure(json!({"backend_url": "http://localhost:8080", "api_key": "key"}))
///     .await?;
/// let state = provider
///     .create("keep_extraction", json!({"name": "host", "attribute": "message", "regex": "(?P<host>.*)"}))
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Everything the provider serves, with the provider block's schema.
    fn schema(&self) -> ProviderSchema;

    /// Type names only, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
        }
    }

    /// Check a provider block without applying it.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.schema().provider, &config))
    }

    /// Apply a provider block. Error diagnostics leave the provider unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release whatever `configure` set up.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource block against its schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        Ok(validate(lookup(&schema.resources, resource_type)?, &config))
    }

    /// Compute the planned state. A null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the object described by a planned state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a state from the backend. `null` means the object is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Apply a plan that did not require replacement.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Remove the object behind a state.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt an existing backend object by ID.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

    /// Check a data source block against its schema.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        Ok(validate(lookup(&schema.data_sources, data_source_type)?, &config))
    }

    /// Query a data source.
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError>;
}

fn lookup<'a>(
    schemas: &'a std::collections::BTreeMap<String, Schema>,
    type_name: &str,
) -> Result<&'a Schema, ProviderError> {
    schemas
        .get(type_name)
        .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
}
