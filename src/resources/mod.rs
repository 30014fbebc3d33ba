//! Resource handlers.
//!
//! Each handler owns one resource type: its schema, how it plans, and how
//! it maps typed state onto backend calls. Handlers never hold a client of
//! their own; the provider passes the configured [`KeepClient`] into every
//! call.

pub mod extraction;
pub mod mapping;
pub mod provider;
pub mod workflow;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::models::{ExtractionRule, MappingRule};
use crate::client::KeepClient;
use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::PlanResult;
use crate::validation::normalize;

pub use extraction::ExtractionResource;
pub use mapping::MappingResource;
pub use provider::ProviderResource;
pub use workflow::WorkflowResource;

/// Lifecycle of one resource type.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Type name, e.g. `keep_mapping`.
    fn type_name(&self) -> &'static str;

    /// Resource schema.
    fn schema(&self) -> Schema;

    /// Whether a change of `attribute` from `old` to `new` should be ignored.
    fn suppress_diff(&self, attribute: &str, old: &Value, new: &Value) -> bool {
        let _ = (attribute, old, new);
        false
    }

    /// Adjust a computed plan, e.g. to account for local file content.
    async fn customize_plan(
        &self,
        prior: Option<&Value>,
        proposed: &Value,
        plan: &mut PlanResult,
    ) -> Result<(), ProviderError> {
        let _ = (prior, proposed, plan);
        Ok(())
    }

    /// Create the remote object and return the new state.
    async fn create(&self, client: &KeepClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the remote object no longer exists.
    async fn read(&self, client: &KeepClient, state: Value)
        -> Result<Option<Value>, ProviderError>;

    /// Update the remote object and return the new state.
    async fn update(
        &self,
        client: &KeepClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. An object that is already gone is not an error.
    async fn delete(&self, client: &KeepClient, state: Value) -> Result<(), ProviderError>;

    /// Minimal state from which `read` can recover an imported object.
    fn import_state(&self, id: &str) -> Value {
        json!({ "id": id })
    }
}

/// Decode loosely-typed state into a handler's state record.
pub(crate) fn decode<T: DeserializeOwned>(schema: &Schema, value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(normalize(schema, value))
        .map_err(|e| ProviderError::Validation(format!("invalid resource state: {}", e)))
}

pub(crate) fn encode<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// A backend rule identified by ID and name.
pub(crate) trait NamedRule {
    fn rule_id(&self) -> &str;
    fn rule_name(&self) -> &str;
}

impl NamedRule for MappingRule {
    fn rule_id(&self) -> &str {
        &self.id
    }

    fn rule_name(&self) -> &str {
        &self.name
    }
}

impl NamedRule for ExtractionRule {
    fn rule_id(&self) -> &str {
        &self.id
    }

    fn rule_name(&self) -> &str {
        &self.name
    }
}

/// IDs of rules named `name`, other than `keep_id`.
pub(crate) fn same_name_ids<R: NamedRule>(rules: &[R], name: &str, keep_id: Option<&str>) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.rule_name() == name && Some(rule.rule_id()) != keep_id)
        .map(|rule| rule.rule_id().to_string())
        .collect()
}

/// Log rules that a create is about to shadow.
pub(crate) fn warn_existing<R: NamedRule>(kind: &str, rules: &[R], name: &str) {
    for id in same_name_ids(rules, name, None) {
        warn!(
            kind,
            name,
            existing_id = %id,
            "A rule with this name already exists and will be removed once the new one is created"
        );
    }
}

/// Log the outcome of removing one duplicate. Failures do not fail the apply
/// that already succeeded.
pub(crate) fn report_duplicate_removal(
    kind: &str,
    name: &str,
    id: &str,
    result: Result<(), ProviderError>,
) {
    match crate::error::ignore_gone(result) {
        Ok(()) => info!(kind, name, removed_id = %id, "Removed rule with duplicate name"),
        Err(err) => warn!(
            kind,
            name,
            duplicate_id = %id,
            error = %err,
            "Failed to remove rule with duplicate name"
        ),
    }
}
