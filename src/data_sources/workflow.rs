//! `keep_workflow` data source.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::DataSourceHandler;
use crate::client::models::Workflow;
use crate::client::KeepClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::normalize;

#[derive(Debug, Deserialize)]
struct Lookup {
    id: String,
}

/// Looks up a workflow by ID.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowDataSource;

fn json_text(value: &Value) -> Result<Option<String>, ProviderError> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(value)?))
}

fn attributes(workflow: &Workflow) -> Result<Value, ProviderError> {
    Ok(json!({
        "id": workflow.id,
        "name": workflow.name,
        "description": workflow.description,
        "created_by": workflow.created_by,
        "creation_time": workflow.creation_time,
        "triggers": json_text(&workflow.triggers)?,
        "interval": workflow.interval,
        "last_execution_time": workflow.last_execution_time,
        "last_execution_status": workflow.last_execution_status,
        "keep_providers": json_text(&workflow.providers)?,
        "workflow_raw_id": workflow.workflow_raw_id,
        "workflow_raw": workflow.workflow_raw,
        "revision": workflow.revision,
        "last_updated": workflow.last_updated,
        "invalid": workflow.invalid,
    }))
}

#[async_trait::async_trait]
impl DataSourceHandler for WorkflowDataSource {
    fn type_name(&self) -> &'static str {
        "keep_workflow"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up a Keep workflow by ID")
            .with_attribute("id", Attribute::required_string().with_description("Workflow ID"))
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("created_by", Attribute::computed_string())
            .with_attribute("creation_time", Attribute::computed_string())
            .with_attribute(
                "triggers",
                Attribute::computed_string().with_description("Triggers as JSON"),
            )
            .with_attribute("interval", Attribute::computed_int64())
            .with_attribute("last_execution_time", Attribute::computed_string())
            .with_attribute("last_execution_status", Attribute::computed_string())
            .with_attribute(
                "keep_providers",
                Attribute::computed_string().with_description("Providers used, as JSON"),
            )
            .with_attribute("workflow_raw_id", Attribute::computed_string())
            .with_attribute("workflow_raw", Attribute::computed_string())
            .with_attribute("revision", Attribute::computed_int64())
            .with_attribute("last_updated", Attribute::computed_string())
            .with_attribute("invalid", Attribute::computed_bool())
    }

    #[instrument(skip_all, name = "data.workflow.read")]
    async fn read(&self, client: &KeepClient, config: Value) -> Result<Value, ProviderError> {
        let lookup: Lookup = serde_json::from_value(normalize(&self.schema(), config))
            .map_err(|e| ProviderError::Validation(e.to_string()))?;

        match client.get_workflow(&lookup.id).await {
            Ok(workflow) => attributes(&workflow),
            Err(err) if err.status() == Some(404) => Err(ProviderError::NotFound(format!(
                "workflow with ID {} not found",
                lookup.id
            ))),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes() {
        let workflow: Workflow = serde_json::from_value(json!({
            "id": "wf-1",
            "name": "triage",
            "triggers": [{"type": "manual"}],
            "providers": null,
            "interval": 60,
            "invalid": false,
        }))
        .unwrap();

        let attrs = attributes(&workflow).unwrap();
        assert_eq!(attrs["id"], "wf-1");
        assert_eq!(attrs["triggers"], r#"[{"type":"manual"}]"#);
        assert!(attrs["keep_providers"].is_null());
        assert_eq!(attrs["interval"], 60);
        assert_eq!(attrs["invalid"], false);
    }
}
