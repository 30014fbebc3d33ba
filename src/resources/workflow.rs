//! `keep_workflow`: a workflow defined by a local YAML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{decode, encode, ResourceHandler};
use crate::client::KeepClient;
use crate::error::{ignore_gone, ProviderError};
use crate::hasher::FileHasher;
use crate::schema::{Attribute, Schema};
use crate::types::PlanResult;

/// Resource type name.
pub const TYPE_NAME: &str = "keep_workflow";

const HASHER: FileHasher = FileHasher::new(
    "workflow_content_hash",
    "SHA-256 of the workflow file at last apply",
);

/// State of a `keep_workflow` resource.
///
/// Fields are the schema attributes of the same name.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub id: Option<String>,
    pub file: Option<String>,
    pub workflow_file_path: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub revision: Option<i64>,
    pub workflow_content_hash: Option<String>,
}

impl WorkflowState {
    fn path(&self) -> Result<PathBuf, ProviderError> {
        self.file
            .as_deref()
            .or(self.workflow_file_path.as_deref())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                ProviderError::Validation(
                    "one of 'file' or 'workflow_file_path' must be specified".to_string(),
                )
            })
    }
}

/// The parts of a workflow file the provider looks at.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    #[serde(alias = "alert")]
    workflow: WorkflowDefinition,
}

#[derive(Debug, Deserialize)]
struct WorkflowDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    actions: Vec<ActionDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActionDefinition {
    name: String,
    provider: ActionProvider,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActionProvider {
    #[serde(rename = "type")]
    provider_type: String,
}

/// A parsed workflow file ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDocument {
    /// `workflow.name`.
    pub name: String,
    /// `workflow.description`, empty when absent.
    pub description: String,
    /// The whole file as JSON.
    pub body: Value,
}

impl WorkflowDocument {
    /// Parse workflow YAML.
    pub fn parse(content: &str) -> Result<Self, ProviderError> {
        let file: WorkflowFile = serde_yaml::from_str(content)
            .map_err(|e| ProviderError::Parse(format!("invalid workflow YAML: {}", e)))?;
        let name = file
            .workflow
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ProviderError::Validation("workflow.name is required".to_string()))?;

        for action in &file.workflow.actions {
            debug!(action = %action.name, provider = %action.provider.provider_type, "Workflow action");
        }

        let raw: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| ProviderError::Parse(format!("invalid workflow YAML: {}", e)))?;

        Ok(Self {
            name,
            description: file.workflow.description.unwrap_or_default(),
            body: yaml_to_json(raw)?,
        })
    }

    /// Read and parse a workflow file.
    pub async fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::io(path, e))?;
        Self::parse(&content).map_err(|err| match err {
            ProviderError::Parse(msg) => ProviderError::Parse(format!("{}: {}", path.display(), msg)),
            ProviderError::Validation(msg) => {
                ProviderError::Validation(format!("{}: {}", path.display(), msg))
            },
            other => other,
        })
    }
}

/// Convert a YAML document into JSON.
///
/// Mapping keys that are not strings are stringified; tags are dropped.
pub fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, ProviderError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| {
                        ProviderError::Parse(format!("number {} cannot be represented in JSON", n))
                    })?
            }
        },
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut obj = Map::new();
            for (key, value) in mapping {
                obj.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(obj)
        },
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, ProviderError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(ProviderError::Parse(
            "workflow YAML uses a collection as a mapping key".to_string(),
        )),
    }
}

/// The backend stores either the whole file or just the `workflow` block.
fn raw_definition(raw: &str) -> Option<WorkflowDefinition> {
    serde_yaml::from_str::<WorkflowFile>(raw)
        .map(|file| file.workflow)
        .or_else(|_| serde_yaml::from_str::<WorkflowDefinition>(raw))
        .ok()
}

/// Handler for `keep_workflow`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowResource;

impl WorkflowResource {
    async fn apply(
        &self,
        client: &KeepClient,
        mut state: WorkflowState,
    ) -> Result<WorkflowState, ProviderError> {
        let path = state.path()?;
        HASHER
            .stamp(&path, &mut state.workflow_content_hash)
            .await?;
        let document = WorkflowDocument::load(&path).await?;

        let created = client.create_workflow_json(&document.body).await?;
        let id = created.workflow_id.ok_or_else(|| {
            ProviderError::Parse("workflow_id missing from create response".to_string())
        })?;

        info!(workflow_id = %id, name = %document.name, status = ?created.status, "Workflow stored");
        state.id = Some(id);
        state.name = Some(document.name);
        state.description = Some(document.description);
        state.revision = created.revision;
        Ok(state)
    }

    async fn refresh(&self, client: &KeepClient, state: WorkflowState) -> Result<Value, ProviderError> {
        let id = state.id.clone().unwrap_or_default();
        let state = encode(&state)?;
        self.read(client, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("workflow {} vanished after apply", id)))
    }
}

#[async_trait::async_trait]
impl ResourceHandler for WorkflowResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A Keep workflow defined by a local YAML file")
            .with_attribute("id", Attribute::computed_string().with_description("Workflow ID"))
            .with_attribute(
                "file",
                Attribute::optional_string().with_description("Path to the workflow YAML file"),
            )
            .with_attribute(
                "workflow_file_path",
                Attribute::optional_string()
                    .with_description("Path to the workflow YAML file")
                    .with_deprecation("Use 'file' instead"),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("revision", Attribute::computed_int64())
            .with_attribute(HASHER.field(), HASHER.attribute())
            .with_exactly_one_of(&["file", "workflow_file_path"])
    }

    async fn customize_plan(
        &self,
        prior: Option<&Value>,
        proposed: &Value,
        plan: &mut PlanResult,
    ) -> Result<(), ProviderError> {
        let state: WorkflowState = decode(&self.schema(), proposed.clone())?;
        HASHER.customize_plan(&state.path()?, prior, plan).await
    }

    #[instrument(skip_all, name = "workflow.create")]
    async fn create(&self, client: &KeepClient, planned: Value) -> Result<Value, ProviderError> {
        let state = self.apply(client, decode(&self.schema(), planned)?).await?;
        self.refresh(client, state).await
    }

    #[instrument(skip_all, name = "workflow.read")]
    async fn read(&self, client: &KeepClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: WorkflowState = decode(&self.schema(), state)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        let workflow = match client.get_workflow(&id).await {
            Ok(workflow) => workflow,
            Err(err) if err.status() == Some(404) => {
                warn!(workflow_id = %id, "Workflow not found, removing from state");
                return Ok(None);
            },
            Err(err) => return Err(err),
        };

        match workflow.workflow_raw.as_deref().and_then(raw_definition) {
            Some(definition) => {
                state.name = definition.name.or(workflow.name);
                state.description = Some(definition.description.unwrap_or_default());
            },
            None => {
                state.name = workflow.name;
                state.description = workflow.description.or(state.description);
            },
        }
        state.revision = workflow.revision.or(state.revision);

        Ok(Some(encode(&state)?))
    }

    #[instrument(skip_all, name = "workflow.update")]
    async fn update(
        &self,
        client: &KeepClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: WorkflowState = decode(&self.schema(), prior)?;
        let state = self.apply(client, decode(&self.schema(), planned)?).await?;
        if let (Some(old), Some(new)) = (&prior.id, &state.id) {
            if old != new {
                info!(old_id = %old, new_id = %new, "Workflow stored under a new ID");
            }
        }
        self.refresh(client, state).await
    }

    #[instrument(skip_all, name = "workflow.delete")]
    async fn delete(&self, client: &KeepClient, state: Value) -> Result<(), ProviderError> {
        let state: WorkflowState = decode(&self.schema(), state)?;
        match state.id {
            Some(id) => ignore_gone(client.delete_workflow(&id).await),
            None => Ok(()),
        }
    }
}
