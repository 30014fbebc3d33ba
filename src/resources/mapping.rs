//! `keep_mapping`: an enrichment mapping rule backed by a local CSV file.
//!
//! The state ID is `"<rule id>:<content hash>"` so that a new CSV yields a
//! new ID. A bare rule ID is accepted wherever an ID is read.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    decode, encode, report_duplicate_removal, same_name_ids, warn_existing, ResourceHandler,
};
use crate::client::models::{MappingRequest, MappingRule};
use crate::client::KeepClient;
use crate::error::{ignore_gone, ProviderError};
use crate::hasher::{content_hash, FileHasher};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::types::PlanResult;

/// Resource type name.
pub const TYPE_NAME: &str = "keep_mapping";

/// Separator between the conditions of one matcher.
pub const CONDITION_SEPARATOR: &str = " && ";

const HASHER: FileHasher = FileHasher::new(
    "csv_content_hash",
    "SHA-256 of the mapping CSV file at last apply",
);

/// Identifier of a mapping rule in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingId {
    /// Backend rule ID.
    pub rule_id: String,
    /// Content hash the rule was created from, when known.
    pub hash: Option<String>,
}

impl MappingId {
    /// Create a composite ID.
    pub fn new(rule_id: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            hash: Some(hash.into()),
        }
    }

    /// Parse `"<rule id>:<hash>"` or a bare `"<rule id>"`.
    pub fn parse(id: &str) -> Result<Self, ProviderError> {
        let (rule_id, hash) = match id.split_once(':') {
            Some((rule_id, hash)) => (rule_id, Some(hash)),
            None => (id, None),
        };
        let rule_id = rule_id.trim();
        if rule_id.is_empty() {
            return Err(ProviderError::Validation(format!("invalid mapping ID '{}'", id)));
        }
        Ok(Self {
            rule_id: rule_id.to_string(),
            hash: hash.filter(|h| !h.is_empty()).map(str::to_string),
        })
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hash {
            Some(hash) => write!(f, "{}:{}", self.rule_id, hash),
            None => f.write_str(&self.rule_id),
        }
    }
}

/// A parsed mapping CSV: the header row and every data row keyed by header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    /// Column names in file order.
    pub headers: Vec<String>,
    /// Data rows.
    pub rows: Vec<BTreeMap<String, String>>,
}

impl MappingTable {
    /// Parse CSV content.
    pub fn parse(content: &[u8]) -> Result<Self, ProviderError> {
        let mut reader = csv::Reader::from_reader(content);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ProviderError::Parse(format!("invalid CSV header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(ProviderError::Parse("CSV file is empty".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ProviderError::Parse(format!("invalid CSV row: {}", e)))?;
            rows.push(
                headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect(),
            );
        }
        if rows.is_empty() {
            return Err(ProviderError::Parse("CSV file is empty".to_string()));
        }

        Ok(Self { headers, rows })
    }

    /// Read and parse a CSV file.
    pub async fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::io(path, e))?;
        Self::parse(&content).map_err(|err| match err {
            ProviderError::Parse(msg) => ProviderError::Parse(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

/// The CSV columns a matcher refers to.
///
/// A matcher is a list of conditions joined by `" && "`; the column of a
/// condition is everything before its first `=`, `!` or `~`.
pub fn matcher_columns(matcher: &str) -> Vec<String> {
    matcher
        .split(CONDITION_SEPARATOR)
        .map(|condition| {
            let condition = condition.trim();
            let end = condition
                .find(|c: char| matches!(c, '=' | '!' | '~'))
                .unwrap_or(condition.len());
            condition[..end].trim().to_string()
        })
        .filter(|column| !column.is_empty())
        .collect()
}

/// Check that every column referenced by `matchers` is one of `headers`.
pub fn validate_matchers(matchers: &[String], headers: &[String]) -> Result<(), ProviderError> {
    for matcher in matchers {
        for column in matcher_columns(matcher) {
            if !headers.contains(&column) {
                let available: BTreeSet<&str> = headers.iter().map(String::as_str).collect();
                return Err(ProviderError::Validation(format!(
                    "matcher '{}' references column '{}' which is not present in the CSV file. Available columns: [{}]",
                    matcher,
                    column,
                    available.into_iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }
    }
    Ok(())
}

/// Matchers as sent to the backend: one list of conditions per matcher.
fn wire_matchers(matchers: &[String]) -> Vec<Vec<String>> {
    matchers
        .iter()
        .map(|m| {
            m.split(CONDITION_SEPARATOR)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .collect()
}

fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// State of a `keep_mapping` resource.
///
/// Fields are the schema attributes of the same name.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingState {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub matchers: Vec<String>,
    pub priority: i64,
    pub mapping_file_path: String,
    pub csv_content_hash: Option<String>,
}

impl MappingState {
    fn path(&self) -> Result<PathBuf, ProviderError> {
        if self.mapping_file_path.is_empty() {
            return Err(ProviderError::Validation(
                "mapping_file_path must be specified".to_string(),
            ));
        }
        Ok(PathBuf::from(&self.mapping_file_path))
    }

    fn mapping_id(&self) -> Result<Option<MappingId>, ProviderError> {
        self.id.as_deref().map(MappingId::parse).transpose()
    }

    /// Mirror what the backend reports for `rule`.
    fn mirror(&mut self, rule: &MappingRule) {
        if !rule.name.is_empty() {
            self.name = rule.name.clone();
        }
        if rule.description.is_some() {
            self.description = rule.description.clone();
        }
        self.priority = rule.priority;

        let remote = rule.matcher_expressions();
        let same_set = remote.len() == self.matchers.len()
            && remote.iter().all(|m| self.matchers.contains(m));
        if !remote.is_empty() && !same_set {
            self.matchers = remote;
        }

        if let Some(file_name) = rule.file_name.as_deref().filter(|f| !f.is_empty()) {
            if self.mapping_file_path.is_empty() || base_name(&self.mapping_file_path) != file_name {
                self.mapping_file_path = file_name.to_string();
            }
        }
    }
}

/// Handler for `keep_mapping`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappingResource;

impl MappingResource {
    /// Load the CSV, stamp its hash and POST the rule.
    async fn post(
        &self,
        client: &KeepClient,
        state: &mut MappingState,
        path: &Path,
    ) -> Result<MappingRule, ProviderError> {
        let table = MappingTable::load(path).await?;
        let hash = HASHER.stamp(path, &mut state.csv_content_hash).await?;
        validate_matchers(&state.matchers, &table.headers)?;

        let request = MappingRequest {
            name: state.name.clone(),
            description: state.description.clone().unwrap_or_default(),
            matchers: wire_matchers(&state.matchers),
            priority: state.priority,
            rows: table.rows,
            file_name: base_name(&state.mapping_file_path).to_string(),
        };
        let rule = client.create_mapping(&request).await?;

        info!(rule_id = %rule.id, name = %rule.name, rows = request.rows.len(), "Mapping rule created");
        state.id = Some(MappingId::new(rule.id.clone(), hash).to_string());
        if !rule.name.is_empty() {
            state.name = rule.name.clone();
        }
        if rule.description.is_some() {
            state.description = rule.description.clone();
        }
        state.priority = rule.priority;
        Ok(rule)
    }

    /// Delete every other rule sharing the new rule's name.
    async fn remove_duplicates(&self, client: &KeepClient, rule: &MappingRule) -> Result<(), ProviderError> {
        let rules = client.list_mappings().await?;
        for id in same_name_ids(&rules, &rule.name, Some(&rule.id)) {
            let result = client.delete_mapping(&id).await;
            report_duplicate_removal(TYPE_NAME, &rule.name, &id, result);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceHandler for MappingResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A Keep mapping rule enriching alerts from a CSV table")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Rule ID and CSV hash"),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "matchers",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("Conditions joined by ' && ', each on a CSV column"),
            )
            .with_attribute(
                "priority",
                Attribute::optional_int64().with_default(json!(0)),
            )
            .with_attribute(
                "mapping_file_path",
                Attribute::required_string().with_description("Path to the mapping CSV file"),
            )
            .with_attribute(HASHER.field(), HASHER.attribute())
    }

    fn suppress_diff(&self, attribute: &str, old: &Value, new: &Value) -> bool {
        match (attribute, old.as_str(), new.as_str()) {
            ("mapping_file_path", Some(old), Some(new)) => base_name(old) == base_name(new),
            _ => false,
        }
    }

    async fn customize_plan(
        &self,
        prior: Option<&Value>,
        proposed: &Value,
        plan: &mut PlanResult,
    ) -> Result<(), ProviderError> {
        let state: MappingState = decode(&self.schema(), proposed.clone())?;
        HASHER.customize_plan(&state.path()?, prior, plan).await
    }

    #[instrument(skip_all, name = "mapping.create")]
    async fn create(&self, client: &KeepClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: MappingState = decode(&self.schema(), planned)?;
        let path = state.path()?;

        let existing = client.list_mappings().await?;
        warn_existing(TYPE_NAME, &existing, &state.name);

        let rule = self.post(client, &mut state, &path).await?;
        self.remove_duplicates(client, &rule).await?;
        encode(&state)
    }

    #[instrument(skip_all, name = "mapping.read")]
    async fn read(&self, client: &KeepClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: MappingState = decode(&self.schema(), state)?;
        let Some(id) = state.mapping_id()? else {
            return Ok(None);
        };

        let rules = client.list_mappings().await?;
        let Some(rule) = rules.iter().find(|r| r.id == id.rule_id) else {
            info!(rule_id = %id.rule_id, "Mapping rule not found, removing from state");
            return Ok(None);
        };

        state.mirror(rule);
        if state.csv_content_hash.is_none() {
            state.csv_content_hash = id.hash.clone();
        }
        Ok(Some(encode(&state)?))
    }

    #[instrument(skip_all, name = "mapping.update")]
    async fn update(
        &self,
        client: &KeepClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: MappingState = decode(&self.schema(), prior)?;
        let mut state: MappingState = decode(&self.schema(), planned)?;
        let path = state.path()?;
        let old_id = prior.mapping_id()?;

        let content_changed = prior.csv_content_hash.as_deref() != Some(content_hash(&path).await?.as_str());
        if content_changed {
            if let Some(old) = &old_id {
                info!(rule_id = %old.rule_id, "Mapping CSV changed, deleting the old rule first");
                ignore_gone(client.delete_mapping(&old.rule_id).await)?;
            }
        }

        let rule = self.post(client, &mut state, &path).await?;

        if let Some(old) = old_id.filter(|old| !content_changed && old.rule_id != rule.id) {
            ignore_gone(client.delete_mapping(&old.rule_id).await)?;
        }
        self.remove_duplicates(client, &rule).await?;
        encode(&state)
    }

    #[instrument(skip_all, name = "mapping.delete")]
    async fn delete(&self, client: &KeepClient, state: Value) -> Result<(), ProviderError> {
        let state: MappingState = decode(&self.schema(), state)?;
        match state.mapping_id()? {
            Some(id) => ignore_gone(client.delete_mapping(&id.rule_id).await),
            None => Ok(()),
        }
    }
}
