//! `keep_extraction`: a regex extraction rule applied to incoming alerts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{
    decode, encode, report_duplicate_removal, same_name_ids, warn_existing, ResourceHandler,
};
use crate::client::models::{ExtractionRequest, ExtractionRule};
use crate::client::KeepClient;
use crate::error::{ignore_gone, ProviderError};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "keep_extraction";

/// State of a `keep_extraction` resource.
///
/// Fields are the schema attributes of the same name.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionState {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub attribute: String,
    pub regex: String,
    pub condition: String,
    pub priority: i64,
    pub disabled: bool,
    pub pre: bool,
}

impl ExtractionState {
    fn request(&self) -> ExtractionRequest {
        ExtractionRequest {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            priority: self.priority,
            attribute: self.attribute.clone(),
            condition: self.condition.clone(),
            disabled: self.disabled,
            regex: self.regex.clone(),
            pre: self.pre,
        }
    }

    fn mirror(&mut self, rule: &ExtractionRule) {
        self.id = Some(rule.id.clone());
        self.name = rule.name.clone();
        if rule.description.is_some() {
            self.description = rule.description.clone();
        }
        self.priority = rule.priority;
        self.attribute = rule.attribute.clone().unwrap_or_default();
        self.condition = rule.condition.clone().unwrap_or_default();
        self.regex = rule.regex.clone().unwrap_or_default();
        self.disabled = rule.disabled;
        self.pre = rule.pre;
    }
}

/// Handler for `keep_extraction`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractionResource;

impl ExtractionResource {
    async fn remove_duplicates(
        &self,
        client: &KeepClient,
        name: &str,
        keep_id: &str,
    ) -> Result<(), ProviderError> {
        let rules = client.list_extractions().await?;
        for id in same_name_ids(&rules, name, Some(keep_id)) {
            let result = client.delete_extraction(&id).await;
            report_duplicate_removal(TYPE_NAME, name, &id, result);
        }
        Ok(())
    }

    async fn refresh(&self, client: &KeepClient, state: &ExtractionState) -> Result<Value, ProviderError> {
        let id = state.id.clone().unwrap_or_default();
        self.read(client, encode(state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("extraction rule {} vanished after apply", id)))
    }
}

#[async_trait::async_trait]
impl ResourceHandler for ExtractionResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A Keep extraction rule")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "attribute",
                Attribute::required_string().with_description("Alert attribute to extract from"),
            )
            .with_attribute(
                "regex",
                Attribute::required_string()
                    .with_description("Regex with named groups; each group becomes an attribute"),
            )
            .with_attribute(
                "condition",
                Attribute::optional_string()
                    .with_default(json!(""))
                    .with_description("CEL condition selecting the alerts to process"),
            )
            .with_attribute("priority", Attribute::optional_int64().with_default(json!(0)))
            .with_attribute("disabled", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute(
                "pre",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Run before mapping rules"),
            )
    }

    #[instrument(skip_all, name = "extraction.create")]
    async fn create(&self, client: &KeepClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ExtractionState = decode(&self.schema(), planned)?;

        let existing = client.list_extractions().await?;
        warn_existing(TYPE_NAME, &existing, &state.name);

        let rule = client.create_extraction(&state.request()).await?;
        info!(rule_id = %rule.id, name = %state.name, "Extraction rule created");
        state.id = Some(rule.id.clone());

        self.remove_duplicates(client, &state.name, &rule.id).await?;
        self.refresh(client, &state).await
    }

    #[instrument(skip_all, name = "extraction.read")]
    async fn read(&self, client: &KeepClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ExtractionState = decode(&self.schema(), state)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        let rules = client.list_extractions().await?;
        match rules.iter().find(|rule| rule.id == id) {
            Some(rule) => {
                state.mirror(rule);
                Ok(Some(encode(&state)?))
            },
            None => {
                info!(rule_id = %id, "Extraction rule not found, removing from state");
                Ok(None)
            },
        }
    }

    #[instrument(skip_all, name = "extraction.update")]
    async fn update(
        &self,
        client: &KeepClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ExtractionState = decode(&self.schema(), prior)?;
        let mut state: ExtractionState = decode(&self.schema(), planned)?;
        let id = prior
            .id
            .ok_or_else(|| ProviderError::Validation("extraction rule has no ID".to_string()))?;

        client.update_extraction(&id, &state.request()).await?;
        info!(rule_id = %id, name = %state.name, "Extraction rule updated");
        state.id = Some(id.clone());

        self.remove_duplicates(client, &state.name, &id).await?;
        self.refresh(client, &state).await
    }

    #[instrument(skip_all, name = "extraction.delete")]
    async fn delete(&self, client: &KeepClient, state: Value) -> Result<(), ProviderError> {
        let state: ExtractionState = decode(&self.schema(), state)?;
        let Some(id) = state.id else {
            return Ok(());
        };

        let rules = client.list_extractions().await?;
        if !rules.iter().any(|rule| rule.id == id) {
            debug!(rule_id = %id, "Extraction rule already deleted");
            return Ok(());
        }
        ignore_gone(client.delete_extraction(&id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_state() {
        let schema = ExtractionResource.schema();
        let state: ExtractionState = decode(
            &schema,
            json!({"name": "host", "attribute": "message", "regex": "(?P<host>\\w+)"}),
        )
        .unwrap();
        let request = state.request();
        assert_eq!(request.condition, "");
        assert_eq!(request.priority, 0);
        assert!(!request.disabled);
        assert!(!request.pre);
        assert_eq!(request.description, "");
    }

    #[test]
    fn test_mirror() {
        let mut state = ExtractionState::default();
        let rule: ExtractionRule = serde_json::from_value(json!({
            "id": 9,
            "name": "host",
            "attribute": "message",
            "regex": "(?P<host>\\w+)",
            "condition": null,
            "priority": 4,
            "pre": true,
        }))
        .unwrap();
        state.mirror(&rule);
        assert_eq!(state.id.as_deref(), Some("9"));
        assert_eq!(state.condition, "");
        assert_eq!(state.priority, 4);
        assert!(state.pre);
    }
}
