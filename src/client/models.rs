//! Typed request and response records for the Keep REST API.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend IDs arrive as JSON numbers for rules and strings for everything else.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

/// A provider type the backend knows how to install.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvailableProvider {
    /// Provider type, e.g. `prometheus`.
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Human readable name.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailableProviders {
    pub providers: Vec<AvailableProvider>,
}

/// An installed provider as returned by `/providers/export`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstalledProvider {
    /// Installation ID.
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Provider type.
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Installation details.
    #[serde(default)]
    pub details: ProviderDetails,
}

/// Details of an installed provider.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProviderDetails {
    /// Installation name.
    #[serde(default)]
    pub name: Option<String>,
    /// Authentication values. The backend may send non-string values.
    #[serde(default)]
    pub authentication: Option<BTreeMap<String, Value>>,
}

/// Body of `POST /providers/install`.
///
/// Authentication values are sent as top-level keys next to the identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallProviderRequest {
    /// Provider type.
    pub provider_id: String,
    /// Installation name.
    pub provider_name: String,
    /// Authentication configuration.
    #[serde(flatten)]
    pub auth_config: BTreeMap<String, String>,
}

/// Response of `POST /providers/install`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstallProviderResponse {
    /// ID of the new installation.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
}

/// A workflow as returned by `GET /workflows/{id}`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Workflow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub creation_time: Option<String>,
    pub triggers: Value,
    pub interval: Option<i64>,
    pub last_execution_time: Option<String>,
    pub last_execution_status: Option<String>,
    pub providers: Value,
    pub workflow_raw_id: Option<String>,
    pub workflow_raw: Option<String>,
    pub revision: Option<i64>,
    pub last_updated: Option<String>,
    pub invalid: Option<bool>,
}

/// Response of the workflow create/upload endpoints.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WorkflowCreated {
    /// ID of the stored workflow.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub workflow_id: Option<String>,
    /// Revision after the write.
    #[serde(default)]
    pub revision: Option<i64>,
    /// `created` or `updated`.
    #[serde(default)]
    pub status: Option<String>,
}

/// A matcher as stored by the backend.
///
/// Newer backends store each matcher as the list of its `&&`-joined
/// conditions, older ones as the plain expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatcherExpr {
    /// The matcher split into conditions.
    Conditions(Vec<String>),
    /// The matcher as written.
    Expression(String),
}

impl MatcherExpr {
    /// The matcher as a single expression.
    pub fn to_expression(&self) -> String {
        match self {
            Self::Conditions(parts) => parts.join(crate::resources::mapping::CONDITION_SEPARATOR),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Body of `POST /mapping`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRequest {
    pub name: String,
    pub description: String,
    pub matchers: Vec<Vec<String>>,
    pub priority: i64,
    pub rows: Vec<BTreeMap<String, String>>,
    pub file_name: String,
}

/// A mapping rule as returned by the backend.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MappingRule {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub matchers: Vec<MatcherExpr>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl MappingRule {
    /// Matchers as plain expressions.
    pub fn matcher_expressions(&self) -> Vec<String> {
        self.matchers.iter().map(MatcherExpr::to_expression).collect()
    }
}

/// Body of `POST /extraction` and `PUT /extraction/{id}`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionRequest {
    pub name: String,
    pub description: String,
    pub priority: i64,
    pub attribute: String,
    pub condition: String,
    pub disabled: bool,
    pub regex: String,
    pub pre: bool,
}

/// An extraction rule as returned by the backend.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionRule {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub pre: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids() {
        let rule: MappingRule = serde_json::from_value(json!({"id": 12, "name": "a"})).unwrap();
        assert_eq!(rule.id, "12");

        let rule: ExtractionRule =
            serde_json::from_value(json!({"id": "7", "name": "b"})).unwrap();
        assert_eq!(rule.id, "7");
    }

    #[test]
    fn test_matchers_in_both_shapes() {
        let rule: MappingRule = serde_json::from_value(json!({
            "id": 1,
            "name": "alerts",
            "matchers": [["service", "severity"], "region=~'.*'"],
        }))
        .unwrap();
        assert_eq!(
            rule.matcher_expressions(),
            vec!["service && severity", "region=~'.*'"]
        );
    }

    #[test]
    fn test_install_request_flattens_auth() {
        let request = InstallProviderRequest {
            provider_id: "prometheus".to_string(),
            provider_name: "prom".to_string(),
            auth_config: BTreeMap::from([("url".to_string(), "http://prom".to_string())]),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"provider_id": "prometheus", "provider_name": "prom", "url": "http://prom"})
        );
    }

    #[test]
    fn test_install_response_without_id() {
        let response: InstallProviderResponse =
            serde_json::from_value(json!({"status": "ok"})).unwrap();
        assert!(response.id.is_none());
    }

    #[test]
    fn test_workflow_tolerates_nulls() {
        let workflow: Workflow = serde_json::from_value(json!({
            "id": "wf-1",
            "name": "triage",
            "interval": null,
            "triggers": [{"type": "manual"}],
            "revision": 3,
        }))
        .unwrap();
        assert_eq!(workflow.id, "wf-1");
        assert_eq!(workflow.revision, Some(3));
        assert!(workflow.interval.is_none());
        assert!(workflow.providers.is_null());
    }
}
