//! Schema validation helpers.
//!
//! Configuration arrives as loosely-typed JSON. Before a handler decodes it
//! into its typed state record, [`validate`] checks it against the resource
//! [`Schema`] and [`normalize`] fills in defaults and drops nulls so serde
//! defaults apply.
//!
//! # Example
//!
//! ```
//! use keep_provider::schema::{Schema, Attribute};
//! use keep_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("priority", Attribute::optional_int64());
//!
//! let diagnostics = validate(&schema, &json!({"name": "severity", "priority": 1}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "severity", "priority": "high"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("priority".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Check `value` against `schema`.
///
/// Errors make the value unusable and warnings only flag deprecated
/// attributes. Computed-only attributes are never checked because the
/// provider owns them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(name, attr, obj.get(name), &mut diagnostics);
    }

    for group in &schema.exactly_one_of {
        let set: Vec<&String> = group
            .iter()
            .filter(|name| is_set(obj.get(name.as_str())))
            .collect();
        if set.len() != 1 {
            let summary = if set.is_empty() {
                format!("One of {} must be specified", quote_all(group))
            } else {
                format!("Only one of {} can be specified", quote_all(group))
            };
            diagnostics.push(Diagnostic::error(summary).with_attribute(group[0].clone()));
        }
    }

    diagnostics
}

/// Apply schema defaults and drop null attributes.
///
/// Attributes that are missing or null and have a default get the default.
/// Remaining nulls are removed so `#[serde(default)]` fields decode cleanly.
/// Keys the schema does not know are kept as-is.
pub fn normalize(schema: &Schema, value: Value) -> Value {
    let mut obj = match value {
        Value::Object(map) => map,
        other => return other,
    };

    for (name, attr) in &schema.attributes {
        if !is_set(obj.get(name)) {
            match &attr.default {
                Some(default) => {
                    obj.insert(name.clone(), default.clone());
                },
                None => {
                    obj.remove(name);
                },
            }
        }
    }
    obj.retain(|_, v| !v.is_null());

    Value::Object(obj)
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    value: Option<&Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name),
                );
            }
        },
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, name, diagnostics);
            if let Some(message) = &attr.deprecated {
                diagnostics.push(
                    Diagnostic::warning(format!("Attribute '{}' is deprecated", name))
                        .with_detail(message.clone())
                        .with_attribute(name),
                );
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let matches = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => value.as_i64().is_some(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_attribute_type(element, item, &format!("{}.{}", path, i), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    validate_attribute_type(element, item, &format!("{}.{}", path, key), diagnostics);
                }
                true
            },
            None => false,
        },
    };
    if !matches {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!(
                    "Expected {}, got {}",
                    type_label(attr_type),
                    value_type_name(value)
                ))
                .with_attribute(path),
        );
    }
}

fn type_label(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
        AttributeType::Map(_) => "map",
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn quote_all(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, DiagnosticSeverity};
    use serde_json::json;

    fn mapping_schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "matchers",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                ),
            )
            .with_attribute(
                "priority",
                Attribute::optional_int64().with_default(json!(0)),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("csv_content_hash", Attribute::computed_string())
    }

    #[test]
    fn test_valid_config() {
        let config = json!({
            "name": "alerts",
            "matchers": ["severity='critical'"],
            "priority": 2,
        });
        assert!(validate(&mapping_schema(), &config).is_empty());
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&mapping_schema(), &json!({"name": "alerts"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("matchers".to_string()));
        assert!(diagnostics[0].summary.contains("Missing required"));
    }

    #[test]
    fn test_null_required_is_missing() {
        let diagnostics = validate(&mapping_schema(), &json!({"name": null, "matchers": []}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
    }

    #[test]
    fn test_wrong_types() {
        let diagnostics = validate(
            &mapping_schema(),
            &json!({"name": "alerts", "matchers": [1], "priority": "high"}),
        );
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect();
        assert!(attrs.contains(&"matchers.0".to_string()));
        assert!(attrs.contains(&"priority".to_string()));
    }

    #[test]
    fn test_computed_attributes_skipped() {
        let config = json!({
            "name": "alerts",
            "matchers": [],
            "csv_content_hash": 42,
        });
        assert!(validate(&mapping_schema(), &config).is_empty());
    }

    #[test]
    fn test_non_object() {
        let diagnostics = validate(&mapping_schema(), &json!("nope"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }

    #[test]
    fn test_map_values() {
        let schema = Schema::v0().with_attribute(
            "auth_config",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                AttributeFlags::required(),
            ),
        );
        assert!(validate(&schema, &json!({"auth_config": {"token": "x"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"auth_config": {"port": 8080}}));
        assert_eq!(diagnostics[0].attribute, Some("auth_config.port".to_string()));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected string, got number"));

        let diagnostics = validate(&schema, &json!({"auth_config": ["token"]}));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected map, got array"));
    }

    #[test]
    fn test_exactly_one_of() {
        let schema = Schema::v0()
            .with_attribute("file", Attribute::optional_string())
            .with_attribute("workflow_file_path", Attribute::optional_string())
            .with_exactly_one_of(&["file", "workflow_file_path"]);

        assert!(validate(&schema, &json!({"file": "a.yaml"})).is_empty());

        let none = validate(&schema, &json!({"file": null}));
        assert_eq!(none.len(), 1);
        assert!(none[0].summary.starts_with("One of"));

        let both = validate(&schema, &json!({"file": "a", "workflow_file_path": "b"}));
        assert_eq!(both.len(), 1);
        assert!(both[0].summary.starts_with("Only one of"));
    }

    #[test]
    fn test_deprecated_attribute_warns() {
        let schema = Schema::v0().with_attribute(
            "workflow_file_path",
            Attribute::optional_string().with_deprecation("use 'file' instead"),
        );
        let diagnostics = validate(&schema, &json!({"workflow_file_path": "a.yaml"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn test_normalize_applies_defaults_and_drops_nulls() {
        let normalized = normalize(
            &mapping_schema(),
            json!({
                "name": "alerts",
                "matchers": ["a=1"],
                "priority": null,
                "description": null,
                "extra": "kept",
            }),
        );
        assert_eq!(
            normalized,
            json!({
                "name": "alerts",
                "matchers": ["a=1"],
                "priority": 0,
                "extra": "kept",
            })
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_values() {
        let normalized = normalize(
            &mapping_schema(),
            json!({"name": "alerts", "matchers": [], "priority": 7}),
        );
        assert_eq!(normalized["priority"], 7);
        assert_eq!(normalize(&mapping_schema(), Value::Null), Value::Null);
    }
}
