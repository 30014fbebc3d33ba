//! `keep_mapping` data source.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::DataSourceHandler;
use crate::client::KeepClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validation::normalize;

#[derive(Debug, Deserialize)]
struct Lookup {
    id: i64,
}

/// Looks up a mapping rule by its numeric ID.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappingDataSource;

#[async_trait::async_trait]
impl DataSourceHandler for MappingDataSource {
    fn type_name(&self) -> &'static str {
        "keep_mapping"
    }

    fn schema(&self) -> Schema {
        let strings = || {
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed())
        };
        Schema::v0()
            .with_description("Look up a Keep mapping rule by ID")
            .with_attribute("id", Attribute::required_int64())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("file_name", Attribute::computed_string())
            .with_attribute("matchers", strings())
            .with_attribute("attributes", strings())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("created_by", Attribute::computed_string())
    }

    #[instrument(skip_all, name = "data.mapping.read")]
    async fn read(&self, client: &KeepClient, config: Value) -> Result<Value, ProviderError> {
        let lookup: Lookup = serde_json::from_value(normalize(&self.schema(), config))
            .map_err(|e| ProviderError::Validation(e.to_string()))?;
        let id = lookup.id.to_string();

        let rules = client.list_mappings().await?;
        let rule = rules
            .iter()
            .find(|rule| rule.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("mapping with ID {} not found", id)))?;

        Ok(json!({
            "id": lookup.id,
            "name": rule.name,
            "description": rule.description,
            "file_name": rule.file_name,
            "matchers": rule.matcher_expressions(),
            "attributes": rule.attributes,
            "created_at": rule.created_at,
            "created_by": rule.created_by,
        }))
    }
}
