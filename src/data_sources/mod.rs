//! Read-only data sources.

pub mod mapping;
pub mod workflow;

use serde_json::Value;

use crate::client::KeepClient;
use crate::error::ProviderError;
use crate::schema::Schema;

pub use mapping::MappingDataSource;
pub use workflow::WorkflowDataSource;

/// Lookup of one data source type.
#[async_trait::async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Type name, e.g. `keep_workflow`.
    fn type_name(&self) -> &'static str;

    /// Data source schema.
    fn schema(&self) -> Schema;

    /// Look up the object selected by `config` and return its attributes.
    async fn read(&self, client: &KeepClient, config: Value) -> Result<Value, ProviderError>;
}
