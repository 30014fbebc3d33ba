//! Keep infrastructure provider.
//!
//! Manages the configuration of a [Keep](https://keephq.dev) backend as
//! declarative resources:
//!
//! - **`keep_provider`**: installed providers (Prometheus, Slack, ...)
//! - **`keep_workflow`**: workflows defined by local YAML files
//! - **`keep_mapping`**: enrichment mapping rules defined by local CSV files
//! - **`keep_extraction`**: regex extraction rules
//!
//! plus the `keep_workflow` and `keep_mapping` data sources.
//!
//! Workflows and mappings are tracked by the SHA-256 of their file: when the
//! file changes on disk the next plan replaces the remote object.
//!
//! # Quick Start
//!
//! ```ignore
//! use keep_provider::{KeepProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keep_provider::ProviderError> {
//!     keep_provider::init_logging();
//!
//!     let provider = KeepProvider::new();
//!     // backend_url and api_key may also come from KEEP_BACKEND_URL / KEEP_API_KEY
//!     provider
//!         .configure(json!({"backend_url": "http://localhost:8080", "api_key": "secret"}))
//!         .await?;
//!
//!     let workflow = provider
//!         .read_data_source("keep_workflow", json!({"id": "b3c1..."}))
//!         .await?;
//!     println!("{}", workflow["name"]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

pub use client::KeepClient;
pub use config::ProviderConfig;
pub use error::{ErrorResponse, ProviderError};
pub use logging::{init_logging, try_init_logging};
pub use provider::KeepProvider;
pub use schema::{Diagnostic, ProviderSchema};
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::validate;
