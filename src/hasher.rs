//! Content hashing for file-backed resources.
//!
//! Workflows and mappings are defined by a local file. The SHA-256 digest of
//! that file is kept in state; when the file changes on disk the digest
//! changes and the resource is planned for replacement.

use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ProviderError;
use crate::schema::Attribute;
use crate::types::{AttributeChange, PlanResult};

/// SHA-256 of the file content as lowercase hex.
pub async fn content_hash(path: &Path) -> Result<String, ProviderError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::io(path, e))?;
    Ok(hash_bytes(&content))
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Tracks the content hash of one file under one state attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHasher {
    field: &'static str,
    description: &'static str,
}

impl FileHasher {
    /// Create a hasher storing its digest under `field`.
    pub const fn new(field: &'static str, description: &'static str) -> Self {
        Self { field, description }
    }

    /// Name of the state attribute holding the digest.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Schema attribute for the digest: computed, and a change forces replacement.
    pub fn attribute(&self) -> Attribute {
        Attribute::computed_string()
            .with_force_new()
            .with_description(self.description)
    }

    /// Stage the current digest in the planned state.
    ///
    /// When it differs from the digest stored in `prior`, the change is
    /// recorded and, for an existing resource, replacement is required.
    pub async fn customize_plan(
        &self,
        path: &Path,
        prior: Option<&Value>,
        plan: &mut PlanResult,
    ) -> Result<(), ProviderError> {
        let current = content_hash(path).await?;
        let stored = prior
            .and_then(|state| state.get(self.field))
            .and_then(Value::as_str);

        if let Value::Object(planned) = &mut plan.planned_state {
            planned.insert(self.field.to_string(), Value::String(current.clone()));
        }

        if stored == Some(current.as_str()) {
            return Ok(());
        }

        tracing::debug!(
            field = self.field,
            path = %path.display(),
            "File content changed since last apply"
        );
        plan.changes.retain(|change| change.path != self.field);
        plan.changes.push(match stored {
            Some(old) => AttributeChange::modified(self.field, Value::from(old), Value::from(current)),
            None => AttributeChange::added(self.field, Value::from(current)),
        });
        if prior.is_some() {
            plan.requires_replace = true;
        }
        Ok(())
    }

    /// Recompute the digest at apply time and store it in `slot`.
    pub async fn stamp(&self, path: &Path, slot: &mut Option<String>) -> Result<String, ProviderError> {
        let current = content_hash(path).await?;
        *slot = Some(current.clone());
        Ok(current)
    }
}
