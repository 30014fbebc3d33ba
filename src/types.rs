//! Plan and import results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute's old and new value in a plan.
///
/// `before` is `None` for an attribute the prior state did not have, and
/// `after` is `None` for one the plan drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Top-level attribute name.
    pub path: String,
    #[allow(missing_docs)]
    pub before: Option<Value>,
    #[allow(missing_docs)]
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change with both sides given explicitly.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// `path` appears with `value`.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// `path` disappears.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// `path` goes from `before` to `after`.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// What `plan` returns to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State to hand to create or update. `null` for a destroy.
    pub planned_state: Value,
    /// Per-attribute differences against the prior state.
    pub changes: Vec<AttributeChange>,
    /// Apply as delete followed by create.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to apply; `state` is carried through as planned.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), false)
    }

    #[allow(missing_docs)]
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether `path` is among the changes.
    pub fn changes_attribute(&self, path: &str) -> bool {
        self.changes.iter().any(|change| change.path == path)
    }
}

/// A state recovered by `import_resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    #[allow(missing_docs)]
    pub resource_type: String,
    /// State as a refresh would produce it.
    pub state: Value,
}

impl ImportedResource {
    #[allow(missing_docs)]
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Type names a provider serves, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    #[allow(missing_docs)]
    pub resources: Vec<String>,
    #[allow(missing_docs)]
    pub data_sources: Vec<String>,
}
