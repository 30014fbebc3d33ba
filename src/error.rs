//! Error types for the Keep provider.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A normalized error body returned by the Keep backend.
///
/// Every failed API call is reduced to this pair, whatever the backend
/// actually sent, so resource handlers can report errors uniformly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short error summary.
    #[serde(default)]
    pub error: String,
    /// Backend-provided details, or the raw response body.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A local file could not be read.
    #[error("Cannot read file {}: {source}", .path.display())]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A local file (YAML, CSV) or a response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is misconfigured or not yet configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The requested remote object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A JSON serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API Error (status {status}): {}. Details: {}", .response.error, .response.details)]
    Api {
        /// HTTP status code.
        status: u16,
        /// The normalized error body.
        response: ErrorResponse,
    },

    /// The API key lacks one or more required scopes.
    #[error("{}: {}", .0.error, .0.details)]
    PermissionDenied(ErrorResponse),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::Io { path, source } => format!("{}: {}", path.display(), source),
            Self::Parse(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Api { response, .. } | Self::PermissionDenied(response) => {
                if response.details.is_empty() {
                    response.error.clone()
                } else {
                    format!("{}. Details: {}", response.error, response.details)
                }
            },
        }
    }

    /// The HTTP status of a backend error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error means the remote object is already gone.
    ///
    /// Delete handlers treat these as success: 404 is a plain miss and
    /// some Keep endpoints answer 405 for rules that no longer exist.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self.status(), Some(404) | Some(405))
    }

    /// Build a [`ProviderError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Map a delete result so that an already-removed object counts as deleted.
pub(crate) fn ignore_gone(result: Result<(), ProviderError>) -> Result<(), ProviderError> {
    match result {
        Err(err) if err.is_gone() => {
            tracing::debug!(error = %err, "Remote object already gone");
            Ok(())
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ProviderError {
        ProviderError::Api {
            status,
            response: ErrorResponse::new("boom", "details"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("workflow-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: workflow-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("keep_alert".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: keep_alert");
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            api(500).to_string(),
            "API Error (status 500): boom. Details: details"
        );
    }

    #[test]
    fn test_permission_denied_display() {
        let err = ProviderError::PermissionDenied(ErrorResponse::new(
            "Insufficient permissions",
            "Missing required scopes: [write:workflows]",
        ));
        assert_eq!(
            err.to_string(),
            "Insufficient permissions: Missing required scopes: [write:workflows]"
        );
    }

    #[test]
    fn test_io_error_display() {
        let err = ProviderError::io(
            "/tmp/missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "Cannot read file /tmp/missing.csv: no such file");
        assert_eq!(err.message(), "/tmp/missing.csv: no such file");
    }

    #[test]
    fn test_is_gone() {
        assert!(api(404).is_gone());
        assert!(api(405).is_gone());
        assert!(ProviderError::NotFound("x".into()).is_gone());
        assert!(!api(500).is_gone());
        assert!(!api(412).is_gone());
        assert!(!ProviderError::Validation("x".into()).is_gone());
    }

    #[test]
    fn test_ignore_gone() {
        assert!(ignore_gone(Err(api(404))).is_ok());
        assert!(ignore_gone(Err(api(405))).is_ok());
        assert!(ignore_gone(Err(api(500))).is_err());
        assert!(ignore_gone(Ok(())).is_ok());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        assert_eq!(api(500).message(), "boom. Details: details");

        let err = ProviderError::Api {
            status: 500,
            response: ErrorResponse::new("boom", ""),
        };
        assert_eq!(err.message(), "boom");
    }
}
