//! Provider-level configuration.
//!
//! The provider block carries `backend_url`, `api_key` and `timeout`. Any of
//! them left unset is taken from `KEEP_BACKEND_URL`, `KEEP_API_KEY` and
//! `KEEP_TIMEOUT` respectively.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable for the backend URL.
pub const ENV_BACKEND_URL: &str = "KEEP_BACKEND_URL";
/// Environment variable for the API key.
pub const ENV_API_KEY: &str = "KEEP_API_KEY";
/// Environment variable for the request timeout.
pub const ENV_TIMEOUT: &str = "KEEP_TIMEOUT";

/// Timeout used when neither the configuration nor the environment sets one.
pub const DEFAULT_TIMEOUT: &str = "30s";

/// Looks up an environment variable by name.
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads from the process environment, ignoring empty values.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for the Keep backend")
        .with_attribute(
            "backend_url",
            Attribute::optional_string().with_description(format!(
                "URL of the Keep backend. Falls back to {}",
                ENV_BACKEND_URL
            )),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!(
                    "API key used to authenticate against Keep. Falls back to {}",
                    ENV_API_KEY
                )),
        )
        .with_attribute(
            "timeout",
            Attribute::optional_string().with_description(format!(
                "Timeout applied to every backend request, e.g. \"30s\". Falls back to {}, then {}",
                ENV_TIMEOUT, DEFAULT_TIMEOUT
            )),
        )
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    timeout: Option<String>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the Keep backend.
    pub backend_url: Url,
    /// Static API key sent with every request.
    pub api_key: String,
    /// Timeout applied to each request.
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("backend_url", &self.backend_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration from already-validated parts.
    pub fn new(backend_url: Url, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend_url,
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Resolve the provider block, falling back to the environment.
    ///
    /// Every problem found is reported as an error diagnostic, so a user
    /// with several mistakes sees all of them at once.
    pub fn resolve(config: &Value, env: EnvLookup) -> Result<Self, Vec<Diagnostic>> {
        let raw: RawConfig = match config {
            Value::Null => RawConfig::default(),
            other => serde_json::from_value(other.clone()).map_err(|e| {
                vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
            })?,
        };

        let mut diagnostics = Vec::new();

        let backend_url = match pick(raw.backend_url, env, ENV_BACKEND_URL) {
            Some(value) => match parse_backend_url(&value) {
                Ok(url) => Some(url),
                Err(detail) => {
                    diagnostics.push(
                        Diagnostic::error("backend_url was not a valid url")
                            .with_detail(detail)
                            .with_attribute("backend_url"),
                    );
                    None
                },
            },
            None => {
                diagnostics.push(missing("backend_url", ENV_BACKEND_URL));
                None
            },
        };

        let api_key = pick(raw.api_key, env, ENV_API_KEY);
        if api_key.is_none() {
            diagnostics.push(missing("api_key", ENV_API_KEY));
        }

        let timeout_text =
            pick(raw.timeout, env, ENV_TIMEOUT).unwrap_or_else(|| DEFAULT_TIMEOUT.to_string());
        let timeout = match humantime::parse_duration(&timeout_text) {
            Ok(duration) => Some(duration),
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("timeout was not a valid duration")
                        .with_detail(format!("{}: {}", timeout_text, e))
                        .with_attribute("timeout"),
                );
                None
            },
        };

        match (backend_url, api_key, timeout) {
            (Some(backend_url), Some(api_key), Some(timeout)) if diagnostics.is_empty() => {
                Ok(Self::new(backend_url, api_key, timeout))
            },
            _ => Err(diagnostics),
        }
    }

    /// The configuration as a provider block, with the API key masked.
    pub fn redacted(&self) -> Value {
        json!({
            "backend_url": self.backend_url.as_str(),
            "api_key": "<redacted>",
            "timeout": humantime::format_duration(self.timeout).to_string(),
        })
    }
}

fn pick(explicit: Option<String>, env: EnvLookup, var: &str) -> Option<String> {
    explicit.filter(|v| !v.is_empty()).or_else(|| env(var))
}

fn missing(attribute: &str, var: &str) -> Diagnostic {
    Diagnostic::error(format!("Missing required attribute '{}'", attribute))
        .with_detail(format!("Set it in the provider block or via {}", var))
        .with_attribute(attribute)
}

fn parse_backend_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!("unsupported scheme '{}'", scheme)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn keep_env(name: &str) -> Option<String> {
        match name {
            ENV_BACKEND_URL => Some("https://keep.example.com".to_string()),
            ENV_API_KEY => Some("env-key".to_string()),
            ENV_TIMEOUT => Some("1m".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_resolve_explicit() {
        let config = ProviderConfig::resolve(
            &json!({
                "backend_url": "http://localhost:8080",
                "api_key": "secret",
                "timeout": "5s",
            }),
            no_env,
        )
        .unwrap();

        assert_eq!(config.backend_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_resolve_default_timeout() {
        let config = ProviderConfig::resolve(
            &json!({"backend_url": "http://localhost:8080", "api_key": "secret"}),
            no_env,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_env_fallback() {
        let config = ProviderConfig::resolve(&Value::Null, keep_env).unwrap();
        assert_eq!(config.backend_url.as_str(), "https://keep.example.com/");
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_explicit_wins_over_env() {
        let config =
            ProviderConfig::resolve(&json!({"api_key": "explicit", "timeout": null}), keep_env)
                .unwrap();
        assert_eq!(config.api_key, "explicit");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_resolve_reports_all_problems() {
        let diagnostics = ProviderConfig::resolve(
            &json!({"backend_url": "not a url", "timeout": "soon"}),
            no_env,
        )
        .unwrap_err();

        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["backend_url", "api_key", "timeout"]);
        assert!(diagnostics.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let diagnostics = ProviderConfig::resolve(
            &json!({"backend_url": "ftp://keep.example.com", "api_key": "k"}),
            no_env,
        )
        .unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("ftp"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::resolve(&Value::Null, keep_env).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("env-key"));
        assert_eq!(config.redacted()["api_key"], "<redacted>");
        assert_eq!(config.redacted()["timeout"], "1m");
    }
}
