//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use keep_provider::testing::ProviderTester;
use keep_provider::{KeepClient, KeepProvider, ProviderConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";

pub fn no_env(_: &str) -> Option<String> {
    None
}

pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "backend_url": server.uri(),
        "api_key": API_KEY,
        "timeout": "5s",
    })
}

/// A tester whose provider talks to `server`.
pub async fn configured_tester(server: &MockServer) -> ProviderTester<KeepProvider> {
    keep_provider::try_init_logging();
    let tester = ProviderTester::new(KeepProvider::with_env(no_env));
    tester
        .configure(provider_config(server))
        .await
        .expect("configure against mock server");
    tester
}

/// A bare client for `server`.
pub fn client(server: &MockServer) -> KeepClient {
    let config = ProviderConfig::resolve(&provider_config(server), no_env).expect("valid config");
    KeepClient::new(&config).expect("client")
}

/// Write `content` to `name` inside `dir`.
pub fn write_fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub const TEAMS_CSV: &str = "service,owner,env\napi,core,prod\nweb,frontend,prod\n";

pub const DISK_WORKFLOW: &str = r#"workflow:
  id: disk-alert
  name: Disk usage
  description: Page on full disks
  triggers:
    - type: manual
  actions:
    - name: page
      provider:
        type: console
        with:
          message: disk is full
"#;

pub fn mapping_rule(id: i64, name: &str, file_name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": "team ownership",
        "priority": 0,
        "matchers": [["service"]],
        "file_name": file_name,
        "attributes": ["owner", "env"],
        "created_at": "2024-05-01T10:00:00",
        "created_by": "ops@example.com",
    })
}

pub fn extraction_rule(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": null,
        "priority": 0,
        "attribute": "message",
        "condition": "",
        "disabled": false,
        "regex": "host=(?P<host>\\S+)",
        "pre": false,
    })
}
