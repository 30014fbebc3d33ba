//! Integration tests for the Keep HTTP client using wiremock.

mod common;

use std::time::Duration;

use keep_provider::{ProviderConfig, ProviderError};
use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, no_env, write_fixture, API_KEY, DISK_WORKFLOW};

// =============================================================================
// Headers
// =============================================================================

#[tokio::test]
async fn test_api_key_and_json_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/extraction"))
        .and(header("X-API-Key", API_KEY))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rules = assert_ok!(client(&server).list_extractions().await);
    assert!(rules.is_empty());
}

#[tokio::test]
async fn test_install_payload_flattens_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/providers/install"))
        .and(body_json(json!({
            "provider_id": "prometheus",
            "provider_name": "prom",
            "url": "http://prom:9090",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let request = keep_provider::client::models::InstallProviderRequest {
        provider_id: "prometheus".to_string(),
        provider_name: "prom".to_string(),
        auth_config: [("url".to_string(), "http://prom:9090".to_string())].into(),
    };
    let response = assert_ok!(client(&server).install_provider(&request).await);
    assert_eq!(response.id.as_deref(), Some("p-1"));
}

// =============================================================================
// Error decoding
// =============================================================================

#[tokio::test]
async fn test_missing_scope_is_insufficient_permissions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": {"read:workflows": "Missing scope"}
        })))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).list_workflows().await);
    match err {
        ProviderError::PermissionDenied(response) => {
            assert_eq!(response.error, "Insufficient permissions");
            assert_eq!(response.details, "Missing required scopes: [read:workflows]");
        },
        other => panic!("expected PermissionDenied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_precondition_failed_with_scopes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extraction"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "detail": {"write:extraction": "Missing scope", "read:extraction": "Missing scope"}
        })))
        .mount(&server)
        .await;

    let request = keep_provider::client::models::ExtractionRequest {
        name: "host".to_string(),
        description: String::new(),
        priority: 0,
        attribute: "message".to_string(),
        condition: String::new(),
        disabled: false,
        regex: "(?P<host>.*)".to_string(),
        pre: false,
    };
    let err = assert_err!(client(&server).create_extraction(&request).await);
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
    assert_eq!(
        err.message(),
        "Insufficient permissions. Details: Missing required scopes: [read:extraction, write:extraction]"
    );
}

#[tokio::test]
async fn test_server_error_keeps_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mapping"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).list_mappings().await);
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("Internal Server Error"));
}

#[tokio::test]
async fn test_unparseable_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"installed": []})))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).available_providers().await);
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn test_timeout_is_applied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::resolve(
        &json!({"backend_url": server.uri(), "api_key": API_KEY, "timeout": "200ms"}),
        no_env,
    )
    .unwrap();
    let client = keep_provider::KeepClient::new(&config).unwrap();

    let err = assert_err!(client.list_workflows().await);
    assert!(matches!(err, ProviderError::Transport(_)));
}

// =============================================================================
// Workflow uploads
// =============================================================================

#[tokio::test]
async fn test_upload_workflow_is_multipart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "disk.yaml", DISK_WORKFLOW);

    Mock::given(method("POST"))
        .and(path("/workflows"))
        .and(header("X-API-Key", API_KEY))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("name: Disk usage"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "workflow_id": "wf-9",
            "status": "created",
            "revision": 1,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = assert_ok!(client(&server).upload_workflow(&file).await);
    assert_eq!(created.workflow_id.as_deref(), Some("wf-9"));
    assert_eq!(created.revision, Some(1));
}

#[tokio::test]
async fn test_replace_workflow() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "disk.yaml", DISK_WORKFLOW);

    Mock::given(method("PUT"))
        .and(path("/workflows/wf-9"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflow_id": "wf-9",
            "status": "updated",
            "revision": 2,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let updated = assert_ok!(client(&server).replace_workflow("wf-9", &file).await);
    assert_eq!(updated.status.as_deref(), Some("updated"));
}

#[tokio::test]
async fn test_upload_missing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let err = assert_err!(
        client(&server)
            .upload_workflow(&dir.path().join("missing.yaml"))
            .await
    );
    assert!(matches!(err, ProviderError::Io { .. }));
}

// =============================================================================
// Providers
// =============================================================================

#[tokio::test]
async fn test_provider_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/providers/prometheus/p-1/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/providers/install/webhook/prometheus/p-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/providers/prometheus/p-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_ok!(client.test_provider("prometheus", "p-1").await);
    assert_ok!(client.install_provider_webhook("prometheus", "p-1").await);
    assert_ok!(client.delete_provider("prometheus", "p-1").await);
}
