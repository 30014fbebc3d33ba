//! `keep_provider` lifecycle against a mock backend.

mod common;

use keep_provider::testing::{assert_plan_creates, assert_plan_replaces, assert_state_cleared};
use keep_provider::ProviderError;
use serde_json::{json, Value};
use tokio_test::assert_err;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::configured_tester;

fn installed(id: &str, name: &str, url: &str) -> Value {
    json!({
        "id": id,
        "type": "prometheus",
        "details": {
            "name": name,
            "authentication": {"url": url},
        },
    })
}

async fn mount_available(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "providers": [
                {"type": "prometheus", "display_name": "Prometheus"},
                {"type": "slack", "display_name": "Slack"},
            ]
        })))
        .mount(server)
        .await;
}

fn prometheus_config(name: &str) -> Value {
    json!({
        "type": "prometheus",
        "name": name,
        "auth_config": {"url": "http://prom:9090"},
        "install_webhook": true,
    })
}

#[tokio::test]
async fn test_create_installs_and_reads_back() {
    let server = MockServer::start().await;
    mount_available(&server).await;

    Mock::given(method("POST"))
        .and(path("/providers/install"))
        .and(body_partial_json(json!({
            "provider_id": "prometheus",
            "provider_name": "prom",
            "url": "http://prom:9090",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/providers/install/webhook/prometheus/p-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/providers/export"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([installed("p-1", "prom", "http://prom:9090")])),
        )
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let plan = tester
        .plan_create("keep_provider", prometheus_config("prom"))
        .await
        .unwrap();
    assert_plan_creates(&plan);

    let state = tester
        .lifecycle_create("keep_provider", prometheus_config("prom"))
        .await
        .unwrap();
    assert_eq!(state["id"], "p-1");
    assert_eq!(state["type"], "prometheus");
    assert_eq!(state["name"], "prom");
    assert_eq!(state["auth_config"]["url"], "http://prom:9090");
    assert_eq!(state["install_webhook"], true);
}

#[tokio::test]
async fn test_unknown_provider_type_is_rejected() {
    let server = MockServer::start().await;
    mount_available(&server).await;

    Mock::given(method("POST"))
        .and(path("/providers/install"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let err = assert_err!(
        tester
            .create(
                "keep_provider",
                json!({"type": "nagios", "name": "n", "auth_config": {}}),
            )
            .await
    );
    assert_eq!(
        err.message(),
        "provider type 'nagios' is not available. Available types: [prometheus, slack]"
    );
}

#[tokio::test]
async fn test_install_without_id_fails() {
    let server = MockServer::start().await;
    mount_available(&server).await;

    Mock::given(method("POST"))
        .and(path("/providers/install"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let err = assert_err!(tester.create("keep_provider", prometheus_config("prom")).await);
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn test_read_clears_uninstalled_provider() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/providers/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let state = tester
        .read(
            "keep_provider",
            json!({"id": "p-1", "type": "prometheus", "name": "prom", "auth_config": {}}),
        )
        .await
        .unwrap();
    assert_state_cleared(&state);
}

#[tokio::test]
async fn test_update_reinstalls_under_new_id() {
    let server = MockServer::start().await;
    mount_available(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/providers/prometheus/p-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/providers/install"))
        .and(body_partial_json(json!({"provider_name": "prom-renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/providers/install/webhook/prometheus/p-2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/providers/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([installed(
            "p-2",
            "prom-renamed",
            "http://prom:9090"
        )])))
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let mut prior = prometheus_config("prom");
    prior["id"] = json!("p-1");

    let state = tester
        .update("keep_provider", prior, prometheus_config("prom-renamed"))
        .await
        .unwrap();
    assert_eq!(state["id"], "p-2");
    assert_eq!(state["name"], "prom-renamed");
}

#[tokio::test]
async fn test_type_change_requires_replace() {
    let server = MockServer::start().await;
    let tester = configured_tester(&server).await;

    let mut prior = prometheus_config("prom");
    prior["id"] = json!("p-1");
    let mut proposed = prometheus_config("prom");
    proposed["type"] = json!("slack");

    let plan = tester
        .plan_update("keep_provider", prior, proposed)
        .await
        .unwrap();
    assert_plan_replaces(&plan);
}

#[tokio::test]
async fn test_delete_treats_missing_as_deleted() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/providers/prometheus/p-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Provider not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let mut state = prometheus_config("prom");
    state["id"] = json!("p-1");
    tester.delete("keep_provider", state).await.unwrap();
}

#[tokio::test]
async fn test_import_by_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/providers/export"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([installed("p-7", "prom", "http://prom")])),
        )
        .mount(&server)
        .await;

    let tester = configured_tester(&server).await;
    let imported = tester.import_resource("keep_provider", "p-7").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].state["name"], "prom");

    let err = assert_err!(tester.import_resource("keep_provider", "p-8").await);
    assert!(matches!(err, ProviderError::NotFound(_)));
}
