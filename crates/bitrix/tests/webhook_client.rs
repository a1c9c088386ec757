use std::sync::Arc;
use std::time::Duration;

use crmbridge_bitrix::capabilities::Batcher;
use crmbridge_bitrix::{
    BatchCommand, BatchCommands, BitrixClient, ClientError, ContactRepository, WebhookClient,
};
use crmbridge_core::BitrixConfig;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOOK_PATH: &str = "/rest/1/secret-token";

fn client(server: &MockServer) -> WebhookClient {
    let config = BitrixConfig {
        webhook_url: SecretString::from(format!("{}{HOOK_PATH}", server.uri())),
        ..BitrixConfig::default()
    };
    WebhookClient::connect(&config).expect("client builds")
}

fn endpoint(method: &str) -> String {
    format!("{HOOK_PATH}/{method}.json")
}

// ── Single calls ────────────────────────────────────────────────

#[tokio::test]
async fn call_posts_params_to_method_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.deal.get")))
        .and(body_json(json!({"ID": 7})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"ID": "7"}, "time": {}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let envelope = client(&server).call("crm.deal.get", json!({"ID": 7})).await.expect("call");

    assert_eq!(envelope["result"]["ID"], json!("7"));
}

#[tokio::test]
async fn error_body_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.deal.get")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "",
            "error_description": "Not found"
        })))
        .mount(&server)
        .await;

    let error = client(&server).call("crm.deal.get", json!({"ID": 1})).await.expect_err("api");

    assert!(matches!(error, ClientError::Api { .. }));
    assert!(error.is_remote_not_found());
}

#[tokio::test]
async fn non_json_failure_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let error = client(&server).call("crm.deal.list", json!({})).await.expect_err("status");

    match error {
        ClientError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_portal_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client =
        WebhookClient::new(format!("{}{HOOK_PATH}", server.uri()), Duration::from_millis(100), 50)
            .expect("client builds");
    let error = client.call("crm.deal.fields", json!({})).await.expect_err("timeout");

    assert!(matches!(error, ClientError::Timeout(_)), "{error:?}");
}

// ── Batch and full listing ──────────────────────────────────────

#[tokio::test]
async fn batch_results_are_normalised_per_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("batch")))
        .and(body_partial_json(json!({
            "halt": 0,
            "cmd": {"cmd0": "crm.deal.get?ID=1", "cmd1": "crm.deal.get?ID=2"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "result": {"cmd0": {"ID": "1"}},
                "result_error": {"cmd1": {"error": "", "error_description": "Not found"}},
                "result_total": [],
                "result_next": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut commands = BatchCommands::new();
    for (index, id) in [1, 2].into_iter().enumerate() {
        let command = BatchCommand::new("crm.deal.get", json!({"ID": id}));
        commands.insert(format!("cmd{index}"), command);
    }

    let envelope = client(&server).call_batch(commands).await.expect("batch");

    assert_eq!(envelope, json!({"result": {"cmd0": {"ID": "1"}}}));
}

fn chunked_client(server: &MockServer) -> WebhookClient {
    WebhookClient::new(format!("{}{HOOK_PATH}", server.uri()), Duration::from_secs(5), 1)
        .expect("client builds")
}

fn deal_drafts() -> Vec<serde_json::Value> {
    vec![json!({"fields": {"TITLE": "a"}}), json!({"fields": {"TITLE": "b"}})]
}

#[tokio::test]
async fn failed_chunk_only_fails_its_own_commands() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("batch")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": {"result": {"cmd0": "11"}, "result_error": []}})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("batch")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let batcher = Batcher::new(Arc::new(chunked_client(&server)), "Deal");
    let ids = batcher.batch_create("crm.deal.add", deal_drafts()).await;

    assert_eq!(ids, vec![Some(11), None]);
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn batch_fails_when_every_chunk_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("batch")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(2)
        .mount(&server)
        .await;

    let mut commands = BatchCommands::new();
    for (index, params) in deal_drafts().into_iter().enumerate() {
        commands.insert(format!("cmd{index}"), BatchCommand::new("crm.deal.add", params));
    }

    let error = chunked_client(&server).call_batch(commands).await.expect_err("no chunk landed");

    assert!(matches!(error, ClientError::Status { status: 503, .. }), "{error:?}");
}

#[tokio::test]
async fn get_all_follows_next_offsets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.deal.list")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"ID": "1"}, {"ID": "2"}],
            "next": 2,
            "total": 3
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.deal.list")))
        .and(body_partial_json(json!({"start": 2})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": [{"ID": "3"}], "total": 3})),
        )
        .mount(&server)
        .await;

    let items = client(&server)
        .get_all("crm.deal.list", json!({"filter": {"CATEGORY_ID": 0}}))
        .await
        .expect("full list");

    assert_eq!(items.len(), 3);
    assert_eq!(items[2]["ID"], json!("3"));
}

// ── Repositories over HTTP ──────────────────────────────────────

#[tokio::test]
async fn repository_distinguishes_missing_contact_from_outage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.contact.get")))
        .and(body_json(json!({"ID": 404})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "",
            "error_description": "Not found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("crm.contact.get")))
        .and(body_json(json!({"ID": 500})))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let contacts = ContactRepository::new(Arc::new(client(&server)));

    assert!(contacts.get_by_id(404).await.is_none());
    assert!(contacts.get_by_id(500).await.is_none());

    let missing = contacts.try_get_by_id(404).await.expect_err("missing");
    assert!(missing.is_not_found());
    let outage = contacts.try_get_by_id(500).await.expect_err("outage");
    assert_eq!(outage.kind(), "runtime");
}
