//! End-to-end tests of the HTTP surface.

mod common;

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::*;
use serde_json::{Value, json};

async fn add_host(server: &TestServer, statement_id: i64, agent: &str, ts: i64) -> Value {
    let (status, body) = server
        .json_request(
            "POST",
            "/write-execute",
            Some(json!({
                "statementId": statement_id,
                "params": [string_param(agent), string_param(&format!("{agent}.example")), long_param(ts)]
            })),
            Some(AGENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

async fn query(server: &TestServer, token: &str, statement_id: i64, params: Vec<Value>) -> Value {
    let (status, body) = server
        .json_request(
            "POST",
            "/query-execute",
            Some(json!({"statementId": statement_id, "params": params})),
            Some(token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

fn agents(body: &Value) -> Vec<String> {
    body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["agentId"].as_str().unwrap().to_string())
        .collect()
}

/// Registers host-info, prepares ADD_HOST and writes three records.
async fn seeded_server() -> (TestServer, i64) {
    let server = TestServer::new().await;
    let category_id = server.register_host_info().await;
    let add = server.prepare(category_id, ADD_HOST, AGENT_TOKEN).await;
    let add_id = add["statementId"].as_i64().unwrap();
    assert!(add_id >= 0);

    for (agent, ts) in [("a1", 1), ("a2", 2), ("a1", 3)] {
        let body = add_host(&server, add_id, agent, ts).await;
        assert_eq!(body, json!({"responseCode": 0, "count": 1}));
    }
    (server, category_id)
}

#[tokio::test]
async fn test_health_is_public() {
    let server = TestServer::new().await;
    let (status, body) = server.json_request("GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_whoami() {
    let server = TestServer::new().await;
    let (status, body) = server
        .json_request("GET", "/v1/auth/whoami", None, Some(AGENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "agent");
    assert_eq!(
        body["roles"],
        json!(["cmd-channel-verify", "prepare-statement", "register-category", "write"])
    );
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json_request("POST", "/register-category", Some(host_info_registration()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = server
        .json_request(
            "POST",
            "/register-category",
            Some(host_info_registration()),
            Some("not-a-known-token"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_role_is_forbidden() {
    let server = TestServer::new().await;
    let (status, body) = server
        .json_request(
            "POST",
            "/register-category",
            Some(host_info_registration()),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = server
        .json_request(
            "POST",
            "/write-execute",
            Some(json!({"statementId": 0, "params": []})),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_category_is_idempotent() {
    let server = TestServer::new().await;
    let first = server.register_host_info().await;
    let hits = gatehouse_server::metrics::CATEGORY_REGISTRATION_HITS.get();
    let second = server.register_host_info().await;
    assert_eq!(first, second);
    assert!(gatehouse_server::metrics::CATEGORY_REGISTRATION_HITS.get() > hits);
}

#[tokio::test]
async fn test_register_untrusted_category_is_forbidden() {
    let server = TestServer::new().await;
    let mut registration = host_info_registration();
    registration["name"] = json!("vm-cpu");
    registration["category"]["name"] = json!("vm-cpu");

    let (status, _) = server
        .json_request("POST", "/register-category", Some(registration), Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_prepare_statement_outcomes() {
    let server = TestServer::new().await;
    let category_id = server.register_host_info().await;

    let prepared = server.prepare(category_id, QUERY_BY_AGENT, CLIENT_TOKEN).await;
    assert!(prepared["statementId"].as_i64().unwrap() >= 0);
    assert_eq!(prepared["freeParamCount"], 1);

    // Same text prepares to the same id.
    let again = server.prepare(category_id, QUERY_BY_AGENT, CLIENT_TOKEN).await;
    assert_eq!(again["statementId"], prepared["statementId"]);

    let untrusted = server
        .prepare(category_id, "QUERY host-info WHERE hostname = ?s", CLIENT_TOKEN)
        .await;
    assert_eq!(untrusted["statementId"], -1);

    let unknown_category = server.prepare(category_id + 100, QUERY_ALL, CLIENT_TOKEN).await;
    assert_eq!(unknown_category["statementId"], -1);

    let broken = server.prepare(category_id, BROKEN, CLIENT_TOKEN).await;
    assert_eq!(broken["statementId"], -2);
}

#[tokio::test]
async fn test_write_then_query_with_agent_filter() {
    let (server, category_id) = seeded_server().await;

    let by_agent = server.prepare(category_id, QUERY_BY_AGENT, CLIENT_TOKEN).await;
    let by_agent = by_agent["statementId"].as_i64().unwrap();
    let all = server.prepare(category_id, QUERY_ALL, CLIENT_TOKEN).await;
    let all = all["statementId"].as_i64().unwrap();

    // Newest a1 record only.
    let body = query(&server, CLIENT_TOKEN, by_agent, vec![string_param("a1")]).await;
    assert_eq!(body["responseCode"], 0);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["timeStamp"], 3);

    // The client may not read a2.
    let body = query(&server, CLIENT_TOKEN, by_agent, vec![string_param("a2")]).await;
    assert_eq!(body, json!({"responseCode": 0, "records": []}));

    // An unrestricted query is narrowed to a1.
    let body = query(&server, CLIENT_TOKEN, all, vec![]).await;
    assert_eq!(agents(&body), vec!["a1", "a1"]);

    let body = query(&server, ADMIN_TOKEN, all, vec![]).await;
    assert_eq!(agents(&body), vec!["a1", "a2", "a1"]);
}

#[tokio::test]
async fn test_illegal_patch_and_unknown_statement() {
    let (server, category_id) = seeded_server().await;
    let by_agent = server.prepare(category_id, QUERY_BY_AGENT, CLIENT_TOKEN).await;
    let by_agent = by_agent["statementId"].as_i64().unwrap();

    // Wrong arity.
    let body = query(&server, CLIENT_TOKEN, by_agent, vec![]).await;
    assert_eq!(body, json!({"responseCode": -1, "records": []}));

    // Wrong type.
    let body = query(&server, CLIENT_TOKEN, by_agent, vec![long_param(1)]).await;
    assert_eq!(body["responseCode"], -1);

    let body = query(&server, CLIENT_TOKEN, 9999, vec![]).await;
    assert_eq!(body["responseCode"], -3);

    let (status, body) = server
        .json_request(
            "POST",
            "/write-execute",
            Some(json!({"statementId": 9999, "params": []})),
            Some(AGENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"responseCode": -3, "count": 0}));
}

#[tokio::test]
async fn test_query_statement_through_write_execute_is_refused() {
    let (server, category_id) = seeded_server().await;
    let all = server.prepare(category_id, QUERY_ALL, AGENT_TOKEN).await;

    let (status, body) = server
        .json_request(
            "POST",
            "/write-execute",
            Some(json!({"statementId": all["statementId"], "params": []})),
            Some(AGENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseCode"], -1);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = TestServer::new().await;
    let (status, _) = server
        .raw_request(
            "POST",
            "/prepare-statement",
            Some(b"{not json".to_vec()),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_save_and_load_file() {
    let server = TestServer::new().await;
    let contents = b"shared contents".to_vec();

    let (status, _) = server
        .raw_request(
            "PUT",
            "/save-file?name=shared.txt",
            Some(contents.clone()),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .raw_request("GET", "/load-file?name=shared.txt", None, Some(CLIENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, contents);

    // No files-read grant for this name.
    let (status, _) = server
        .raw_request("GET", "/load-file?name=secret.txt", None, Some(CLIENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server
        .raw_request("GET", "/load-file?name=missing.txt", None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    // The client has no save-file role at all.
    let (status, _) = server
        .raw_request(
            "PUT",
            "/save-file?name=shared.txt",
            Some(b"x".to_vec()),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_file_name_is_required() {
    let server = TestServer::new().await;
    let (status, _) = server
        .raw_request("GET", "/load-file?name=", None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .raw_request("GET", "/load-file", None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purge_removes_agent_records() {
    let (server, category_id) = seeded_server().await;

    let (status, body) = server
        .json_request("POST", "/purge", Some(json!({"agentId": "a2"})), Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"agentId": "a2", "removed": 1}));

    let all = server.prepare(category_id, QUERY_ALL, ADMIN_TOKEN).await;
    let body = query(&server, ADMIN_TOKEN, all["statementId"].as_i64().unwrap(), vec![]).await;
    assert_eq!(agents(&body), vec!["a1", "a1"]);

    let (status, _) = server
        .json_request("POST", "/purge", Some(json!({"agentId": "a1"})), Some(CLIENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delegation_token_round_trip() {
    let server = TestServer::new().await;
    let client_token = STANDARD.encode(b"client-nonce-1");

    let (status, body) = server
        .json_request(
            "POST",
            "/generate-token",
            Some(json!({"clientToken": client_token, "actionName": "ping"})),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!STANDARD.decode(&token).unwrap().is_empty());

    let verify = json!({"clientToken": client_token, "actionName": "ping", "token": token});
    let (status, _) = server
        .json_request("POST", "/verify-token", Some(verify.clone()), Some(AGENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single use.
    let (status, body) = server
        .json_request("POST", "/verify-token", Some(verify), Some(AGENT_TOKEN))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_generate_token_requires_action_grant() {
    let server = TestServer::new().await;
    let (status, _) = server
        .json_request(
            "POST",
            "/generate-token",
            Some(json!({"clientToken": STANDARD.encode(b"n"), "actionName": "shutdown"})),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_fields_must_be_base64() {
    let server = TestServer::new().await;
    let (status, _) = server
        .json_request(
            "POST",
            "/generate-token",
            Some(json!({"clientToken": "***", "actionName": "ping"})),
            Some(CLIENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_with_wrong_action_fails() {
    let server = TestServer::new().await;
    let client_token = STANDARD.encode(b"client-nonce-2");
    let (_, body) = server
        .json_request(
            "POST",
            "/generate-token",
            Some(json!({"clientToken": client_token, "actionName": "ping"})),
            Some(CLIENT_TOKEN),
        )
        .await;

    let (status, _) = server
        .json_request(
            "POST",
            "/verify-token",
            Some(json!({"clientToken": client_token, "actionName": "reboot", "token": body["token"]})),
            Some(AGENT_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    gatehouse_server::metrics::register_metrics();
    let server = TestServer::new().await;
    server.register_host_info().await;

    let (status, body) = server.raw_request("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("gatehouse_categories_registered_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let (status, _) = server.raw_request("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
