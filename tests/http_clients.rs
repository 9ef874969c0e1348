//! Outbound HTTP clients against small axum mock servers: Confluence,
//! Microsoft Graph (token + search), and the chat-completion endpoint.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use navo::config::{ConfluenceConfig, LlmConfig, SharePointConfig};
use navo::connector_confluence::ConfluenceClient;
use navo::connector_sharepoint::SharePointClient;
use navo::error::{LlmError, SourceError};
use navo::llm::{ChatMessage, OpenAiChatClient};
use navo::traits::{ChatModel, SourceClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

// ─── Confluence ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct ConfluenceMock {
    seen_cql: Arc<Mutex<Option<String>>>,
}

async fn confluence_search(
    State(mock): State<ConfluenceMock>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("bot@acme.com:secret")
    );
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "nope"})));
    }
    *mock.seen_cql.lock().unwrap() = params.get("cql").cloned();
    (
        StatusCode::OK,
        Json(json!({
            "results": [
                {"content": {
                    "title": "Deployment Guide",
                    "body": {"storage": {"value": "<p>Use <b>helm</b>.</p>"}},
                    "version": {"when": "2024-06-01T12:00:00.000Z", "by": {"displayName": "Ada"}},
                    "_links": {"webui": "/spaces/OPS/pages/1"}
                }},
                {"content": {"title": "Release Notes"}}
            ]
        })),
    )
}

fn confluence_config(base: &str, token: &str) -> ConfluenceConfig {
    ConfluenceConfig {
        base_url: Some(format!("{}/wiki", base)),
        email: Some("bot@acme.com".to_string()),
        api_token: Some(token.to_string()),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn confluence_search_sends_cql_with_basic_auth() {
    let mock = ConfluenceMock::default();
    let app = Router::new()
        .route("/wiki/rest/api/search", get(confluence_search))
        .with_state(mock.clone());
    let base = serve(app).await;

    let client = ConfluenceClient::new(Some(&confluence_config(&base, "secret"))).unwrap();
    assert!(client.is_enabled());
    let results = client.search("deployment guide", 10).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Deployment Guide");
    assert_eq!(results[0].content, "Use helm .");
    assert_eq!(results[0].url, format!("{}/wiki/spaces/OPS/pages/1", base));
    assert_eq!(results[1].url, "");
    assert_eq!(
        mock.seen_cql.lock().unwrap().as_deref(),
        Some(r#"text ~ "deployment guide" AND type = "page""#)
    );
}

#[tokio::test]
async fn confluence_rejection_is_a_status_error() {
    let app = Router::new()
        .route("/wiki/rest/api/search", get(confluence_search))
        .with_state(ConfluenceMock::default());
    let base = serve(app).await;

    let client = ConfluenceClient::new(Some(&confluence_config(&base, "wrong"))).unwrap();
    let err = client.search("anything", 10).await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 401, .. }));
}

// ─── SharePoint / Graph ─────────────────────────────────────────────

#[derive(Clone, Default)]
struct GraphMock {
    token_calls: Arc<AtomicUsize>,
    reject_token: bool,
    seen_request: Arc<Mutex<Option<Value>>>,
}

async fn graph_token(
    State(mock): State<GraphMock>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    mock.token_calls.fetch_add(1, Ordering::SeqCst);
    if mock.reject_token || tenant != "tenant-1" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"token_type": "Bearer", "access_token": "graph-token", "expires_in": 3600})),
    )
}

async fn graph_search(
    State(mock): State<GraphMock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if bearer(&headers).as_deref() != Some("graph-token") {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    *mock.seen_request.lock().unwrap() = Some(body);
    (
        StatusCode::OK,
        Json(json!({
            "value": [{
                "hitsContainers": [{
                    "hits": [{
                        "summary": "Connect to the <c0>VPN</c0> before deploying",
                        "resource": {
                            "name": "VPN Setup.docx",
                            "webUrl": "https://acme.sharepoint.com/sites/it/VPN%20Setup.docx",
                            "lastModifiedDateTime": "2024-05-02T08:00:00Z",
                            "lastModifiedBy": {"user": {"displayName": "Grace"}}
                        }
                    }]
                }]
            }]
        })),
    )
}

async fn graph_app(mock: GraphMock) -> String {
    let app = Router::new()
        .route("/{tenant}/oauth2/v2.0/token", post(graph_token))
        .route("/v1.0/search/query", post(graph_search))
        .with_state(mock);
    serve(app).await
}

fn sharepoint_config(base: &str) -> SharePointConfig {
    SharePointConfig {
        tenant_id: Some("tenant-1".to_string()),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        site_url: Some("https://acme.sharepoint.com/sites/it".to_string()),
        graph_url: base.to_string(),
        login_url: base.to_string(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn sharepoint_search_reuses_token() {
    let mock = GraphMock::default();
    let base = graph_app(mock.clone()).await;
    let client = SharePointClient::new(Some(&sharepoint_config(&base))).unwrap();

    let results = client.search("vpn", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "VPN Setup.docx");
    assert_eq!(results[0].content, "Connect to the VPN before deploying");
    assert_eq!(results[0].author.as_deref(), Some("Grace"));
    assert_eq!(results[0].source_name, "SharePoint");

    client.search("vpn again", 5).await.unwrap();
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 1);

    let request = mock.seen_request.lock().unwrap().clone().unwrap();
    assert_eq!(
        request["requests"][0]["query"]["queryString"],
        "vpn again path:\"https://acme.sharepoint.com/sites/it\""
    );
    assert_eq!(request["requests"][0]["size"], 5);
}

#[tokio::test]
async fn sharepoint_token_rejection_is_an_auth_error() {
    let mock = GraphMock {
        reject_token: true,
        ..Default::default()
    };
    let base = graph_app(mock).await;
    let client = SharePointClient::new(Some(&sharepoint_config(&base))).unwrap();

    let err = client.search("vpn", 5).await.unwrap_err();
    assert!(matches!(err, SourceError::Auth(_)));
}

// ─── Chat completions ───────────────────────────────────────────────

async fn chat_completions(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if bearer(&headers).as_deref() != Some("sk-test") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
    }
    if body["messages"][1]["content"] == "fail please" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "boom"})),
        );
    }
    let reply = format!(
        "model={} messages={} max_tokens={}",
        body["model"].as_str().unwrap_or_default(),
        body["messages"].as_array().map_or(0, |m| m.len()),
        body["max_tokens"]
    );
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]})),
    )
}

#[tokio::test]
async fn chat_client_posts_completion_request() {
    let app = Router::new().route("/v1/chat/completions", post(chat_completions));
    let base = serve(app).await;
    let client = OpenAiChatClient::new(&LlmConfig {
        api_key: Some("sk-test".to_string()),
        base_url: format!("{}/v1", base),
        ..Default::default()
    })
    .unwrap();

    let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hello")];
    let reply = client.complete(&messages).await.unwrap();
    assert_eq!(reply, "model=gpt-4 messages=2 max_tokens=500");

    let err = client
        .complete(&[ChatMessage::system("x"), ChatMessage::user("fail please")])
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Status { status: 500, .. }));
}
