//! `DoS` Attack Simulation and Prevention Tests
//!
//! Sends oversized and abusive requests through the router to verify that
//! the security layers and input limits reject them cheaply.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use ems_protocols::utils::validation::{MAX_CHAT_TURNS, MAX_QUERY_LENGTH, MAX_TURN_CHARS};
use ems_protocols::web::server::{create_router_with_state, AppState, MAX_BODY_SIZE};
use ems_protocols::ProtocolCatalog;
use tokio::time::timeout;
use tower::ServiceExt;

fn router() -> axum::Router {
    let catalog = ProtocolCatalog::load_embedded().unwrap();
    create_router_with_state(Arc::new(AppState::new(catalog, None))).unwrap()
}

fn with_peer(mut request: Request<Body>, last_octet: u8) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 168, 0, last_octet], 40_000))));
    request
}

fn post(uri: &str, body: String) -> Request<Body> {
    with_peer(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        1,
    )
}

/// Test that request bodies over the limit are refused
#[tokio::test]
async fn test_body_size_limit() {
    let huge = "x".repeat(MAX_BODY_SIZE + 1);
    let body = serde_json::json!({"query": huge}).to_string();

    let response = router().oneshot(post("/api/context", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

/// Test that oversized search queries are rejected before scoring
#[tokio::test]
async fn test_query_length_limit() {
    let query = "a".repeat(MAX_QUERY_LENGTH + 1);
    let request = with_peer(
        Request::get(format!("/api/search?q={query}"))
            .body(Body::empty())
            .unwrap(),
        2,
    );

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that chat histories with too many turns are rejected
#[tokio::test]
async fn test_chat_turn_limit() {
    let messages: Vec<serde_json::Value> = (0..=MAX_CHAT_TURNS)
        .map(|_| serde_json::json!({"role": "user", "content": "again"}))
        .collect();
    let body = serde_json::json!({ "messages": messages }).to_string();

    let response = router().oneshot(post("/api/chat", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that a single oversized chat turn is rejected
#[tokio::test]
async fn test_chat_turn_size_limit() {
    let body = serde_json::json!({
        "messages": [{"role": "user", "content": "x".repeat(MAX_TURN_CHARS + 1)}]
    })
    .to_string();

    let response = router().oneshot(post("/api/chat/stream", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that a burst from one address is eventually rate limited
#[tokio::test]
async fn test_rapid_request_flood_protection() {
    let app = router();
    let mut limited = false;

    for _ in 0..200 {
        let request = with_peer(
            Request::get("/api/categories").body(Body::empty()).unwrap(),
            3,
        );
        let response = app.clone().oneshot(request).await.unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }

    assert!(limited, "Burst of 200 requests should hit the rate limit");
}

/// Test that worst-case search input stays fast
#[tokio::test]
async fn test_cpu_intensive_search_protection() {
    let query: String = (0..MAX_QUERY_LENGTH / 10)
        .map(|i| format!("tok{i:05} "))
        .collect::<String>()
        .chars()
        .take(MAX_QUERY_LENGTH)
        .collect();
    let request = with_peer(
        Request::get(format!("/api/search?q={}", query.replace(' ', "+")))
            .body(Body::empty())
            .unwrap(),
        4,
    );

    let start = Instant::now();
    let response = timeout(Duration::from_secs(10), router().oneshot(request))
        .await
        .expect("search should finish well within the timeout")
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() < Duration::from_secs(10));
}

/// Test that malformed JSON is rejected without a server error
#[tokio::test]
async fn test_malformed_json_protection() {
    for body in ["{", "[]", "{\"messages\": 5}", "\u{0}\u{1}binary"] {
        let response = router()
            .oneshot(post("/api/chat", body.to_string()))
            .await
            .unwrap();
        assert!(response.status().is_client_error(), "{body:?}");
    }
}
