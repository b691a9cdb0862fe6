//! Response caching through the compiled engine.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use tower::ServiceExt;

use rpcgate::config::parse_config;
use rpcgate::routing::handler_fn;
use rpcgate::Server;

use common::{body_string, request};

const CONFIG: &str = r#"
    [cache]
    type = "memory"

    [[router_config]]
    path = "/svc/*"
    cache = 5
"#;

/// `/svc/echo` echoes the body, `/svc/fail` always answers 500. Both count calls.
fn gateway(calls: Arc<AtomicUsize>) -> axum::Router {
    gateway_with(CONFIG, "memory", calls)
}

fn gateway_with(config: &str, backend: &str, calls: Arc<AtomicUsize>) -> axum::Router {
    let mut server = Server::new();
    let echo_calls = calls.clone();
    server
        .router()
        .post(
            "/svc/echo",
            handler_fn(move |req: Request| {
                let n = echo_calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    let body = to_bytes(req.into_body(), usize::MAX).await.unwrap_or_default();
                    ([("x-call", n.to_string())], body)
                }
            }),
        )
        .unwrap();
    server
        .router()
        .get(
            "/svc/fail",
            handler_fn(move |_req| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }
            }),
        )
        .unwrap();

    let config = parse_config(config).unwrap();
    let gateway = server.compile(&config).unwrap();
    assert_eq!(gateway.cache().backend(), backend);
    gateway.into_router()
}

#[tokio::test]
async fn test_identical_posts_hit_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway(calls.clone());

    let first = app.clone().oneshot(request("POST", "/svc/echo", "{\"a\":1}")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-call"], "1");
    assert_eq!(body_string(first).await, "{\"a\":1}");

    let second = app.clone().oneshot(request("POST", "/svc/echo", "{\"a\":1}")).await.unwrap();
    assert_eq!(second.headers()["x-call"], "1");
    assert_eq!(body_string(second).await, "{\"a\":1}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let other = app.oneshot(request("POST", "/svc/echo", "{\"a\":2}")).await.unwrap();
    assert_eq!(other.headers()["x-call"], "2");
    assert_eq!(body_string(other).await, "{\"a\":2}");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_query_is_part_of_the_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway(calls.clone());

    for uri in ["/svc/echo?v=1", "/svc/echo?v=2", "/svc/echo?v=1"] {
        let response = app.clone().oneshot(request("POST", uri, "same")).await.unwrap();
        assert_eq!(body_string(response).await, "same");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway(calls.clone());

    for _ in 0..3 {
        let response = app.clone().oneshot(request("GET", "/svc/fail", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "down");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_oversized_post_bypasses_the_cache() {
    let config = r#"
        [cache]
        type = "memory"
        max_body_size = 16

        [[router_config]]
        path = "/svc/*"
        cache = 5
    "#;
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_with(config, "memory", calls.clone());
    let payload = "0123456789abcdefghijklmnopqrstuvwxyz";

    for n in ["1", "2"] {
        let response = app.clone().oneshot(request("POST", "/svc/echo", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-call"], n);
        assert_eq!(body_string(response).await, payload);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_redis_serves_live() {
    let config = r#"
        [cache]
        type = "redis"
        redis = { address = "127.0.0.1:1" }

        [[router_config]]
        path = "/svc/*"
        cache = 5
    "#;
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_with(config, "redis", calls.clone());

    let response = tokio::time::timeout(
        Duration::from_secs(1),
        app.oneshot(request("POST", "/svc/echo", "{\"a\":1}")),
    )
    .await
    .expect("request stalled on the cache backend")
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{\"a\":1}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
