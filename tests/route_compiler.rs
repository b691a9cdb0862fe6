//! End-to-end route compilation through `Server::compile`.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::Request;
use axum::http::StatusCode;
use tower::ServiceExt;

use rpcgate::compiler::CompileError;
use rpcgate::config::{parse_config, GatewayConfig, RouterConfig};
use rpcgate::routing::{filter_fn, handler_fn, Handler, Next};
use rpcgate::setting::{router_option, RouterSetting};
use rpcgate::{GatewayError, Server};

use common::{body_string, request, start_mock_backend};

fn text(body: &'static str) -> Handler {
    handler_fn(move |_req| async move { body })
}

fn rule(path: &str, methods: &[&str]) -> RouterConfig {
    RouterConfig {
        path: path.into(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        ..RouterConfig::default()
    }
}

#[tokio::test]
async fn test_declarative_rule_overrides_router_option() {
    let mut server = Server::new();
    server.router().get("/legacy/items", text("items")).unwrap();
    server.router_option(router_option(|s: &mut RouterSetting| {
        if s.path.starts_with("/legacy/") {
            s.cache = 10;
        }
    }));

    let mut config = GatewayConfig::default();
    config.router_config.push(RouterConfig {
        cache: 30,
        ..rule("/legacy/*", &["GET"])
    });

    let gateway = server.compile(&config).unwrap();
    let routes = gateway.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, "/legacy/items");
    assert_eq!(routes[0].cache, 30);
}

#[tokio::test]
async fn test_internal_proxy_clones_target() {
    let mut server = Server::new();
    server.router().get("/user/get", text("user")).unwrap();
    server.router().get("/v2/user", text("shadowed")).unwrap();

    let mut config = GatewayConfig::default();
    config.router_config.push(RouterConfig {
        proxy_path: "/user/get".into(),
        ..rule("/v2/user", &["GET"])
    });

    let app = server.compile(&config).unwrap().into_router();

    let response = app.clone().oneshot(request("GET", "/v2/user", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "user");

    let response = app.oneshot(request("GET", "/user/get", "")).await.unwrap();
    assert_eq!(body_string(response).await, "user");
}

#[tokio::test]
async fn test_missing_proxy_target_is_fatal() {
    let mut server = Server::new();
    server.router().get("/user/get", text("user")).unwrap();

    let mut config = GatewayConfig::default();
    config.router_config.push(RouterConfig {
        proxy_path: "/user/get".into(),
        ..rule("/v2/user", &["GET", "POST"])
    });

    let err = server.compile(&config).err().unwrap();
    assert!(matches!(
        err,
        GatewayError::Compile(CompileError::ProxyTargetNotFound { ref method, .. }) if method == "POST"
    ));
}

#[tokio::test]
async fn test_unknown_plugin_is_fatal() {
    let mut server = Server::new();
    server.router().get("/a", text("a")).unwrap();

    let mut config = GatewayConfig::default();
    config.router_config.push(RouterConfig {
        plugins: vec![vec!["nosuch".into()]],
        ..rule("/a", &[])
    });

    let err = server.compile(&config).err().unwrap();
    assert!(matches!(err, GatewayError::Compile(CompileError::UnknownRouterPlugin(_))));
}

#[tokio::test]
async fn test_duplicate_registration_in_callback_is_fatal() {
    let mut server = Server::new();
    server.with_router(|router| {
        router.get("/dup", text("one"))?;
        router.get("/dup", text("two"))?;
        Ok(())
    });

    let err = server.compile(&GatewayConfig::default()).err().unwrap();
    assert!(matches!(err, GatewayError::Compile(CompileError::Route(_))));
}

#[tokio::test]
async fn test_filter_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let tag = |name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>| {
        let order = order.clone();
        filter_fn(move |req: Request, next: Next| {
            order.lock().unwrap().push(name);
            next.run(req)
        })
    };

    let mut server = Server::new();
    {
        let plugin_order = order.clone();
        server.router_plugin("trace", move |args: &[String]| {
            let name: &'static str = if args.first().map(String::as_str) == Some("global") {
                "global"
            } else {
                "route"
            };
            vec![tag(name, &plugin_order)]
        });
    }
    let group = server.router().group("/api", vec![tag("group", &order)]);
    group
        .handle(
            axum::http::Method::GET,
            "/ping",
            vec![tag("node", &order)],
            text("pong"),
        )
        .unwrap();

    let mut config = GatewayConfig::default();
    config.router_plugins = vec![vec!["trace".into(), "global".into()]];
    config.router_config.push(RouterConfig {
        plugins: vec![vec!["trace".into()]],
        access: Some(true),
        ..rule("/api/*", &[])
    });

    let gateway = server.compile(&config).unwrap();
    assert_eq!(gateway.routes()[0].filters, 5);
    assert!(gateway.routes()[0].access);

    let response = gateway.into_router().oneshot(request("GET", "/api/ping", "")).await.unwrap();
    assert_eq!(body_string(response).await, "pong");
    assert_eq!(*order.lock().unwrap(), vec!["global", "route", "group", "node"]);
}

#[tokio::test]
async fn test_named_segments() {
    let mut server = Server::new();
    server
        .router()
        .get(
            "/users/:id",
            handler_fn(|req: Request| async move { req.uri().path().to_string() }),
        )
        .unwrap();

    let app = server.compile(&GatewayConfig::default()).unwrap().into_router();
    let response = app.oneshot(request("GET", "/users/42", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "/users/42");
}

#[tokio::test]
async fn test_hostsallow_router_plugin() {
    let mut server = Server::new();
    server.router().get("/internal", text("secret")).unwrap();

    let config = parse_config(r#"router_plugins = [["hostsallow", "10.*"]]"#).unwrap();
    let app = server.compile(&config).unwrap().into_router();

    let allowed = Request::builder()
        .uri("/internal")
        .header("x-forwarded-for", "10.1.2.3")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(allowed).await.unwrap().status(), StatusCode::OK);

    let denied = Request::builder()
        .uri("/internal")
        .header("x-forwarded-for", "192.168.1.1")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(denied).await.unwrap().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_static_dir_behind_filters() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hello from disk").unwrap();

    let mut server = Server::new();
    server.router_plugin("stamp", |_args: &[String]| {
        vec![filter_fn(|req: Request, next: Next| async move {
            let mut response = next.run(req).await;
            response.headers_mut().insert("x-stamp", "1".parse().unwrap());
            response
        })]
    });
    server.router().static_dir("/assets/files", dir.path()).unwrap();

    let mut config = GatewayConfig::default();
    config.router_config.push(RouterConfig {
        plugins: vec![vec!["stamp".into()]],
        ..rule("/assets/*", &[])
    });

    let app = server.compile(&config).unwrap().into_router();
    let response = app
        .clone()
        .oneshot(request("GET", "/assets/files/hello.txt", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-stamp"], "1");
    assert_eq!(body_string(response).await, "hello from disk");

    let missing = app.oneshot(request("GET", "/assets/files/nope.txt", "")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_external_proxy_reaches_upstream() {
    let (addr, seen) = start_mock_backend("from-upstream").await;

    let mut config = GatewayConfig::default();
    config.upstreams = HashMap::from([("user-api".to_string(), addr.to_string())]);
    config.router_config.push(RouterConfig {
        proxy_path: "/user/get".into(),
        proxy_service: "user-api".into(),
        ..rule("/v2/user", &["GET"])
    });

    let gateway = Server::new().compile(&config).unwrap();
    assert_eq!(gateway.routes().len(), 1);
    assert_eq!(gateway.routes()[0].target, "handler");

    let response = gateway
        .into_router()
        .oneshot(request("GET", "/v2/user?id=7", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "from-upstream");
    assert_eq!(*seen.lock().unwrap(), vec!["GET /user/get?id=7".to_string()]);
}
