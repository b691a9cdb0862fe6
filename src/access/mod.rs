//! Access log.
//!
//! One record per request on routes with access logging enabled:
//!
//! ```text
//! source method path query status used_ms
//! ```
//!
//! Records are `tracing` events on the `access` target, so where they end up
//! (stdout, JSON, a file appender) is the subscriber's business.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;

use crate::routing::{filter_fn, Filter, Next};

pub const ACCESS_TARGET: &str = "access";

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// TCP peer when the server was started with connect info.
pub fn client_ip(req: &Request) -> Option<IpAddr> {
    forwarded_ip(req.headers()).or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|hop| hop.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
}

/// Filter emitting one access record after the rest of the chain has run.
pub fn access_filter() -> Filter {
    filter_fn(|req: Request, next: Next| async move {
        let start = Instant::now();
        let source = client_ip(&req).map(|ip| ip.to_string()).unwrap_or_default();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();

        let response = next.run(req).await;

        tracing::info!(
            target: ACCESS_TARGET,
            source = %source,
            method = %method,
            path = %path,
            query = %query,
            status = response.status().as_u16(),
            used_ms = start.elapsed().as_millis() as u64,
            "access"
        );
        response
    })
}
