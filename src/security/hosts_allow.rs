//! Client address allow-list.
//!
//! Registered as the built-in `hostsallow` plugin in both flavours:
//!
//! ```text
//! router_plugins = [["hostsallow", "10.*", "127.0.0.1"]]   → filter on each route
//! server_plugins = [["hostsallow", "10.*"]]                → layer on the whole engine
//! ```
//!
//! Arguments are wildcard patterns over the textual client IP. A client whose
//! address is unknown or matches no pattern gets `403 Forbidden`. With no
//! arguments the plugin allows everyone.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::access::client_ip;
use crate::compiler::{server_option, ServerOption};
use crate::routing::matcher::matches;
use crate::routing::{filter_fn, Filter, Next};

pub const PLUGIN_NAME: &str = "hostsallow";

/// Compiled allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsAllow {
    patterns: Arc<[String]>,
}

impl HostsAllow {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.trim().to_string()).collect(),
        }
    }

    pub fn allows(&self, req: &Request) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        match client_ip(req) {
            Some(ip) => matches(&ip.to_string(), self.patterns.iter()),
            None => false,
        }
    }

    fn check(&self, req: Request, run: impl FnOnce(Request) -> BoxFuture<'static, Response>) -> BoxFuture<'static, Response> {
        if self.allows(&req) {
            return run(req);
        }
        tracing::warn!(
            client = ?client_ip(&req),
            path = %req.uri().path(),
            "Client not in hosts allow-list"
        );
        async { (StatusCode::FORBIDDEN, "Forbidden").into_response() }.boxed()
    }
}

/// Router flavour: a single filter.
pub fn router_plugin(args: &[String]) -> Vec<Filter> {
    if args.is_empty() {
        return Vec::new();
    }
    let allow = HostsAllow::new(args);
    vec![filter_fn(move |req: Request, next: Next| {
        allow.check(req, |req| next.run(req).boxed())
    })]
}

/// Server flavour: the same check in front of the whole engine.
pub fn server_plugin(args: &[String]) -> Option<ServerOption> {
    if args.is_empty() {
        return None;
    }
    let allow = HostsAllow::new(args);
    Some(server_option(move |router| {
        let allow = allow.clone();
        router.layer(axum::middleware::from_fn(
            move |req: Request, next: axum::middleware::Next| {
                allow.check(req, |req| async move { next.run(req).await }.boxed())
            },
        ))
    }))
}
