//! Route compiler.
//!
//! # Data Flow
//! ```text
//! Router::flatten() → FlatNode[]
//!     │
//!     ├─ pass 1: RouterSetting per node
//!     │          (server RouterOptions, then router_config rules)
//!     │          off or proxied → node.off
//!     │          else           → plugins / cache / access onto the node
//!     │
//!     ├─ pass 2: each router_config rule with proxy_path, per method
//!     │          no proxy_service → clone node at (proxy_path, method)
//!     │          proxy_service    → synthetic node, proxy.rs handler
//!     │
//!     └─ assembly: for every node still on
//!                [access] + router_plugins + node plugins + node filters
//!                handler  → cache wrapper → axum route (method, path)
//!                static   → ServeDir / ServeFile, grouped when filtered
//! ```
//!
//! # Design Decisions
//! - Every configuration mistake surfaces as a [`CompileError`] before
//!   anything is served
//! - Gin-style `:name` / `*name` segments are rewritten to axum's `{name}`
//!   / `{*name}` so neither syntax reaches axum unchecked
//! - Mount collisions are detected here instead of panicking inside axum

pub mod plugin;
pub mod proxy;

use std::collections::{HashMap, HashSet};
use std::fmt;

use axum::extract::Request;
use axum::http::Method;
use axum::routing::{on, MethodFilter};
use thiserror::Error;
use tower_http::services::{ServeDir, ServeFile};

use crate::cache::{CacheError, ResponseCache};
use crate::config::schema::{PluginSpec, RouterConfig};
use crate::observability::metrics;
use crate::routing::chain::into_middleware;
use crate::routing::{Chain, Filter, FlatNode, RouteError, RouteMethod, Target};
use crate::setting::{merge_router_config, RouterOption, RouterSetting};

pub use plugin::{server_option, PluginRegistry, RouterPlugin, ServerOption, ServerPlugin};
pub use proxy::{proxy_handler, ProxyTarget};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid router plugin: {0:?}")]
    UnknownRouterPlugin(PluginSpec),

    #[error("invalid server plugin: {0:?}")]
    UnknownServerPlugin(PluginSpec),

    #[error("invalid proxy target {method} {path}")]
    ProxyTargetNotFound { path: String, method: String },

    #[error("route {method} {path} is mounted more than once")]
    DuplicateMount { method: String, path: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Everything assembly needs besides the nodes.
pub struct CompileContext<'a> {
    pub router_config: &'a [RouterConfig],
    pub router_options: &'a [RouterOption],
    pub router_plugins: &'a [PluginSpec],
    pub upstreams: &'a HashMap<String, String>,
    pub plugins: &'a PluginRegistry,
    pub cache: &'a dyn ResponseCache,
    /// Access-log filter; `None` disables access logging for every route.
    pub access: Option<Filter>,
    pub client: reqwest::Client,
}

/// One entry of the compiled dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedRoute {
    pub method: RouteMethod,
    pub path: String,
    pub filters: usize,
    pub cache: i64,
    pub access: bool,
    pub target: String,
}

impl fmt::Display for MountedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<40} {}", self.method, self.path, self.target)?;
        if self.filters > 0 {
            write!(f, " filters={}", self.filters)?;
        }
        if self.cache > 0 {
            write!(f, " cache={}s", self.cache)?;
        }
        if self.access {
            f.write_str(" access")?;
        }
        Ok(())
    }
}

pub struct Compiled {
    pub engine: axum::Router,
    pub routes: Vec<MountedRoute>,
}

/// Run both passes and assemble the engine.
pub fn compile(ctx: &CompileContext<'_>, mut nodes: Vec<FlatNode>) -> Result<Compiled, CompileError> {
    resolve_settings(&mut nodes, ctx.router_options, ctx.router_config);
    materialize_proxies(&mut nodes, ctx.router_config, ctx.upstreams, &ctx.client)?;
    assemble(ctx, nodes)
}

/// Pass 1: fold options and rules into every node.
pub fn resolve_settings(nodes: &mut [FlatNode], options: &[RouterOption], rules: &[RouterConfig]) {
    let declarative = merge_router_config(rules);
    for node in nodes.iter_mut() {
        let setting = RouterSetting::new(
            &node.package_name,
            &node.service_name,
            &node.method_name,
            &node.path,
            node.method.clone(),
        )
        .apply(options)
        .apply(&declarative);

        if setting.off || !setting.proxy_path.is_empty() {
            node.off = true;
        } else {
            node.plugins = setting.plugins;
            node.cache = setting.cache;
            node.access = setting.access;
        }
    }
}

/// Pass 2: append one node per (proxy rule, method).
pub fn materialize_proxies(
    nodes: &mut Vec<FlatNode>,
    rules: &[RouterConfig],
    upstreams: &HashMap<String, String>,
    client: &reqwest::Client,
) -> Result<(), CompileError> {
    for rule in rules {
        if rule.proxy_path.is_empty() || rule.off == Some(true) {
            continue;
        }
        for name in &rule.methods {
            let method = RouteMethod::parse(name)?;
            let mut node = if rule.proxy_service.is_empty() {
                let source = nodes
                    .iter()
                    .find(|n| n.path == rule.proxy_path && n.method == method)
                    .ok_or_else(|| CompileError::ProxyTargetNotFound {
                        path: rule.proxy_path.clone(),
                        method: method.to_string(),
                    })?;
                let mut clone = source.clone();
                clone.path = rule.path.clone();
                clone.method = method;
                clone.off = false;
                clone
            } else {
                let target = ProxyTarget {
                    service: rule.proxy_service.clone(),
                    authority: upstreams
                        .get(&rule.proxy_service)
                        .cloned()
                        .unwrap_or_else(|| rule.proxy_service.clone()),
                    path: rule.proxy_path.clone(),
                    https: rule.proxy_https.unwrap_or(false),
                };
                FlatNode::synthetic(method, rule.path.clone(), proxy_handler(client.clone(), target))
            };

            node.plugins = rule.plugins.clone();
            node.cache = rule.cache;
            node.access = rule.access.unwrap_or(false);

            tracing::debug!(
                method = %node.method,
                path = %node.path,
                proxy_path = %rule.proxy_path,
                proxy_service = %rule.proxy_service,
                "Materialized proxy route"
            );
            nodes.push(node);
        }
    }
    Ok(())
}

/// `"/a/b/c"` → `("/a/b", "/c")`; a single segment stays under `"/"`.
pub fn split_base(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) if idx > 0 => (&path[..idx], &path[idx..]),
        _ => ("/", path),
    }
}

/// Rewrite `:name` and `*name` segments to axum syntax and reject paths axum
/// would panic on.
pub fn axum_path(path: &str) -> Result<String, RouteError> {
    if !path.starts_with('/') {
        return Err(RouteError::InvalidPath(path.to_string()));
    }
    let mut segments = Vec::new();
    for segment in path.split('/') {
        let rewritten = if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(RouteError::InvalidPath(path.to_string()));
            }
            format!("{{{}}}", name)
        } else if let Some(name) = segment.strip_prefix('*') {
            if name.is_empty() {
                return Err(RouteError::InvalidPath(path.to_string()));
            }
            format!("{{*{}}}", name)
        } else {
            segment.to_string()
        };
        segments.push(rewritten);
    }
    Ok(segments.join("/"))
}

/// What already occupies a path in the engine.
enum PathUse {
    Methods(HashSet<Method>),
    Service,
}

#[derive(Default)]
struct MountTable {
    paths: HashMap<String, PathUse>,
}

impl MountTable {
    fn claim_method(&mut self, path: &str, method: &Method) -> Result<(), CompileError> {
        let duplicate = || CompileError::DuplicateMount {
            method: method.to_string(),
            path: path.to_string(),
        };
        match self
            .paths
            .entry(path.to_string())
            .or_insert_with(|| PathUse::Methods(HashSet::new()))
        {
            PathUse::Methods(methods) => {
                if methods.insert(method.clone()) {
                    Ok(())
                } else {
                    Err(duplicate())
                }
            }
            PathUse::Service => Err(duplicate()),
        }
    }

    fn claim_service(&mut self, path: &str, method: &RouteMethod) -> Result<(), CompileError> {
        if self.paths.contains_key(path) {
            return Err(CompileError::DuplicateMount {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        self.paths.insert(path.to_string(), PathUse::Service);
        Ok(())
    }
}

fn describe(node: &FlatNode) -> String {
    match &node.target {
        Target::Handler(_) if node.service_name.is_empty() => "handler".to_string(),
        Target::Handler(_) => format!("{}.{}", node.service_name, node.method_name),
        Target::Dir(dir) => format!("dir {}", dir.display()),
        Target::File(file) => format!("file {}", file.display()),
        Target::Fs(_) => "fs".to_string(),
    }
}

fn assemble(ctx: &CompileContext<'_>, nodes: Vec<FlatNode>) -> Result<Compiled, CompileError> {
    let global = ctx.plugins.resolve_router(ctx.router_plugins)?;
    let mut engine = axum::Router::new();
    let mut table = MountTable::default();
    let mut routes = Vec::new();
    let mut disabled = 0usize;

    for node in nodes {
        if node.off {
            disabled += 1;
            continue;
        }

        let access_filter = ctx.access.as_ref().filter(|_| node.access);
        let access = access_filter.is_some();
        let mut filters: Vec<Filter> = access_filter.cloned().into_iter().collect();
        filters.extend(global.iter().cloned());
        filters.extend(ctx.plugins.resolve_router(&node.plugins)?);
        filters.extend(node.filters.iter().cloned());

        let path = axum_path(&node.path)?;
        let description = describe(&node);
        let filter_count = filters.len();

        engine = match node.target {
            Target::Handler(handler) => {
                let RouteMethod::Http(method) = &node.method else {
                    return Err(RouteError::InvalidMethod(node.method.to_string()).into());
                };
                let method_filter = MethodFilter::try_from(method.clone())
                    .map_err(|_| RouteError::InvalidMethod(method.to_string()))?;
                table.claim_method(&path, method)?;

                let chain = Chain::new(filters, ctx.cache.cache(node.cache, handler));
                engine.route(
                    &path,
                    on(method_filter, move |req: Request| {
                        let chain = chain.clone();
                        async move { chain.call(req).await }
                    }),
                )
            }
            target => {
                table.claim_service(&path, &node.method)?;
                mount_static(engine, &path, target, filters)
            }
        };

        tracing::debug!(
            method = %node.method,
            path = %path,
            filters = filter_count,
            cache = node.cache,
            access,
            target = %description,
            "Mounted route"
        );
        routes.push(MountedRoute {
            method: node.method,
            path,
            filters: filter_count,
            cache: node.cache,
            access,
            target: description,
        });
    }

    metrics::record_routes_mounted(routes.len());
    tracing::info!(routes = routes.len(), disabled, "Route table compiled");
    Ok(Compiled { engine, routes })
}

/// Mount a static target, without filters directly, otherwise through a
/// prefix group that carries exactly `filters`.
fn mount_static(engine: axum::Router, path: &str, target: Target, filters: Vec<Filter>) -> axum::Router {
    if filters.is_empty() {
        return mount_service(engine, path, target);
    }

    let (group_path, service_path) = split_base(path);
    let group = mount_service(axum::Router::new(), service_path, target)
        .layer(axum::middleware::from_fn(into_middleware(filters)));
    if group_path == "/" {
        engine.merge(group)
    } else {
        engine.nest(group_path, group)
    }
}

fn mount_service(router: axum::Router, path: &str, target: Target) -> axum::Router {
    match target {
        Target::Dir(dir) => mount_dir(router, path, ServeDir::new(dir)),
        Target::Fs(fs) => mount_dir(router, path, fs),
        Target::File(file) => router.route_service(path, ServeFile::new(file)),
        Target::Handler(_) => router,
    }
}

fn mount_dir(router: axum::Router, path: &str, dir: ServeDir) -> axum::Router {
    if path == "/" {
        router.fallback_service(dir)
    } else {
        router.nest_service(path, dir)
    }
}
