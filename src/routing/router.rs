//! Route tree and flattening.
//!
//! # Responsibilities
//! - Collect route registrations into a tree of path-prefix groups
//! - Reject duplicate (method, path) registrations within one group
//! - Flatten the tree into [`FlatNode`]s with full paths and inherited filters
//!
//! # Design Decisions
//! - Children are owned by their parent; no back-references
//! - Registration order is preserved so flattening is deterministic
//! - Group filters are read at flatten time, so `use_filters` after `group`
//!   still reaches every descendant

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use axum::http::Method;
use tower_http::services::ServeDir;

use crate::routing::chain::{join_filters, Filter, Handler};
use crate::routing::method::RouteMethod;
use crate::routing::RouteError;

/// What a route ultimately serves.
#[derive(Clone)]
pub enum Target {
    Handler(Handler),
    /// Directory on disk (`Static`).
    Dir(PathBuf),
    /// Single file on disk (`StaticFile`).
    File(PathBuf),
    /// Pre-configured directory service (`StaticFS`).
    Fs(ServeDir),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Handler(_) => f.write_str("Handler"),
            Target::Dir(p) => f.debug_tuple("Dir").field(p).finish(),
            Target::File(p) => f.debug_tuple("File").field(p).finish(),
            Target::Fs(_) => f.write_str("Fs"),
        }
    }
}

/// One registered endpoint before flattening.
#[derive(Clone)]
pub struct Node {
    pub package_name: String,
    pub service_name: String,
    pub method_name: String,
    pub filters: Vec<Filter>,
    pub target: Target,
}

impl Node {
    pub fn new(target: Target) -> Self {
        Self {
            package_name: String::new(),
            service_name: String::new(),
            method_name: String::new(),
            filters: Vec::new(),
            target,
        }
    }

    /// Tag the node with the service method it was generated from.
    pub fn with_origin(
        mut self,
        package_name: impl Into<String>,
        service_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        self.package_name = package_name.into();
        self.service_name = service_name.into();
        self.method_name = method_name.into();
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }
}

/// A node after flattening, plus the attributes the compiler fills in.
#[derive(Clone)]
pub struct FlatNode {
    pub package_name: String,
    pub service_name: String,
    pub method_name: String,
    pub filters: Vec<Filter>,
    pub target: Target,
    pub path: String,
    pub method: RouteMethod,

    pub off: bool,
    pub cache: i64,
    pub access: bool,
    pub plugins: Vec<Vec<String>>,
}

impl FlatNode {
    /// A node with no origin tags, used for synthetic routes such as proxies.
    pub fn synthetic(method: RouteMethod, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            package_name: String::new(),
            service_name: String::new(),
            method_name: String::new(),
            filters: Vec::new(),
            target: Target::Handler(handler),
            path: path.into(),
            method,
            off: false,
            cache: 0,
            access: false,
            plugins: Vec::new(),
        }
    }
}

impl fmt::Debug for FlatNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatNode")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("service", &self.service_name)
            .field("rpc", &self.method_name)
            .field("filters", &self.filters.len())
            .field("target", &self.target)
            .field("off", &self.off)
            .field("cache", &self.cache)
            .field("access", &self.access)
            .finish()
    }
}

struct Route {
    method: RouteMethod,
    path: String,
    node: Node,
}

/// A route group: a path prefix, its own filters, its routes and child groups.
#[derive(Default)]
pub struct Router {
    path: String,
    filters: Vec<Filter>,
    routes: Vec<Route>,
    registered: HashSet<(RouteMethod, String)>,
    children: Vec<Router>,
}

impl Router {
    /// Create an empty root router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a child group under `path` and return it.
    pub fn group(&mut self, path: impl Into<String>, filters: Vec<Filter>) -> &mut Router {
        self.children.push(Router {
            path: path.into(),
            filters,
            ..Router::default()
        });
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append filters inherited by every route in this group and its descendants.
    pub fn use_filters(&mut self, filters: impl IntoIterator<Item = Filter>) -> &mut Self {
        self.filters.extend(filters);
        self
    }

    /// Register `handler` for `method` and `path`, behind `filters`.
    pub fn handle(
        &mut self,
        method: Method,
        path: impl Into<String>,
        filters: Vec<Filter>,
        handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        let node = Node::new(Target::Handler(handler)).with_filters(filters);
        self.insert(RouteMethod::Http(method), path, node)
    }

    pub fn get(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::GET, path, Vec::new(), handler)
    }

    pub fn post(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::POST, path, Vec::new(), handler)
    }

    pub fn put(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::PUT, path, Vec::new(), handler)
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::PATCH, path, Vec::new(), handler)
    }

    pub fn delete(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::DELETE, path, Vec::new(), handler)
    }

    pub fn options(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::OPTIONS, path, Vec::new(), handler)
    }

    pub fn head(&mut self, path: impl Into<String>, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::HEAD, path, Vec::new(), handler)
    }

    /// Register `handler` for GET, POST, DELETE, PATCH, PUT, OPTIONS and HEAD.
    pub fn any(
        &mut self,
        path: impl Into<String>,
        filters: Vec<Filter>,
        handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        let path = path.into();
        for method in [
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::PUT,
            Method::OPTIONS,
            Method::HEAD,
        ] {
            self.handle(method, path.clone(), filters.clone(), handler.clone())?;
        }
        Ok(self)
    }

    /// Serve the directory `dir` under `path`.
    pub fn static_dir(&mut self, path: impl Into<String>, dir: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        self.insert(RouteMethod::Static, path, Node::new(Target::Dir(dir.into())))
    }

    /// Serve the single file `file` at `path`.
    pub fn static_file(&mut self, path: impl Into<String>, file: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        self.insert(RouteMethod::StaticFile, path, Node::new(Target::File(file.into())))
    }

    /// Serve a pre-built directory service under `path`.
    pub fn static_fs(&mut self, path: impl Into<String>, fs: ServeDir) -> Result<&mut Self, RouteError> {
        self.insert(RouteMethod::StaticFs, path, Node::new(Target::Fs(fs)))
    }

    /// Register a fully built node.
    pub fn insert(
        &mut self,
        method: RouteMethod,
        path: impl Into<String>,
        node: Node,
    ) -> Result<&mut Self, RouteError> {
        let path = path.into();
        if !self.registered.insert((method.clone(), path.clone())) {
            return Err(RouteError::Duplicate {
                method: method.to_string(),
                path: format!("{}{}", self.path, path),
            });
        }
        self.routes.push(Route { method, path, node });
        Ok(self)
    }

    /// Flatten the tree depth-first, pre-order.
    pub fn flatten(&self) -> Vec<FlatNode> {
        let mut out = Vec::new();
        flatten_into(&mut out, self, "", &[]);
        out
    }
}

fn flatten_into(out: &mut Vec<FlatNode>, router: &Router, prefix: &str, chain: &[Filter]) {
    let prefix = format!("{}{}", prefix, router.path);
    let chain = join_filters(chain, &router.filters);

    for route in &router.routes {
        let node = &route.node;
        out.push(FlatNode {
            package_name: node.package_name.clone(),
            service_name: node.service_name.clone(),
            method_name: node.method_name.clone(),
            filters: join_filters(&chain, &node.filters),
            target: node.target.clone(),
            path: format!("{}{}", prefix, route.path),
            method: route.method.clone(),
            off: false,
            cache: 0,
            access: false,
            plugins: Vec::new(),
        });
    }

    for child in &router.children {
        flatten_into(out, child, &prefix, &chain);
    }
}
