//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     Router::group / use_filters / handle / static_*
//!     → router.rs (tree of prefix groups, duplicate check per group)
//!
//! Flattening:
//!     Router::flatten()
//!     → FlatNode[] (full path, method, ancestor-then-local filters, target)
//!     → handed to the compiler
//!
//! Rule evaluation:
//!     matcher.rs (wildcard `*` / `?` over names and paths)
//! ```
//!
//! # Design Decisions
//! - The tree lives only until compilation; the compiled axum router is what serves
//! - Filters execute root-to-leaf, then node-local, then the handler
//! - Duplicate (method, path) within one group is an error at registration time

pub mod chain;
pub mod matcher;
pub mod method;
pub mod router;

pub use chain::{filter_fn, handler_fn, Chain, Filter, Handler, Next};
pub use method::RouteMethod;
pub use router::{FlatNode, Node, Router, Target};

use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("handle conflict: {method} {path} is already registered")]
    Duplicate { method: String, path: String },

    #[error("invalid route path {0:?}")]
    InvalidPath(String),

    #[error("invalid route method {0:?}")]
    InvalidMethod(String),
}
