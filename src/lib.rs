//! rpcgate: an API gateway core exposing RPC-style services over HTTP and
//! WebSocket.
//!
//! # Architecture Overview
//!
//! ```text
//!   Server::register_service / with_router / router()
//!        │
//!        ▼
//!   ┌──────────┐  flatten   ┌──────────────┐  settings + proxies  ┌────────────┐
//!   │ routing  │──────────▶│  compiler    │─────────────────────▶│ axum       │
//!   │  tree    │  FlatNode  │ (setting,    │  access + plugins    │ Router     │
//!   └──────────┘            │  plugin,     │  + cache wrapper     │ (Gateway)  │
//!                           │  proxy)      │                      └─────┬──────┘
//!                           └──────────────┘                            │
//!                                                                       ▼
//!   ┌───────────────────────────────────────────────────────────────────────────┐
//!   │ Cross-cutting: config · cache (none/memory/redis) · access · observability │
//!   │                security (hostsallow) · lifecycle (signals, shutdown)      │
//!   └───────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod service;
pub mod setting;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::{Gateway, Server};
pub use lifecycle::Shutdown;
pub use service::{ApiResponse, CallContext, ServiceError, ServiceHandler};
