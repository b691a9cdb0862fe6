//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! Server (registration API)
//!     services → POST/GET endpoints on the root Router
//!     with_router callbacks → more routes
//!     → Server::compile(&GatewayConfig)
//!         → compiler (route table, cache, access, plugins)
//!         → server plugins, then server options
//!     → Gateway { engine, routes, cache }
//!     → Gateway::serve (trace + timeout layers, connect info, graceful shutdown)
//! ```

pub mod server;

pub use server::{Gateway, Server};
