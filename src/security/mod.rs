//! Security plugins.
//!
//! # Data Flow
//! ```text
//! router_plugins / server_plugins = [["hostsallow", pattern...]]
//!     → PluginRegistry (registered by Server::new)
//!     → hosts_allow.rs (client IP against wildcard patterns)
//!     → 403 on mismatch, otherwise the rest of the chain
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unknown client address is rejected
//! - The same check serves both plugin flavours

pub mod hosts_allow;

pub use hosts_allow::HostsAllow;
