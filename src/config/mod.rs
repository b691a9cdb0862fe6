//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → GatewayConfig (validated, immutable)
//!     → Server::compile reads rules, plugins, cache and listener settings
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Optional booleans distinguish "unset" from "false" in rules

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, GatewayConfig, ListenerConfig, PluginSpec, RedisConfig, RouterConfig, ServiceConfig,
    WebSocketConfig,
};
pub use validation::{validate_config, ValidationError};
