//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Optional booleans (`off`, `access`, ...) stay `None` when a rule does not
//! mention them, which is how "explicitly false" is told apart from "unset".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named plugin invocation: first token is the plugin name, the rest are arguments.
pub type PluginSpec = Vec<String>;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response cache used by routes with `cache > 0`.
    pub cache: CacheConfig,

    /// Access log settings.
    pub access_log: AccessLogConfig,

    /// WebSocket upgrade settings for service endpoints.
    pub websocket: WebSocketConfig,

    /// External service name -> `host:port`.
    pub upstreams: HashMap<String, String>,

    /// Per-route rules: proxy / plugins / cache / off / access.
    pub router_config: Vec<RouterConfig>,

    /// Per-service rules generating HTTP and WebSocket endpoints.
    pub service_config: Vec<ServiceConfig>,

    /// Router plugins applied ahead of every route.
    pub router_plugins: Vec<PluginSpec>,

    /// Server plugins applied to the compiled engine.
    pub server_plugins: Vec<PluginSpec>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds (0 disables).
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

pub const DEFAULT_MAX_MEMORY_SIZE: usize = i16::MAX as usize;
pub const DEFAULT_MIN_STATUS_CODE: u16 = 200;
pub const DEFAULT_MAX_STATUS_CODE: u16 = 399;
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend: "" or "none", "memory", "redis".
    #[serde(rename = "type")]
    pub kind: String,

    /// Entry count at which the in-memory map is discarded.
    pub max_memory_size: usize,

    /// Lowest cacheable status code (inclusive).
    pub min_status_code: u16,

    /// Highest cacheable status code (inclusive).
    pub max_status_code: u16,

    /// Largest request or response body buffered for caching, in bytes.
    /// Larger exchanges pass through uncached.
    pub max_body_size: usize,

    /// Remote backend connection.
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: String::new(),
            max_memory_size: DEFAULT_MAX_MEMORY_SIZE,
            min_status_code: DEFAULT_MIN_STATUS_CODE,
            max_status_code: DEFAULT_MAX_STATUS_CODE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Replace zero values with defaults.
    pub fn normalized(mut self) -> Self {
        if self.max_memory_size == 0 {
            self.max_memory_size = DEFAULT_MAX_MEMORY_SIZE;
        }
        if self.min_status_code == 0 {
            self.min_status_code = DEFAULT_MIN_STATUS_CODE;
        }
        if self.max_status_code == 0 {
            self.max_status_code = DEFAULT_MAX_STATUS_CODE;
        }
        if self.max_body_size == 0 {
            self.max_body_size = DEFAULT_MAX_BODY_SIZE;
        }
        self
    }
}

/// Redis connection settings for the remote cache backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port` of the server.
    pub address: String,

    /// Optional AUTH password.
    pub password: Option<String>,

    /// Database index.
    pub select: u32,

    /// Prepended to every cache key.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            select: 0,
            key_prefix: String::new(),
        }
    }
}

/// Access log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Emit access records for routes with `access` enabled.
    pub enabled: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// WebSocket endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Read buffer size in bytes (0 = library default).
    pub read_buffer_size: usize,

    /// Write buffer size in bytes (0 = library default).
    pub write_buffer_size: usize,

    /// Accept upgrades whose Origin does not match Host.
    pub not_check_origin: bool,
}

/// Declarative route rule. Empty strings and `None` mean "do not match on" /
/// "do not override".
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Package name pattern.
    pub package: String,

    /// Service name pattern.
    pub service: String,

    /// Service method name pattern.
    pub method: String,

    /// Route path pattern; for proxy rules, the exposed path.
    pub path: String,

    /// HTTP methods the rule applies to (empty = all).
    pub methods: Vec<String>,

    /// Target path of a proxy rule.
    pub proxy_path: String,

    /// External service to proxy to (empty = internal alias).
    pub proxy_service: String,

    /// Use TLS towards the external service.
    pub proxy_https: Option<bool>,

    /// Plugins applied to the matched routes.
    pub plugins: Vec<PluginSpec>,

    /// Cache TTL in seconds.
    pub cache: i64,

    /// Disable the matched routes.
    pub off: Option<bool>,

    /// Access logging for the matched routes.
    pub access: Option<bool>,
}

/// Declarative service rule, fanned out over the methods of matched services.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub package: String,
    pub service: String,
    pub method: String,
    pub http_off: Option<bool>,
    pub http_path: String,
    pub http_plugins: Vec<PluginSpec>,
    pub wbsk_off: Option<bool>,
    pub wbsk_path: String,
    pub wbsk_plugins: Vec<PluginSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.cache.kind, "");
        assert_eq!(config.cache.max_memory_size, 32767);
        assert_eq!(config.cache.min_status_code, 200);
        assert_eq!(config.cache.max_status_code, 399);
        assert!(config.access_log.enabled);
    }

    #[test]
    fn test_parse_rules() {
        let toml_str = r#"
            router_plugins = [["hostsallow", "10.*"]]

            [cache]
            type = "memory"
            max_memory_size = 0

            [[router_config]]
            path = "/legacy/*"
            methods = ["GET"]
            cache = 30
            off = false

            [[router_config]]
            path = "/v2/user"
            methods = ["POST"]
            proxy_path = "/user/get"
            proxy_service = "user-api"
            plugins = [["hostsallow", "127.0.0.1"]]

            [[service_config]]
            service = "UserService"
            wbsk_off = false
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.kind, "memory");
        assert_eq!(config.cache.clone().normalized().max_memory_size, DEFAULT_MAX_MEMORY_SIZE);
        assert_eq!(config.router_plugins, vec![vec!["hostsallow".to_string(), "10.*".to_string()]]);

        let first = &config.router_config[0];
        assert_eq!(first.off, Some(false));
        assert_eq!(first.access, None);
        assert_eq!(first.cache, 30);

        let second = &config.router_config[1];
        assert_eq!(second.proxy_service, "user-api");
        assert_eq!(second.proxy_https, None);
        assert_eq!(second.plugins.len(), 1);

        let service = &config.service_config[0];
        assert_eq!(service.wbsk_off, Some(false));
        assert_eq!(service.http_off, None);
    }
}
