//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject cache settings no backend can honour
//! - Reject proxy rules and plugin lists that cannot compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{GatewayConfig, PluginSpec};

const CACHE_TYPES: [&str; 4] = ["", "none", "memory", "redis"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported cache type {0:?}")]
    UnsupportedCacheType(String),

    #[error("cache min_status_code {min} is greater than max_status_code {max}")]
    StatusWindow { min: u16, max: u16 },

    #[error("router_config[{index}]: proxy rule needs both path and methods")]
    IncompleteProxyRule { index: usize },

    #[error("{location}: empty plugin invocation")]
    EmptyPlugin { location: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cache = config.cache.clone().normalized();
    if !CACHE_TYPES.contains(&cache.kind.as_str()) {
        errors.push(ValidationError::UnsupportedCacheType(cache.kind.clone()));
    }
    if cache.min_status_code > cache.max_status_code {
        errors.push(ValidationError::StatusWindow {
            min: cache.min_status_code,
            max: cache.max_status_code,
        });
    }

    for (index, rule) in config.router_config.iter().enumerate() {
        if !rule.proxy_path.is_empty() && (rule.path.is_empty() || rule.methods.is_empty()) {
            errors.push(ValidationError::IncompleteProxyRule { index });
        }
        check_plugins(&mut errors, &format!("router_config[{}].plugins", index), &rule.plugins);
    }
    for (index, rule) in config.service_config.iter().enumerate() {
        check_plugins(&mut errors, &format!("service_config[{}].http_plugins", index), &rule.http_plugins);
        check_plugins(&mut errors, &format!("service_config[{}].wbsk_plugins", index), &rule.wbsk_plugins);
    }
    check_plugins(&mut errors, "router_plugins", &config.router_plugins);
    check_plugins(&mut errors, "server_plugins", &config.server_plugins);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_plugins(errors: &mut Vec<ValidationError>, location: &str, plugins: &[PluginSpec]) {
    for (i, spec) in plugins.iter().enumerate() {
        if spec.first().map_or(true, |name| name.trim().is_empty()) {
            errors.push(ValidationError::EmptyPlugin {
                location: format!("{}[{}]", location, i),
            });
        }
    }
}
