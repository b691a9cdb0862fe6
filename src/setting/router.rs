//! Route setting pipeline.
//!
//! A [`RouterSetting`] is seeded from a flat node's identity and then folded
//! through programmatic [`RouterOption`]s followed by one option per
//! declarative [`RouterConfig`] rule. Later options overwrite earlier ones,
//! but a rule only touches the fields it actually provides.

use std::sync::Arc;

use crate::config::schema::{PluginSpec, RouterConfig};
use crate::routing::matcher::wildcard_match;
use crate::routing::RouteMethod;
use crate::setting::path::default_path;

/// What a single route should do once compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterSetting {
    pub package_name: String,
    pub service_name: String,
    pub method_name: String,
    pub path: String,
    pub method: RouteMethod,

    pub proxy_path: String,
    pub proxy_service: String,
    pub proxy_https: bool,
    pub plugins: Vec<PluginSpec>,
    pub cache: i64,
    pub off: bool,
    pub access: bool,
}

/// A programmatic or declarative mutation of a [`RouterSetting`].
pub type RouterOption = Arc<dyn Fn(&mut RouterSetting) + Send + Sync>;

/// Wrap a closure as a [`RouterOption`].
pub fn router_option<F>(f: F) -> RouterOption
where
    F: Fn(&mut RouterSetting) + Send + Sync + 'static,
{
    Arc::new(f)
}

impl RouterSetting {
    /// Seed a setting from route identity. An empty path falls back to the
    /// generated default path.
    pub fn new(
        package_name: &str,
        service_name: &str,
        method_name: &str,
        path: &str,
        method: RouteMethod,
    ) -> Self {
        let path = if path.is_empty() {
            default_path(package_name, service_name, method_name)
        } else {
            path.to_string()
        };
        Self {
            package_name: package_name.to_string(),
            service_name: service_name.to_string(),
            method_name: method_name.to_string(),
            path,
            method,
            proxy_path: String::new(),
            proxy_service: String::new(),
            proxy_https: false,
            plugins: Vec::new(),
            cache: 0,
            off: false,
            access: false,
        }
    }

    /// Apply `options` left to right.
    pub fn apply<'a, I>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = &'a RouterOption>,
    {
        for option in options {
            option(&mut self);
        }
        self
    }
}

/// Empty pattern matches everything.
pub(crate) fn pattern_matches(value: &str, pattern: &str) -> bool {
    pattern.is_empty() || wildcard_match(value, pattern)
}

impl RouterConfig {
    /// Whether this rule applies to the route described by `setting`.
    pub fn matches(&self, setting: &RouterSetting) -> bool {
        pattern_matches(&setting.package_name, &self.package)
            && pattern_matches(&setting.service_name, &self.service)
            && pattern_matches(&setting.method_name, &self.method)
            && pattern_matches(&setting.path, &self.path)
            && (self.methods.is_empty() || self.methods.iter().any(|m| setting.method.is(m)))
    }

    /// Overwrite the fields this rule provides.
    pub fn apply_to(&self, setting: &mut RouterSetting) {
        if !self.proxy_path.is_empty() {
            setting.proxy_path = self.proxy_path.clone();
        }
        if !self.proxy_service.is_empty() {
            setting.proxy_service = self.proxy_service.clone();
        }
        if let Some(https) = self.proxy_https {
            setting.proxy_https = https;
        }
        if !self.plugins.is_empty() {
            setting.plugins = self.plugins.clone();
        }
        if self.cache > 0 {
            setting.cache = self.cache;
        }
        if let Some(off) = self.off {
            setting.off = off;
        }
        if let Some(access) = self.access {
            setting.access = access;
        }
    }
}

/// One option per rule, in configuration order.
pub fn merge_router_config(configs: &[RouterConfig]) -> Vec<RouterOption> {
    configs
        .iter()
        .map(|config| {
            let config = config.clone();
            router_option(move |setting| {
                if config.matches(setting) {
                    config.apply_to(setting);
                }
            })
        })
        .collect()
}
