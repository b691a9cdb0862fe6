//! Named plugin registry.
//!
//! A plugin invocation is a string list: the first token names the plugin,
//! the rest are its arguments. Router plugins expand into filters, server
//! plugins into an option applied to the compiled engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::CompileError;
use crate::config::schema::PluginSpec;
use crate::routing::Filter;

/// Transformation applied to the compiled engine.
pub type ServerOption = Arc<dyn Fn(axum::Router) -> axum::Router + Send + Sync>;

/// `args -> filters`. May return no filters.
pub type RouterPlugin = Arc<dyn Fn(&[String]) -> Vec<Filter> + Send + Sync>;

/// `args -> option`. `None` means the plugin has nothing to apply.
pub type ServerPlugin = Arc<dyn Fn(&[String]) -> Option<ServerOption> + Send + Sync>;

pub fn server_option<F>(f: F) -> ServerOption
where
    F: Fn(axum::Router) -> axum::Router + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Default)]
pub struct PluginRegistry {
    router: HashMap<String, RouterPlugin>,
    server: HashMap<String, ServerPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a router plugin.
    pub fn register_router<F>(&mut self, name: impl Into<String>, plugin: F)
    where
        F: Fn(&[String]) -> Vec<Filter> + Send + Sync + 'static,
    {
        self.router.insert(name.into(), Arc::new(plugin));
    }

    /// Register (or replace) a server plugin.
    pub fn register_server<F>(&mut self, name: impl Into<String>, plugin: F)
    where
        F: Fn(&[String]) -> Option<ServerOption> + Send + Sync + 'static,
    {
        self.server.insert(name.into(), Arc::new(plugin));
    }

    pub fn has_router(&self, name: &str) -> bool {
        self.router.contains_key(name)
    }

    pub fn has_server(&self, name: &str) -> bool {
        self.server.contains_key(name)
    }

    /// Expand every invocation in order. Empty invocations are skipped.
    pub fn resolve_router(&self, specs: &[PluginSpec]) -> Result<Vec<Filter>, CompileError> {
        let mut filters = Vec::new();
        for spec in specs {
            let Some((name, args)) = spec.split_first() else {
                continue;
            };
            let plugin = self
                .router
                .get(name)
                .ok_or_else(|| CompileError::UnknownRouterPlugin(spec.clone()))?;
            filters.extend(plugin(args));
        }
        Ok(filters)
    }

    pub fn resolve_server(&self, specs: &[PluginSpec]) -> Result<Vec<ServerOption>, CompileError> {
        let mut options = Vec::new();
        for spec in specs {
            let Some((name, args)) = spec.split_first() else {
                continue;
            };
            let plugin = self
                .server
                .get(name)
                .ok_or_else(|| CompileError::UnknownServerPlugin(spec.clone()))?;
            options.extend(plugin(args));
        }
        Ok(options)
    }
}
