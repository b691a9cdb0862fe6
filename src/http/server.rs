//! Gateway server: registration API, compilation and the serve loop.
//!
//! # Responsibilities
//! - Collect services, router callbacks, options and plugins
//! - Turn every enabled service method into a POST (HTTP) or GET (WebSocket) route
//! - Compile the route tree against a [`GatewayConfig`] into a [`Gateway`]
//! - Serve the compiled engine until shutdown, then release the cache
//!
//! # Design Decisions
//! - Registration is infallible; every mistake surfaces from `compile`
//! - Service plugins are resolved ahead of the method's programmatic filters
//! - Declarative server plugins apply before programmatic server options

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::access::access_filter;
use crate::cache::{new_cache, ResponseCache};
use crate::compiler::{self, CompileContext, MountedRoute, PluginRegistry, ServerOption};
use crate::config::schema::{GatewayConfig, PluginSpec};
use crate::error::GatewayError;
use crate::lifecycle::shutdown;
use crate::routing::{Filter, Handler, Node, RouteError, RouteMethod, Router, Target};
use crate::security::hosts_allow;
use crate::service::{http_handler, websocket_handler, ServiceHandler, WebSocketSettings};
use crate::setting::{RouterOption, ServiceOption};

type RouterCallback = Box<dyn FnOnce(&mut Router) -> Result<(), RouteError> + Send>;

/// Gateway builder.
pub struct Server {
    router: Router,
    callbacks: Vec<RouterCallback>,
    router_options: Vec<RouterOption>,
    service_options: Vec<ServiceOption>,
    server_options: Vec<ServerOption>,
    plugins: PluginRegistry,
    services: Vec<ServiceHandler>,
    client: reqwest::Client,
}

impl Server {
    /// A server with the built-in `hostsallow` plugin registered in both flavours.
    pub fn new() -> Self {
        let mut plugins = PluginRegistry::new();
        plugins.register_router(hosts_allow::PLUGIN_NAME, hosts_allow::router_plugin);
        plugins.register_server(hosts_allow::PLUGIN_NAME, hosts_allow::server_plugin);
        Self {
            router: Router::new(),
            callbacks: Vec::new(),
            router_options: Vec::new(),
            service_options: Vec::new(),
            server_options: Vec::new(),
            plugins,
            services: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Root router, for direct registration.
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Run `callback` against the root router after services are registered.
    pub fn with_router<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError> + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn router_option(&mut self, option: RouterOption) -> &mut Self {
        self.router_options.push(option);
        self
    }

    pub fn service_option(&mut self, option: ServiceOption) -> &mut Self {
        self.service_options.push(option);
        self
    }

    pub fn server_option(&mut self, option: ServerOption) -> &mut Self {
        self.server_options.push(option);
        self
    }

    pub fn router_plugin<F>(&mut self, name: impl Into<String>, plugin: F) -> &mut Self
    where
        F: Fn(&[String]) -> Vec<Filter> + Send + Sync + 'static,
    {
        self.plugins.register_router(name, plugin);
        self
    }

    pub fn server_plugin<F>(&mut self, name: impl Into<String>, plugin: F) -> &mut Self
    where
        F: Fn(&[String]) -> Option<ServerOption> + Send + Sync + 'static,
    {
        self.plugins.register_server(name, plugin);
        self
    }

    pub fn register_service(&mut self, handler: ServiceHandler) -> &mut Self {
        self.services.push(handler);
        self
    }

    /// Build the dispatch table for `config`.
    pub fn compile(mut self, config: &GatewayConfig) -> Result<Gateway, GatewayError> {
        let services = std::mem::take(&mut self.services);
        let websocket = WebSocketSettings::from(&config.websocket);
        for handler in &services {
            self.mount_service(handler, config, websocket)?;
        }
        for callback in std::mem::take(&mut self.callbacks) {
            callback(&mut self.router)?;
        }

        let cache = new_cache(&config.cache)?;
        let access = config.access_log.enabled.then(access_filter);
        let ctx = CompileContext {
            router_config: &config.router_config,
            router_options: &self.router_options,
            router_plugins: &config.router_plugins,
            upstreams: &config.upstreams,
            plugins: &self.plugins,
            cache: cache.as_ref(),
            access,
            client: self.client.clone(),
        };
        let compiled = compiler::compile(&ctx, self.router.flatten())?;

        let declared = self.plugins.resolve_server(&config.server_plugins)?;
        let engine = declared
            .iter()
            .chain(self.server_options.iter())
            .fold(compiled.engine, |engine, option| option(engine));

        Ok(Gateway {
            engine,
            routes: compiled.routes,
            cache,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    fn mount_service(
        &mut self,
        handler: &ServiceHandler,
        config: &GatewayConfig,
        websocket: WebSocketSettings,
    ) -> Result<(), GatewayError> {
        let setting = handler.setting(&self.service_options, &config.service_config);
        for (name, adapter) in &handler.adapters {
            let Some(method) = setting.methods.get(name) else {
                continue;
            };
            if !method.http_off {
                let filters = self.endpoint_filters(&method.http_plugins, &method.http_filters)?;
                let target = http_handler(handler.context(name), adapter.clone());
                self.insert_endpoint(handler, name, Method::POST, &method.http_path, filters, target)?;
            }
            if !method.wbsk_off {
                let filters = self.endpoint_filters(&method.wbsk_plugins, &method.wbsk_filters)?;
                let target = websocket_handler(handler.context(name), adapter.clone(), websocket);
                self.insert_endpoint(handler, name, Method::GET, &method.wbsk_path, filters, target)?;
            }
        }
        tracing::debug!(
            package = %handler.package_name,
            service = %handler.service_name,
            methods = handler.adapters.len(),
            "Service registered"
        );
        Ok(())
    }

    fn endpoint_filters(&self, plugins: &[PluginSpec], filters: &[Filter]) -> Result<Vec<Filter>, GatewayError> {
        let mut chain = self.plugins.resolve_router(plugins)?;
        chain.extend(filters.iter().cloned());
        Ok(chain)
    }

    fn insert_endpoint(
        &mut self,
        handler: &ServiceHandler,
        name: &str,
        method: Method,
        path: &str,
        filters: Vec<Filter>,
        target: Handler,
    ) -> Result<(), GatewayError> {
        let node = Node::new(Target::Handler(target))
            .with_origin(&handler.package_name, &handler.service_name, name)
            .with_filters(filters);
        self.router.insert(RouteMethod::Http(method), path, node)?;
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled, servable gateway.
pub struct Gateway {
    engine: axum::Router,
    routes: Vec<MountedRoute>,
    cache: Arc<dyn ResponseCache>,
    request_timeout: Duration,
}

impl Gateway {
    /// Dispatch table in mount order.
    pub fn routes(&self) -> &[MountedRoute] {
        &self.routes
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// The engine without the serve-time layers.
    pub fn into_router(self) -> axum::Router {
        self.engine
    }

    /// Serve on `listener` until `shutdown` fires.
    #[allow(deprecated)]
    pub async fn serve(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        let mut app = self.engine;
        if !self.request_timeout.is_zero() {
            app = app.layer(TimeoutLayer::new(self.request_timeout));
        }
        let app = app.layer(TraceLayer::new_for_http());

        tracing::info!(
            address = %addr,
            routes = self.routes.len(),
            cache = self.cache.backend(),
            "Gateway listening"
        );

        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await;

        self.cache.close();
        tracing::info!("Gateway stopped");
        result.map_err(GatewayError::from)
    }
}
