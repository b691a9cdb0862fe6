//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (cache effectiveness, mounted routes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rpcgate_cache_lookups_total` (counter): lookups by backend and result (hit/miss)
//! - `rpcgate_cache_stores_total` (counter): captured responses handed to a backend
//! - `rpcgate_cache_evictions_total` (counter): bulk evictions of the memory cache
//! - `rpcgate_routes_mounted` (gauge): routes in the compiled dispatch table
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are static strings; no per-path cardinality

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(backend: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("rpcgate_cache_lookups_total", "backend" => backend, "result" => result).increment(1);
}

pub fn record_cache_store(backend: &'static str) {
    metrics::counter!("rpcgate_cache_stores_total", "backend" => backend).increment(1);
}

pub fn record_cache_eviction() {
    metrics::counter!("rpcgate_cache_evictions_total").increment(1);
}

pub fn record_routes_mounted(count: usize) {
    metrics::gauge!("rpcgate_routes_mounted").set(count as f64);
}
