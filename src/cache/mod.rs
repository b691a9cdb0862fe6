//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Request → cache wrapper (ttl > 0 only)
//!     → fingerprint.rs (METHOD:path:query[:sha256(body)], body re-wrapped)
//!         body over limit → handler, uncached
//!     → store lookup
//!         hit  (age < ttl) → CachedResponse::to_response → client
//!         miss             → handler
//!                          → status in window? → capture.rs RecordingBody
//!                          → body fully sent   → store save
//!
//! Backends:
//!     none.rs   → handler returned unchanged
//!     memory.rs → RwLock<HashMap<key, Arc<entry>>>
//!     remote.rs → GET / SETEX on a key-value server, codec.rs blobs
//! ```
//!
//! # Design Decisions
//! - One wrapper drives every backend; a backend only loads and saves entries
//! - Backend failures are cache misses or skipped writes, never request errors
//! - `ttl <= 0` returns the handler itself, so uncached routes pay nothing

pub mod capture;
pub mod codec;
pub mod fingerprint;
pub mod memory;
pub mod none;
pub mod remote;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::schema::CacheConfig;
use crate::observability::metrics;
use crate::routing::Handler;

pub use capture::{CachedResponse, StatusWindow};
pub use codec::CodecError;
pub use memory::MemoryCache;
pub use none::NoneCache;
pub use remote::{RedisStore, RemoteCache, RemoteStore};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("unsupported cache type {0:?}")]
    UnsupportedType(String),

    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid cache backend address: {0}")]
    Address(String),

    #[error("cache backend unavailable")]
    Unavailable,
}

/// A backend that can wrap handlers with response caching.
pub trait ResponseCache: Send + Sync {
    /// Short backend name used in logs and metric labels.
    fn backend(&self) -> &'static str;

    /// Wrap `handler` so responses are cached for `ttl` seconds.
    fn cache(&self, ttl: i64, handler: Handler) -> Handler;

    /// Release backend resources. Wrapped handlers keep working as pass-through.
    fn close(&self);
}

/// Build the backend named by `config.kind`.
pub fn new_cache(config: &CacheConfig) -> Result<Arc<dyn ResponseCache>, CacheError> {
    let config = config.clone().normalized();
    let policy = CachePolicy::from(&config);
    let cache: Arc<dyn ResponseCache> = match config.kind.as_str() {
        "" | "none" => Arc::new(NoneCache),
        "memory" => Arc::new(MemoryCache::new(config.max_memory_size, policy)),
        "redis" => Arc::new(RemoteCache::new(RedisStore::new(&config.redis)?, policy)),
        other => return Err(CacheError::UnsupportedType(other.to_string())),
    };
    tracing::info!(backend = cache.backend(), "Response cache initialized");
    Ok(cache)
}

/// What the shared wrapper needs to know besides the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub window: StatusWindow,
    pub max_body_size: usize,
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            window: StatusWindow {
                min: config.min_status_code,
                max: config.max_status_code,
            },
            max_body_size: config.max_body_size,
        }
    }
}

/// Entry storage behind the shared wrapper.
pub(crate) trait EntryStore: Send + Sync + 'static {
    fn backend(&self) -> &'static str;

    /// A fresh entry for `key`, if any.
    fn load(&self, key: &str, ttl: i64) -> BoxFuture<'static, Option<Arc<CachedResponse>>>;

    /// Store `response` under `key`, aged from `started` (request arrival).
    /// Must not block the caller on I/O.
    fn save(&self, key: String, ttl: i64, response: CachedResponse, started: Instant);
}

pub(crate) fn wrap<S: EntryStore>(store: Arc<S>, policy: CachePolicy, ttl: i64, handler: Handler) -> Handler {
    if ttl <= 0 {
        return handler;
    }

    Arc::new(move |req: Request| {
        let store = store.clone();
        let handler = handler.clone();
        async move {
            let started = Instant::now();
            let backend = store.backend();
            let (req, key) = match fingerprint::fingerprint(req, policy.max_body_size).await {
                Ok((req, Some(key))) => (req, key),
                Ok((req, None)) => {
                    tracing::debug!(backend, limit = policy.max_body_size, "Request body over limit, not caching");
                    return handler(req).await;
                }
                Err(err) => {
                    tracing::warn!(backend, error = %err, "Failed to read request body");
                    return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
                }
            };

            if let Some(hit) = store.load(&key, ttl).await {
                metrics::record_cache_lookup(backend, true);
                tracing::trace!(backend, key = %key, "Cache hit");
                return hit.to_response();
            }
            metrics::record_cache_lookup(backend, false);

            let response = handler(req).await;
            if !policy.window.contains(response.status()) {
                return response;
            }

            capture::record(response, policy.max_body_size, move |captured| {
                store.save(key, ttl, captured, started);
                metrics::record_cache_store(backend);
            })
        }
        .boxed()
    })
}
