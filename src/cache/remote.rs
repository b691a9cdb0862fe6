//! Remote response cache.
//!
//! # Responsibilities
//! - Serialize captured responses with the binary codec
//! - GET on lookup, SETEX (expiry = route TTL) on save
//! - Keep the Redis connection lazy so startup never depends on the server
//! - Bound every connect and command, and back off after a failed connect
//!
//! # Design Decisions
//! - Expiry is enforced by the server; a present key is a fresh key
//! - Writes run on a spawned task, never on the response path
//! - Backend and decode failures are logged and treated as misses

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use url::Url;

use crate::cache::capture::CachedResponse;
use crate::cache::{codec, wrap, CacheError, CachePolicy, EntryStore, ResponseCache};
use crate::config::schema::RedisConfig;
use crate::routing::Handler;

const BACKEND: &str = "redis";

const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(250);
const CONNECT_RETRIES: usize = 1;
const CONNECT_BACKOFF_MS: u64 = 10;
/// Upper bound on one connect attempt including its retries.
const CONNECT_BUDGET: Duration = Duration::from_millis(750);
/// After a failed connect, requests skip the server for this long.
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

/// A key-value server with per-key expiry.
pub trait RemoteStore: Send + Sync + 'static {
    fn get(&self, key: String) -> BoxFuture<'static, Result<Option<Vec<u8>>, CacheError>>;

    fn set_ex(&self, key: String, value: Bytes, ttl_secs: u64) -> BoxFuture<'static, Result<(), CacheError>>;

    /// Drop connections. Later calls behave as an empty store.
    fn close(&self) {}
}

struct RedisInner {
    client: redis::Client,
    key_prefix: String,
    conn: Mutex<Option<ConnectionManager>>,
    failed_at: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

/// [`RemoteStore`] over a Redis [`ConnectionManager`], connected on first use.
#[derive(Clone)]
pub struct RedisStore {
    inner: Arc<RedisInner>,
}

impl RedisStore {
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url(config)?.as_str())?;
        Ok(Self {
            inner: Arc::new(RedisInner {
                client,
                key_prefix: config.key_prefix.clone(),
                conn: Mutex::new(None),
                failed_at: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

fn redis_url(config: &RedisConfig) -> Result<Url, CacheError> {
    let mut url = Url::parse(&format!("redis://{}/{}", config.address, config.select))
        .map_err(|e| CacheError::Address(format!("{}: {}", config.address, e)))?;
    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| CacheError::Address(config.address.clone()))?;
    }
    Ok(url)
}

impl RedisInner {
    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let cached = self.conn.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let cooling = self
            .failed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|at| at.elapsed() < RECONNECT_COOLDOWN);
        if cooling {
            return Err(CacheError::Unavailable);
        }

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_factor(CONNECT_BACKOFF_MS)
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);
        let attempt = tokio::time::timeout(
            CONNECT_BUDGET,
            ConnectionManager::new_with_config(self.client.clone(), config),
        )
        .await;

        match attempt {
            Ok(Ok(conn)) => {
                tracing::info!(backend = BACKEND, "Connected to cache server");
                *self.failed_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
                let mut slot = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(slot.get_or_insert(conn).clone())
            }
            Ok(Err(err)) => {
                self.mark_failed(&err);
                Err(err.into())
            }
            Err(_) => {
                self.mark_failed(&"connect timed out");
                Err(CacheError::Unavailable)
            }
        }
    }

    fn mark_failed(&self, err: &dyn std::fmt::Display) {
        tracing::warn!(
            backend = BACKEND,
            error = %err,
            cooldown_secs = RECONNECT_COOLDOWN.as_secs(),
            "Cache server unreachable"
        );
        *self.failed_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

impl RemoteStore for RedisStore {
    fn get(&self, key: String) -> BoxFuture<'static, Result<Option<Vec<u8>>, CacheError>> {
        let inner = self.inner.clone();
        async move {
            if inner.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            let mut conn = inner.connection().await?;
            let value: Option<Vec<u8>> = conn.get(inner.key(&key)).await?;
            Ok(value)
        }
        .boxed()
    }

    fn set_ex(&self, key: String, value: Bytes, ttl_secs: u64) -> BoxFuture<'static, Result<(), CacheError>> {
        let inner = self.inner.clone();
        async move {
            if inner.closed.load(Ordering::Acquire) {
                return Ok(());
            }
            let mut conn = inner.connection().await?;
            conn.set_ex::<_, _, ()>(inner.key(&key), value.to_vec(), ttl_secs).await?;
            Ok(())
        }
        .boxed()
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.conn.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

pub(crate) struct RemoteEntries<S> {
    store: Arc<S>,
}

impl<S: RemoteStore> EntryStore for RemoteEntries<S> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn load(&self, key: &str, _ttl: i64) -> BoxFuture<'static, Option<Arc<CachedResponse>>> {
        let fetch = self.store.get(key.to_string());
        async move {
            match fetch.await {
                Ok(Some(raw)) => match codec::decode(&raw) {
                    Ok(response) => Some(Arc::new(response)),
                    Err(err) => {
                        tracing::debug!(backend = BACKEND, error = %err, "Discarding undecodable cache entry");
                        None
                    }
                },
                Ok(None) => None,
                Err(CacheError::Unavailable) => None,
                Err(err) => {
                    tracing::warn!(backend = BACKEND, error = %err, "Cache lookup failed");
                    None
                }
            }
        }
        .boxed()
    }

    fn save(&self, key: String, ttl: i64, response: CachedResponse, _started: Instant) {
        let encoded = match codec::encode(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::debug!(backend = BACKEND, error = %err, "Skipping unencodable response");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let write = self.store.set_ex(key, encoded, ttl.max(1) as u64);
        runtime.spawn(async move {
            match write.await {
                Ok(()) | Err(CacheError::Unavailable) => {}
                Err(err) => {
                    tracing::warn!(backend = BACKEND, error = %err, "Cache write failed");
                }
            }
        });
    }
}

/// Backend storing codec blobs in a [`RemoteStore`].
pub struct RemoteCache<S> {
    entries: Arc<RemoteEntries<S>>,
    policy: CachePolicy,
}

impl<S: RemoteStore> RemoteCache<S> {
    pub fn new(store: S, policy: CachePolicy) -> Self {
        Self {
            entries: Arc::new(RemoteEntries {
                store: Arc::new(store),
            }),
            policy,
        }
    }
}

impl<S: RemoteStore> ResponseCache for RemoteCache<S> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn cache(&self, ttl: i64, handler: Handler) -> Handler {
        wrap(self.entries.clone(), self.policy, ttl, handler)
    }

    fn close(&self) {
        self.entries.store.close();
    }
}
