//! In-process response cache.
//!
//! Entries live in a `RwLock<HashMap>`. Lookups take the read lock just long
//! enough to clone an `Arc`; saves take the write lock and swap in a whole new
//! entry, so a reader sees either the old (timestamp, response) pair or the new
//! one, never a mix. When the map is full and the key is new, the whole map is
//! dropped and started over.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use crate::cache::capture::{is_fresh, CachedResponse};
use crate::cache::{wrap, CachePolicy, EntryStore, ResponseCache};
use crate::observability::metrics;
use crate::routing::Handler;

const BACKEND: &str = "memory";

struct MemoryEntry {
    stored_at: Instant,
    response: Arc<CachedResponse>,
}

pub(crate) struct MemoryStore {
    capacity: usize,
    entries: RwLock<HashMap<String, Arc<MemoryEntry>>>,
}

impl MemoryStore {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &str, ttl: i64, now: Instant) -> Option<Arc<CachedResponse>> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        is_fresh(now.saturating_duration_since(entry.stored_at), ttl).then(|| entry.response.clone())
    }

    fn insert(&self, key: String, response: CachedResponse, now: Instant) {
        let entry = Arc::new(MemoryEntry {
            stored_at: now,
            response: Arc::new(response),
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            tracing::debug!(entries = entries.len(), "Memory cache full, discarding all entries");
            metrics::record_cache_eviction();
            *entries = HashMap::new();
        }
        entries.insert(key, entry);
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn clear(&self) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = HashMap::new();
    }
}

impl EntryStore for MemoryStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn load(&self, key: &str, ttl: i64) -> BoxFuture<'static, Option<Arc<CachedResponse>>> {
        future::ready(self.lookup(key, ttl, Instant::now())).boxed()
    }

    fn save(&self, key: String, _ttl: i64, response: CachedResponse, started: Instant) {
        self.insert(key, response, started);
    }
}

/// Process-local backend.
pub struct MemoryCache {
    store: Arc<MemoryStore>,
    policy: CachePolicy,
}

impl MemoryCache {
    pub fn new(capacity: usize, policy: CachePolicy) -> Self {
        Self {
            store: Arc::new(MemoryStore::new(capacity.max(1))),
            policy,
        }
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn cache(&self, ttl: i64, handler: Handler) -> Handler {
        wrap(self.store.clone(), self.policy, ttl, handler)
    }

    fn close(&self) {
        self.store.clear();
    }
}
