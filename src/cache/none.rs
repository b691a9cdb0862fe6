//! Backend that never caches.

use crate::cache::ResponseCache;
use crate::routing::Handler;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoneCache;

impl ResponseCache for NoneCache {
    fn backend(&self) -> &'static str {
        "none"
    }

    fn cache(&self, _ttl: i64, handler: Handler) -> Handler {
        handler
    }

    fn close(&self) {}
}
