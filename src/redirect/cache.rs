//! Single-flight cache of resolved redirect targets.
//!
//! Each key owns a `OnceCell`: the first caller runs the resolution while
//! concurrent callers for the same key wait on the same cell. Failed
//! resolutions leave the cell empty, so the next caller tries again.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::{Mutex, OnceCell};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub seed_url: String,
    pub client_identity: String,
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    resolved_at: Instant,
}

type Slot = Arc<OnceCell<CachedUrl>>;

pub struct ResolutionCache {
    slots: Mutex<LruCache<CacheKey, Slot>>,
    ttl: Duration,
}

impl ResolutionCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Return the cached URL for `key`, running `resolve` at most once
    /// across concurrent callers when it is missing or expired.
    pub async fn get_or_resolve<F, Fut, E>(&self, key: CacheKey, resolve: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let slot = self.slot_for(key).await;
        let cached = slot
            .get_or_try_init(|| async {
                resolve().await.map(|url| CachedUrl {
                    url,
                    resolved_at: Instant::now(),
                })
            })
            .await?;
        Ok(cached.url.clone())
    }

    async fn slot_for(&self, key: CacheKey) -> Slot {
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(&key) {
            let expired = slot
                .get()
                .is_some_and(|cached| cached.resolved_at.elapsed() >= self.ttl);
            if !expired {
                trace!(seed = %key.seed_url, "Redirect cache slot reused");
                return slot.clone();
            }
            trace!(seed = %key.seed_url, "Redirect cache entry expired");
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.put(key, slot.clone());
        slot
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
