//! Moka cache implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaStore;
use reqbox_backend::{Cache, CacheKey, CacheResult};
use smol_str::SmolStr;

/// Stored value with its absolute expiration time.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) data: Bytes,
    pub(crate) expire: Option<DateTime<Utc>>,
}

impl Entry {
    pub(crate) fn is_expired(&self) -> bool {
        self.expire.is_some_and(|expire| expire <= Utc::now())
    }

    pub(crate) fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len()
    }
}

/// In-memory response cache powered by Moka.
///
/// Entries expire individually: the TTL passed to [`Cache::set`] wins, then
/// the builder's default TTL, otherwise the entry lives until it is evicted
/// by capacity pressure.
///
/// ```
/// use reqbox_moka::MokaCache;
///
/// let cache = MokaCache::builder(10_000).build();
/// ```
///
/// Cloning is cheap: clones share the same underlying store.
///
/// # Caveats
///
/// - Data is **not persisted**: the cache is lost on process restart
/// - Moka evicts expired entries lazily; reads re-check the expiration time so
///   an expired entry is reported as missing even before it is evicted
#[derive(Clone)]
pub struct MokaCache {
    pub(crate) store: MokaStore<CacheKey, Entry>,
    pub(crate) default_ttl: Option<Duration>,
    pub(crate) label: SmolStr,
}

impl std::fmt::Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("label", &self.label)
            .field("default_ttl", &self.default_ttl)
            .field("entries", &self.store.entry_count())
            .finish()
    }
}

impl MokaCache {
    /// Creates a new builder for a cache holding at most `max_capacity` entries.
    pub fn builder(max_capacity: u64) -> crate::builder::MokaCacheBuilder {
        crate::builder::MokaCacheBuilder::new(max_capacity)
    }

    /// Returns the number of live entries (approximate, see Moka docs).
    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }

    /// Processes Moka's pending maintenance work (evictions, expirations).
    pub async fn run_pending_tasks(&self) {
        self.store.run_pending_tasks().await;
    }

    /// Returns the TTL applied when `set` is called without one.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn expire_at(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.or(self.default_ttl).map(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        match self.store.get(key).await {
            Some(entry) if entry.is_expired() => {
                tracing::trace!(%key, "moka entry expired");
                self.store.invalidate(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            data: value,
            expire: self.expire_at(ttl),
        };
        self.store.insert(key.clone(), entry).await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> CacheKey {
        CacheKey::for_request("GET", &format!("http://localhost{path}"))
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let cache = MokaCache::builder(100).build();

        cache
            .set(&key("/a"), Bytes::from_static(b"value"), None)
            .await
            .unwrap();

        let value = cache.get(&key("/a")).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"value")));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let cache = MokaCache::builder(100).build();
        assert!(cache.get(&key("/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_existing_entry() {
        let cache = MokaCache::builder(100).build();

        cache.set(&key("/a"), Bytes::from_static(b"old"), None).await.unwrap();
        cache.set(&key("/a"), Bytes::from_static(b"new"), None).await.unwrap();

        assert_eq!(
            cache.get(&key("/a")).await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
    }

    #[tokio::test]
    async fn test_expired_entry_not_returned() {
        let cache = MokaCache::builder(100).build();
        let entry = Entry {
            data: Bytes::from_static(b"stale"),
            expire: Some(Utc::now() - chrono::Duration::seconds(10)),
        };
        cache.store.insert(key("/expired"), entry).await;

        assert!(cache.get(&key("/expired")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_when_none_given() {
        let cache = MokaCache::builder(100)
            .default_ttl(Duration::from_secs(3600))
            .build();

        cache.set(&key("/a"), Bytes::from_static(b"v"), None).await.unwrap();

        let entry = cache.store.get(&key("/a")).await.unwrap();
        let expire = entry.expire.expect("default ttl should set an expiration");
        let remaining = expire - Utc::now();
        assert!(remaining > chrono::Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_explicit_ttl_overrides_default() {
        let cache = MokaCache::builder(100)
            .default_ttl(Duration::from_secs(3600))
            .build();

        cache
            .set(&key("/a"), Bytes::from_static(b"v"), Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let entry = cache.store.get(&key("/a")).await.unwrap();
        let remaining = entry.expire.unwrap() - Utc::now();
        assert!(remaining <= chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_clone_shares_store() {
        let cache = MokaCache::builder(100).build();
        let clone = cache.clone();

        cache.set(&key("/shared"), Bytes::from_static(b"v"), None).await.unwrap();

        assert!(clone.get(&key("/shared")).await.unwrap().is_some());
    }
}
