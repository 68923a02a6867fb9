use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{CacheError, CacheKey};

/// Result of a cache backend operation.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value storage for serialized responses.
///
/// Values are opaque byte blobs. `get` returns `Ok(None)` when the key is
/// absent or its entry has expired; it must never hand back a stale value.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Looks up the bytes stored under `key`.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>>;

    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// With `ttl = None` the backend applies its configured default TTL, or
    /// keeps the entry until it is evicted when no default is configured.
    async fn set(&self, key: &CacheKey, value: Bytes, ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns the name of this backend for logging.
    fn name(&self) -> &str {
        "cache"
    }
}

#[async_trait]
impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &CacheKey, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        (**self).set(key, value, ttl).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl Cache for Box<dyn Cache> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &CacheKey, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        (**self).set(key, value, ttl).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
