//! Builder for configuring [`MokaCache`].

use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::future::CacheBuilder;
use moka::policy::EvictionPolicy;
use reqbox_backend::CacheKey;
use smol_str::SmolStr;

use crate::backend::{Entry, MokaCache};

/// Expiration policy that derives the TTL from the entry's expire timestamp.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<CacheKey, Entry> for Expiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Self::calculate_ttl(value)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Expiry follows the replacing entry.
        Self::calculate_ttl(value)
    }
}

impl Expiration {
    fn calculate_ttl(value: &Entry) -> Option<Duration> {
        value.expire.map(|expiration| {
            let millis = (expiration - Utc::now()).num_milliseconds();
            if millis <= 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(millis as u64)
            }
        })
    }
}

/// Builder for creating and configuring a [`MokaCache`].
///
/// ```
/// use std::time::Duration;
/// use reqbox_moka::{EvictionPolicy, MokaCache};
///
/// let cache = MokaCache::builder(10_000)
///     .label("responses")
///     .default_ttl(Duration::from_secs(300))
///     .eviction_policy(EvictionPolicy::lru())
///     .build();
/// ```
pub struct MokaCacheBuilder {
    max_capacity: u64,
    weigh_by_bytes: bool,
    default_ttl: Option<Duration>,
    label: SmolStr,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaCacheBuilder {
    /// Creates a builder for a cache holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            weigh_by_bytes: false,
            default_ttl: None,
            label: SmolStr::new_static("moka"),
            eviction_policy: None,
        }
    }

    /// Interprets the capacity as an approximate byte budget instead of an
    /// entry count.
    pub fn weigh_by_bytes(mut self) -> Self {
        self.weigh_by_bytes = true;
        self
    }

    /// TTL applied to entries stored without an explicit one.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Identifies this cache in logs.
    pub fn label(mut self, label: impl Into<SmolStr>) -> Self {
        self.label = label.into();
        self
    }

    /// Overrides Moka's eviction policy (TinyLFU by default).
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Creates the cache.
    pub fn build(self) -> MokaCache {
        let policy = self
            .eviction_policy
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let mut builder = CacheBuilder::new(self.max_capacity)
            .eviction_policy(policy)
            .expire_after(Expiration);
        if self.weigh_by_bytes {
            builder = builder.weigher(byte_weigher);
        }

        MokaCache {
            store: builder.build(),
            default_ttl: self.default_ttl,
            label: self.label,
        }
    }
}

fn byte_weigher(key: &CacheKey, value: &Entry) -> u32 {
    (key.memory_size() + value.memory_size()).min(u32::MAX as usize) as u32
}
