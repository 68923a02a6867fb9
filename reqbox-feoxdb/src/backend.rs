use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bincode::{
    config::standard as bincode_config,
    serde::{decode_from_slice, encode_to_vec},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use feoxdb::{FeoxError, FeoxStore};
use reqbox_backend::{Cache, CacheError, CacheKey, CacheResult};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::FeOxDbError;

#[derive(Serialize, Deserialize)]
struct Record {
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    expire: Option<DateTime<Utc>>,
}

/// Longest TTL handed to the store. FeOxDB keeps expiry as nanoseconds in a
/// `u64`, so longer TTLs are left to the record's own timestamp.
const MAX_STORE_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Store TTL in whole seconds, rounded up so entries never expire early.
fn store_ttl_secs(ttl: Duration) -> Option<u64> {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    (secs <= MAX_STORE_TTL_SECS).then_some(secs.max(1))
}

impl Record {
    fn is_expired(&self) -> bool {
        self.expire.is_some_and(|expire| expire <= Utc::now())
    }
}

/// Disk-based response cache using FeOxDB.
///
/// Use this when cached responses must survive restarts or don't fit in
/// memory. For pure speed without persistence, prefer `MokaCache`.
///
/// ```no_run
/// use reqbox_feoxdb::FeOxDbCache;
///
/// // Persistent cache with defaults
/// let cache = FeOxDbCache::builder()
///     .path("/var/cache/myapp")
///     .build()?;
///
/// // With resource limits
/// let cache = FeOxDbCache::builder()
///     .path("/var/cache/myapp")
///     .max_file_size(10 * 1024 * 1024 * 1024)  // 10 GB
///     .max_memory(256 * 1024 * 1024)           // 256 MB
///     .build()?;
/// # Ok::<(), reqbox_feoxdb::FeOxDbError>(())
/// ```
///
/// Cloning is cheap: clones share the same underlying database.
#[derive(Clone)]
pub struct FeOxDbCache {
    store: Arc<FeoxStore>,
    default_ttl: Option<Duration>,
    label: SmolStr,
}

impl std::fmt::Debug for FeOxDbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeOxDbCache")
            .field("label", &self.label)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl FeOxDbCache {
    /// Starts building a new cache.
    pub fn builder() -> FeOxDbCacheBuilder {
        FeOxDbCacheBuilder::default()
    }

    /// Memory-only store, for tests.
    ///
    /// Data is lost when dropped. Equivalent to `builder().build()`.
    pub fn in_memory() -> Result<Self, FeOxDbError> {
        Self::builder().build()
    }

    /// Forces pending writes to disk.
    ///
    /// FeOxDB buffers writes in memory and flushes them periodically.
    /// No-op in memory-only mode.
    pub fn flush(&self) {
        self.store.flush();
    }

    /// Returns the TTL applied when `set` is called without one.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}

/// Builder for [`FeOxDbCache`].
pub struct FeOxDbCacheBuilder {
    path: Option<PathBuf>,
    max_file_size: Option<u64>,
    max_memory: Option<usize>,
    default_ttl: Option<Duration>,
    label: SmolStr,
}

impl Default for FeOxDbCacheBuilder {
    fn default() -> Self {
        Self {
            path: None,
            max_file_size: None,
            max_memory: None,
            default_ttl: None,
            label: SmolStr::new_static("feoxdb"),
        }
    }
}

impl FeOxDbCacheBuilder {
    /// Enables persistent storage at the given path.
    ///
    /// Without this, data lives only in memory and is lost on restart.
    /// If path is a directory, creates `cache.db` inside it.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Pre-allocates disk space and caps maximum storage.
    ///
    /// Writes fail once the file is full. Ignored in memory-only mode.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Limits RAM usage.
    ///
    /// FeOxDB has no automatic eviction. Writes fail when the limit is
    /// reached, and the failure is reported to the caller.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
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

    /// Opens the store.
    ///
    /// Fails if the database file can't be opened or created.
    pub fn build(self) -> Result<FeOxDbCache, FeOxDbError> {
        let mut builder = FeoxStore::builder().enable_ttl(true);

        if let Some(mut path) = self.path {
            if path.is_dir() {
                path.push("cache.db");
            } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            builder = builder.device_path(path.to_string_lossy().to_string());
        }

        if let Some(file_size) = self.max_file_size {
            builder = builder.file_size(file_size);
        }

        if let Some(memory) = self.max_memory {
            builder = builder.max_memory(memory);
        }

        Ok(FeOxDbCache {
            store: Arc::new(builder.build()?),
            default_ttl: self.default_ttl,
            label: self.label,
        })
    }
}

#[async_trait]
impl Cache for FeOxDbCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || match store.get(&key_bytes) {
            Ok(encoded) => {
                let (record, _): (Record, _) =
                    decode_from_slice(&encoded, bincode_config()).map_err(CacheError::format)?;

                if record.is_expired() {
                    return Ok(None);
                }
                Ok(Some(Bytes::from(record.data)))
            }
            Err(FeoxError::KeyNotFound) => Ok(None),
            Err(e) => Err(CacheError::internal(e)),
        })
        .await
        .map_err(CacheError::unavailable)?
    }

    async fn set(&self, key: &CacheKey, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let ttl = ttl.or(self.default_ttl);
        let record = Record {
            data: value.to_vec(),
            expire: ttl.and_then(|ttl| {
                chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            }),
        };
        let value_bytes = encode_to_vec(&record, bincode_config()).map_err(CacheError::format)?;

        tokio::task::spawn_blocking(move || {
            // The record's own expire timestamp is authoritative on read.
            match ttl.and_then(store_ttl_secs) {
                Some(ttl_secs) => store.insert_with_ttl(&key_bytes, &value_bytes, ttl_secs),
                None => store.insert(&key_bytes, &value_bytes),
            }
            .map_err(CacheError::internal)?;
            Ok(())
        })
        .await
        .map_err(CacheError::unavailable)?
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(path: &str) -> CacheKey {
        CacheKey::for_request("GET", &format!("http://localhost{path}"))
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FeOxDbCache::builder()
            .path(temp_dir.path())
            .build()
            .unwrap();

        cache
            .set(&key("/a"), Bytes::from_static(b"test-value"), Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        let result = cache.get(&key("/a")).await.unwrap();
        assert_eq!(result.as_deref(), Some(&b"test-value"[..]));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let cache = FeOxDbCache::in_memory().unwrap();
        assert!(cache.get(&key("/nonexistent")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_not_returned() {
        let cache = FeOxDbCache::in_memory().unwrap();
        let record = Record {
            data: b"expired".to_vec(),
            expire: Some(Utc::now() - chrono::Duration::seconds(10)),
        };
        let encoded = encode_to_vec(&record, bincode_config()).unwrap();
        cache
            .store
            .insert(key("/expired").as_bytes(), &encoded)
            .unwrap();

        let result = cache.get(&key("/expired")).await.unwrap();
        assert!(result.is_none(), "Expired entry should not be returned");
    }

    #[tokio::test]
    async fn test_default_ttl_is_recorded() {
        let cache = FeOxDbCache::builder()
            .default_ttl(Duration::from_secs(3600))
            .build()
            .unwrap();

        cache.set(&key("/a"), Bytes::from_static(b"v"), None).await.unwrap();

        let encoded = cache.store.get(key("/a").as_bytes()).unwrap();
        let (record, _): (Record, _) = decode_from_slice(&encoded, bincode_config()).unwrap();
        let remaining = record.expire.unwrap() - Utc::now();
        assert!(remaining > chrono::Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_very_long_ttl_is_stored() {
        let thousand_years = Duration::from_secs(1000 * 365 * 24 * 3600);
        let cache = FeOxDbCache::builder()
            .default_ttl(thousand_years)
            .build()
            .unwrap();

        cache.set(&key("/forever"), Bytes::from_static(b"v"), None).await.unwrap();

        let result = cache.get(&key("/forever")).await.unwrap();
        assert_eq!(result.as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn test_store_ttl_rounds_up_and_caps() {
        assert_eq!(store_ttl_secs(Duration::from_millis(1900)), Some(2));
        assert_eq!(store_ttl_secs(Duration::from_secs(5)), Some(5));
        assert_eq!(store_ttl_secs(Duration::from_millis(10)), Some(1));
        assert_eq!(store_ttl_secs(Duration::ZERO), Some(1));
        assert_eq!(store_ttl_secs(Duration::from_secs(MAX_STORE_TTL_SECS + 1)), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_format_error() {
        let cache = FeOxDbCache::in_memory().unwrap();
        cache
            .store
            .insert(key("/corrupt").as_bytes(), &[0xff, 0xff, 0xff])
            .unwrap();

        let result = cache.get(&key("/corrupt")).await;
        assert!(matches!(result, Err(CacheError::Format(_))));
    }

    #[tokio::test]
    async fn test_memory_limit_exceeded() {
        let cache = FeOxDbCache::builder().max_memory(1024).build().unwrap();

        let large = Bytes::from(vec![0u8; 2048]);
        let result = cache
            .set(&key("/big"), large, Some(Duration::from_secs(3600)))
            .await;
        assert!(
            result.is_err(),
            "Write should fail when exceeding memory limit"
        );
    }

    #[tokio::test]
    async fn test_clone_shares_store() {
        let cache = FeOxDbCache::in_memory().unwrap();
        let clone = cache.clone();

        cache.set(&key("/shared"), Bytes::from_static(b"v"), None).await.unwrap();

        assert!(clone.get(&key("/shared")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_flush_persists_data() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        {
            let cache = FeOxDbCache::builder()
                .path(temp_dir.path())
                .build()
                .unwrap();
            cache
                .set(&key("/persist"), Bytes::from_static(b"persisted"), Some(Duration::from_secs(3600)))
                .await
                .unwrap();
            cache.flush();
        }

        let cache = FeOxDbCache::builder().path(&db_path).build().unwrap();
        let result = cache.get(&key("/persist")).await.unwrap();
        assert_eq!(result.as_deref(), Some(&b"persisted"[..]));
    }

    #[tokio::test]
    async fn test_builder_with_label() {
        let cache = FeOxDbCache::builder().label("responses").build().unwrap();
        assert_eq!(cache.name(), "responses");
    }
}
