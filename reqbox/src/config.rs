//! Client configuration loaded from YAML.
//!
//! ```yaml
//! base_url: https://api.example.com
//! timeout: 30s
//! headers:
//!   - name: Accept
//!     value: application/json
//! proxy:
//!   protocol: socks5
//!   address: 127.0.0.1:1080
//! backoff:
//!   base: 100ms
//!   factor: 2.0
//!   max: 5s
//! cache:
//!   type: Moka
//!   max_capacity: 10000
//!   ttl: 60s
//! ```
//!
//! Cache backends are only available with their cargo feature (`moka`,
//! `feoxdb`). Selecting a disabled one is a [`ConfigError`].

use std::{path::Path, sync::Arc, time::Duration};

use reqbox_backend::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    client::ClientBuilder,
    error::BoxError,
    retry::Backoff,
    transport::ProxyProtocol,
};

/// Invalid or unusable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the model.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The proxy protocol is not one of http, https, socks4, socks5.
    #[error("unknown proxy protocol: {0}")]
    UnknownProxyProtocol(String),
    /// The selected cache backend was compiled out.
    #[error("cache backend {0} is not available, enable its cargo feature")]
    BackendNotAvailable(String),
    /// The cache backend could not be opened.
    #[error("failed to open cache backend: {0}")]
    Backend(#[source] BoxError),
}

/// Serializable client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix of every request URL.
    #[serde(default)]
    pub base_url: String,
    /// Per-attempt timeout.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Default headers, applied in order.
    #[serde(default)]
    pub headers: Vec<HeaderConfig>,
    /// Outbound proxy for the built-in transport.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Delay policy between retries.
    #[serde(default)]
    pub backoff: Backoff,
    /// Response cache for GET requests.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

/// One default header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Proxy by protocol name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// `http`, `https`, `socks4` or `socks5`, in any case.
    pub protocol: String,
    /// `host:port` of the proxy.
    pub address: String,
}

/// Settings of the in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moka {
    /// Maximum number of entries.
    pub max_capacity: u64,
    /// TTL of stored responses. Kept until evicted when absent.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// Settings of the embedded on-disk cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeOxDb {
    /// Database file or directory.
    #[serde(default)]
    pub path: Option<String>,
    /// Maximum size of the database file in bytes.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Maximum memory used by the store in bytes.
    #[serde(default)]
    pub max_memory: Option<usize>,
    /// TTL of stored responses.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// Cache backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheConfig {
    /// In-memory cache.
    Moka(Moka),
    /// Embedded on-disk cache. Memory only without a `path`.
    FeOxDb(FeOxDb),
}

impl CacheConfig {
    /// Opens the configured backend.
    pub fn into_cache(self) -> Result<Arc<dyn Cache>, ConfigError> {
        match self {
            #[cfg(feature = "moka")]
            CacheConfig::Moka(config) => {
                use reqbox_moka::MokaCache;

                let mut builder = MokaCache::builder(config.max_capacity);
                if let Some(ttl) = config.ttl {
                    builder = builder.default_ttl(ttl);
                }
                Ok(Arc::new(builder.build()))
            }
            #[cfg(not(feature = "moka"))]
            CacheConfig::Moka(_) => Err(ConfigError::BackendNotAvailable("Moka".to_string())),
            #[cfg(feature = "feoxdb")]
            CacheConfig::FeOxDb(config) => {
                use reqbox_feoxdb::FeOxDbCache;

                let mut builder = FeOxDbCache::builder();
                if let Some(path) = config.path {
                    builder = builder.path(path);
                }
                if let Some(size) = config.max_file_size {
                    builder = builder.max_file_size(size);
                }
                if let Some(memory) = config.max_memory {
                    builder = builder.max_memory(memory);
                }
                if let Some(ttl) = config.ttl {
                    builder = builder.default_ttl(ttl);
                }
                let cache = builder
                    .build()
                    .map_err(|e| ConfigError::Backend(e.into()))?;
                Ok(Arc::new(cache))
            }
            #[cfg(not(feature = "feoxdb"))]
            CacheConfig::FeOxDb(_) => Err(ConfigError::BackendNotAvailable("FeOxDb".to_string())),
        }
    }
}

impl ClientConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Turns the configuration into a client builder.
    ///
    /// Opens the cache backend. Header validation is left to
    /// [`ClientBuilder::build`].
    pub fn into_builder(self) -> Result<ClientBuilder, ConfigError> {
        let mut builder = ClientBuilder::default()
            .base_url(self.base_url)
            .headers(
                self.headers
                    .into_iter()
                    .map(|header| (header.name, header.value)),
            )
            .backoff(self.backoff);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy) = self.proxy {
            let protocol: ProxyProtocol = proxy.protocol.parse()?;
            builder = builder.proxy(protocol, proxy.address);
        }

        if let Some(cache) = self.cache {
            builder = builder.cache(cache.into_cache()?);
        }

        Ok(builder)
    }
}
