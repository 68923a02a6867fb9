#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
pub mod config;
pub mod context;
mod default;
mod dispatch;
pub mod error;
mod request;
mod response;
pub mod retry;
mod snapshot;
pub mod transport;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use config::{ClientConfig, ConfigError};
pub use context::{CancelHandle, Context, ContextError};
pub use default::{default_client, delete, get_bytes, get_json, get_string, head};
pub use error::{BuildError, DecodeError, Error, Result};
pub use request::Request;
pub use response::{Decoded, Response, ResponseSource};
pub use retry::{Backoff, Sleeper, TokioSleeper};
pub use snapshot::CachedResponse;
pub use transport::{ProxyProtocol, Transport, TransportError};

// Re-export the cache capability so users need a single dependency.
pub use reqbox_backend::{Cache, CacheError, CacheKey, CacheResult};

#[cfg(feature = "moka")]
#[cfg_attr(docsrs, doc(cfg(feature = "moka")))]
pub use reqbox_moka::MokaCache;

#[cfg(feature = "feoxdb")]
#[cfg_attr(docsrs, doc(cfg(feature = "feoxdb")))]
pub use reqbox_feoxdb::FeOxDbCache;

// Re-export the http types that appear in the public API.
pub use http::{HeaderMap, Method, StatusCode};
