#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod backend;
mod key;

pub use backend::{Cache, CacheResult};
pub use key::CacheKey;
use thiserror::Error;

/// Boxed error used as the source of every [`CacheError`] variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Describes the groups of errors a cache backend can report.
///
/// A missing entry is never an error: backends return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Internal backend error, state or storage failure.
    #[error("cache backend error: {0}")]
    Internal(#[source] BoxError),
    /// Serializing or deserializing a stored record failed.
    #[error("cache record format error: {0}")]
    Format(#[source] BoxError),
    /// The backend could not run the operation at all.
    #[error("cache backend unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl CacheError {
    /// Wraps any error as [`CacheError::Internal`].
    pub fn internal(error: impl Into<BoxError>) -> Self {
        Self::Internal(error.into())
    }

    /// Wraps any error as [`CacheError::Format`].
    pub fn format(error: impl Into<BoxError>) -> Self {
        Self::Format(error.into())
    }

    /// Wraps any error as [`CacheError::Unavailable`].
    pub fn unavailable(error: impl Into<BoxError>) -> Self {
        Self::Unavailable(error.into())
    }
}
