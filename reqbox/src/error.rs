//! Error types returned by the client.

use http::StatusCode;
use reqbox_backend::CacheError;
use thiserror::Error;

use crate::{config::ConfigError, context::ContextError, transport::TransportError};

pub use crate::transport::BoxError;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error of a logical request.
///
/// Retries happen inside the engine, so a caller sees exactly one of these
/// per terminal call. Variants that end the retry loop report how many
/// physical attempts were made.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be assembled. Nothing was sent.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The last physical attempt failed before a usable response arrived.
    #[error("request failed after {attempts} attempt(s): {source}")]
    Transport {
        /// Physical attempts made, including the failing one.
        attempts: u32,
        /// Failure of the last attempt.
        #[source]
        source: TransportError,
    },

    /// Every attempt answered with a status other than the expected one.
    #[error("unexpected status code received: {status} after {attempts} attempt(s)")]
    UnexpectedStatus {
        /// Status of the last attempt.
        status: StatusCode,
        /// Physical attempts made.
        attempts: u32,
    },

    /// The cache failed while looking the request up. Never a miss.
    #[error("cache read failed: {0}")]
    CacheRead(#[source] CacheError),

    /// The response was received but could not be stored.
    #[error("cache write failed: {0}")]
    CacheWrite(#[source] CacheError),

    /// The deadline elapsed or the request was cancelled.
    #[error("request aborted after {attempts} attempt(s): {source}")]
    Cancelled {
        /// Physical attempts started before the abort.
        attempts: u32,
        /// Why the request was aborted.
        #[source]
        source: ContextError,
    },

    /// The response body did not have the requested shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Status of the last response, when the failure is about a status.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Physical attempts made before the request gave up.
    ///
    /// Zero for failures that happen before dispatch.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transport { attempts, .. }
            | Self::UnexpectedStatus { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// Returns `true` if the deadline or a cancel handle ended the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Failure captured while building a request or a client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The body could not be encoded as JSON.
    #[error("failed to encode JSON body: {0}")]
    Json(#[source] serde_json::Error),

    /// The body could not be encoded as XML.
    #[error("failed to encode XML body: {0}")]
    Xml(#[source] BoxError),

    /// The body could not be encoded as a form.
    #[error("failed to encode form body: {0}")]
    Form(#[source] serde_urlencoded::ser::Error),

    /// A header name is not a valid token.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// A header value contains forbidden bytes.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Base URL and path do not form a valid URI.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUri {
        /// The concatenated URL.
        url: String,
        /// Parser error.
        #[source]
        source: http::uri::InvalidUri,
    },

    /// The proxy address was rejected.
    #[error("invalid proxy: {0}")]
    Proxy(#[source] reqwest::Error),

    /// The built-in transport could not be initialised.
    #[error("failed to build transport: {0}")]
    Transport(#[source] reqwest::Error),

    /// A proxy only applies to the built-in transport.
    #[error("a proxy cannot be combined with a custom transport")]
    ConflictingTransport,
}

/// The response body did not decode into the requested type.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed or mismatched JSON.
    #[error("failed to decode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or mismatched XML.
    #[error("failed to decode XML body: {0}")]
    Xml(#[source] BoxError),

    /// The body is not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
