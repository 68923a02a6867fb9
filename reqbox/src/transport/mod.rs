//! The "perform one HTTP exchange" capability.
//!
//! The execution engine never talks to the network directly. It hands a
//! fully assembled [`http::Request`] to a [`Transport`] and gets back the
//! status, headers and a body stream that it drains itself.
//!
//! [`ReqwestTransport`] is the built-in implementation. Tests and embedders
//! can plug in their own by implementing the trait.

mod builtin;
mod proxy;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::UnsyncBoxBody};
use thiserror::Error;

pub use self::builtin::{ReqwestTransport, ReqwestTransportBuilder};
pub use self::proxy::{Proxy, ProxyProtocol};

/// Boxed error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body stream of a physical response.
pub type TransportBody = UnsyncBoxBody<Bytes, BoxError>;

/// A single physical exchange could not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or protocol failure before a response arrived.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
    /// The per-attempt timeout elapsed.
    #[error("request timed out")]
    Timeout,
    /// The response arrived but its body could not be read to the end.
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

impl TransportError {
    /// Wraps any error as [`TransportError::Request`].
    pub fn request(error: impl Into<BoxError>) -> Self {
        Self::Request(error.into())
    }
}

/// Performs one HTTP exchange.
///
/// Implementations must not retry on their own: every call is one attempt
/// as far as the retry loop is concerned.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response head with an unread body.
    async fn exchange(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<TransportBody>, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn exchange(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<TransportBody>, TransportError> {
        (**self).exchange(request).await
    }
}

/// Wraps an in-memory payload as a [`TransportBody`].
pub fn full_body(bytes: impl Into<Bytes>) -> TransportBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}
