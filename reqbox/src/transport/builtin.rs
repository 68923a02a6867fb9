use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::trace;

use super::{BoxError, Proxy, Transport, TransportBody, TransportError};
use crate::error::BuildError;

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// Connection pooling, TLS and proxying are all reqwest's business. Cloning
/// shares the underlying pool.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with reqwest's default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already configured reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Starts building a transport with a proxy or a connect timeout.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    proxy: Option<Proxy>,
    connect_timeout: Option<Duration>,
}

impl ReqwestTransportBuilder {
    /// Routes every request through `proxy`.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Limits the time spent establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the reqwest client.
    pub fn build(self) -> Result<ReqwestTransport, BuildError> {
        let mut builder = reqwest::Client::builder();

        if let Some(proxy) = self.proxy {
            let proxy = reqwest::Proxy::all(proxy.url()).map_err(BuildError::Proxy)?;
            builder = builder.proxy(proxy);
        }

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().map_err(BuildError::Transport)?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn exchange(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<TransportBody>, TransportError> {
        let request: reqwest::Request = request
            .map(reqwest::Body::from)
            .try_into()
            .map_err(TransportError::request)?;

        trace!(method = %request.method(), url = %request.url(), "sending request");

        let response = self.client.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::request(error)
            }
        })?;

        let response: http::Response<reqwest::Body> = response.into();
        Ok(response.map(|body| body.map_err(BoxError::from).boxed_unsync()))
    }
}
