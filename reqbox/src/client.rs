use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use reqbox_backend::Cache;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{BuildError, Error},
    request::Request,
    retry::{Backoff, Sleeper, TokioSleeper},
    transport::{Proxy, ProxyProtocol, ReqwestTransport, Transport},
};

/// Per-attempt timeout of [`Client::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-lived configuration root.
///
/// Holds the transport, base URL, default headers and an optional cache.
/// Immutable once built and cheap to clone, so one client can serve any
/// number of concurrent requests.
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
/// use reqbox::{Client, MokaCache};
///
/// # fn run() -> Result<(), reqbox::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .header("Accept", "application/json")
///     .timeout(Duration::from_secs(10))
///     .cache(Arc::new(MokaCache::builder(10_000).build()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) base_url: String,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) cache: Option<Arc<dyn Cache>>,
    pub(crate) backoff: Backoff,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) timeout: Option<Duration>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("headers", &self.inner.headers)
            .field("cache", &self.inner.cache.as_ref().map(|cache| cache.name()))
            .field("backoff", &self.inner.backoff)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Client on the built-in reqwest transport, without base URL, default
    /// headers or cache, and a 30 second per-attempt timeout.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport: Arc::new(ReqwestTransport::new()),
                base_url: String::new(),
                headers: Vec::new(),
                cache: None,
                backoff: Backoff::default(),
                sleeper: Arc::new(TokioSleeper),
                timeout: Some(DEFAULT_TIMEOUT),
            }),
        }
    }

    /// Starts building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Derives a GET request for `path`.
    pub fn get(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::GET, path)
    }

    /// Derives a POST request for `path`.
    pub fn post(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::POST, path)
    }

    /// Derives a PUT request for `path`.
    pub fn put(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::PUT, path)
    }

    /// Derives a PATCH request for `path`.
    pub fn patch(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::PATCH, path)
    }

    /// Derives a DELETE request for `path`.
    pub fn delete(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::DELETE, path)
    }

    /// Derives a HEAD request for `path`.
    pub fn head(&self, path: impl AsRef<str>) -> Request {
        self.request(Method::HEAD, path)
    }

    /// Derives a request with an arbitrary method.
    ///
    /// The URL is the base URL followed by `path`, verbatim. The request
    /// starts with a copy of the default headers.
    pub fn request(&self, method: Method, path: impl AsRef<str>) -> Request {
        Request::new(self.clone(), method, path.as_ref())
    }

    /// POSTs `body` as JSON and decodes the JSON reply.
    pub async fn post_json<T, R>(&self, path: impl AsRef<str>, body: &T) -> Result<R, Error>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post(path).json(body).fetch_json().await
    }

    /// POSTs raw bytes with extra headers and returns the reply body.
    pub async fn post_bytes<'a>(
        &self,
        path: impl AsRef<str>,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
        body: impl Into<Bytes>,
    ) -> Result<Bytes, Error> {
        headers
            .into_iter()
            .fold(self.post(path).body(body), |request, (name, value)| {
                request.header(name, value)
            })
            .fetch_bytes()
            .await
    }

    /// Prefix of every request URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Headers copied into every derived request, in order.
    pub fn default_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.inner.headers
    }

    /// The response cache, if configured.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.inner.cache.as_ref()
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    proxy: Option<Proxy>,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn Cache>>,
    backoff: Backoff,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Prefix for every request path. Not normalised: a trailing slash here
    /// and a leading one in the path yield `//`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Appends a default header. Duplicates are kept in order.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends several default headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Bounds every physical attempt, body read included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Routes the built-in transport through a proxy at `address`.
    pub fn proxy(mut self, protocol: ProxyProtocol, address: impl Into<String>) -> Self {
        self.proxy = Some(Proxy::new(protocol, address));
        self
    }

    /// Replaces the built-in reqwest transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Enables the cache-aside lookup for GET requests.
    ///
    /// The cache is shared, not owned: keep a clone to inspect or reuse it.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Delay policy between retry attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the tokio timer used for backoff waits.
    pub fn sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<Client, Error> {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                Ok((
                    HeaderName::from_bytes(name.as_bytes()).map_err(BuildError::from)?,
                    HeaderValue::from_str(value).map_err(BuildError::from)?,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let transport: Arc<dyn Transport> = match (self.transport, self.proxy) {
            (Some(_), Some(_)) => return Err(BuildError::ConflictingTransport.into()),
            (Some(transport), None) => transport,
            (None, Some(proxy)) => Arc::new(ReqwestTransport::builder().proxy(proxy).build()?),
            (None, None) => Arc::new(ReqwestTransport::new()),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url: self.base_url,
                headers,
                cache: self.cache,
                backoff: self.backoff,
                sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
                timeout: self.timeout,
            }),
        })
    }
}
