use std::time::Duration;

use bytes::Bytes;
use http::{
    HeaderName, HeaderValue, Method, StatusCode, Uri,
    header::{CONTENT_TYPE, HeaderMap},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Client,
    context::Context,
    dispatch,
    error::{BuildError, Error},
    response::Response,
};

/// One-shot description of a logical request.
///
/// Derived from a [`Client`] with [`Client::get`] and friends, configured
/// with chained calls, then consumed by a terminal call such as
/// [`send`](Self::send) or [`fetch_json`](Self::fetch_json). Nothing
/// touches the network before the terminal call.
///
/// The first builder step that fails is remembered. Every later step is a
/// no-op and the terminal call returns that error without sending anything.
///
/// ```no_run
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Serialize)] struct NewUser { name: String }
/// # #[derive(Deserialize)] struct User { id: u64 }
/// # async fn run(client: reqbox::Client) -> Result<(), reqbox::Error> {
/// let user: User = client
///     .post("/users")
///     .json(&NewUser { name: "ferris".into() })
///     .expect_status(http::StatusCode::CREATED)
///     .retry(2)
///     .fetch_json()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Request {
    client: Client,
    state: Result<Draft, Error>,
}

#[derive(Debug)]
pub(crate) struct Draft {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) uri: Uri,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) body: Bytes,
    pub(crate) expected_status: Option<StatusCode>,
    pub(crate) retry_count: u32,
    pub(crate) context: Context,
}

impl Draft {
    /// Assembles the physical request for one attempt.
    ///
    /// Headers are applied in order, so a later entry replaces an earlier
    /// one with the same name.
    pub(crate) fn physical(&self) -> http::Request<Bytes> {
        let mut request = http::Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();

        let headers: &mut HeaderMap = request.headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        request
    }
}

impl Request {
    pub(crate) fn new(client: Client, method: Method, path: &str) -> Self {
        let url = format!("{}{}", client.base_url(), path);
        let state = url
            .parse::<Uri>()
            .map_err(|source| {
                Error::from(BuildError::InvalidUri {
                    url: url.clone(),
                    source,
                })
            })
            .map(|uri| Draft {
                method,
                uri,
                url,
                headers: client.default_headers().to_vec(),
                body: Bytes::new(),
                expected_status: None,
                retry_count: 0,
                context: Context::background(),
            });
        Self { client, state }
    }

    fn map(self, f: impl FnOnce(Draft) -> Result<Draft, Error>) -> Self {
        Self {
            client: self.client,
            state: self.state.and_then(f),
        }
    }

    /// Returns the error captured so far, if any.
    pub fn error(&self) -> Option<&Error> {
        self.state.as_ref().err()
    }

    /// Method of the request.
    pub fn method(&self) -> Option<&Method> {
        self.state.as_ref().ok().map(|draft| &draft.method)
    }

    /// Full URL, base URL followed by the path.
    pub fn url(&self) -> Option<&str> {
        self.state.as_ref().ok().map(|draft| draft.url.as_str())
    }

    /// Appends a header. It is applied after the client's default headers
    /// and replaces any earlier value with the same name.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|mut draft| {
            let name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(BuildError::from)?;
            let value = HeaderValue::from_str(value.as_ref()).map_err(BuildError::from)?;
            draft.headers.push((name, value));
            Ok(draft)
        })
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, value: impl AsRef<str>) -> Self {
        self.header(CONTENT_TYPE, value)
    }

    /// Sends raw bytes as `application/octet-stream`.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.with_body(body, "application/octet-stream")
    }

    /// Sends a string as `text/plain; charset=utf-8`.
    pub fn text(self, body: impl Into<String>) -> Self {
        let body = Bytes::from(body.into());
        self.with_body(body, "text/plain; charset=utf-8")
    }

    /// Encodes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => self.with_body(Bytes::from(body), "application/json"),
            Err(error) => self.fail(BuildError::Json(error)),
        }
    }

    /// Encodes `value` as the XML body.
    pub fn xml<T: Serialize>(self, value: &T) -> Self {
        match quick_xml::se::to_string(value) {
            Ok(body) => self.with_body(Bytes::from(body), "application/xml"),
            Err(error) => self.fail(BuildError::Xml(error.into())),
        }
    }

    /// Encodes `value` as an `application/x-www-form-urlencoded` body.
    pub fn form<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(body) => self.with_body(Bytes::from(body), "application/x-www-form-urlencoded"),
            Err(error) => self.fail(BuildError::Form(error)),
        }
    }

    /// Attaches a deadline and cancellation context.
    ///
    /// Replaces any context set before, including one set by
    /// [`timeout`](Self::timeout).
    pub fn context(self, context: Context) -> Self {
        self.map(|mut draft| {
            draft.context = context;
            Ok(draft)
        })
    }

    /// Gives the whole logical request, retries included, `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|mut draft| {
            draft.context = draft.context.with_timeout(timeout);
            Ok(draft)
        })
    }

    /// Accepts only `status`. Any other status fails the attempt and is
    /// retried like a transport error.
    pub fn expect_status(self, status: StatusCode) -> Self {
        self.map(|mut draft| {
            draft.expected_status = Some(status);
            Ok(draft)
        })
    }

    /// Number of additional attempts after the first one.
    pub fn retry(self, count: u32) -> Self {
        self.map(|mut draft| {
            draft.retry_count = count;
            Ok(draft)
        })
    }

    /// Executes the request.
    pub async fn send(self) -> Result<Response, Error> {
        dispatch::execute(self.client, self.state).await
    }

    /// Executes the request and returns the body.
    pub async fn fetch_bytes(self) -> Result<Bytes, Error> {
        Ok(self.send().await?.into_bytes())
    }

    /// Executes the request and returns the body as a UTF-8 string.
    pub async fn fetch_text(self) -> Result<String, Error> {
        self.send().await?.text()
    }

    /// Executes the request and decodes the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(self) -> Result<T, Error> {
        self.send().await?.json()
    }

    /// Executes the request and decodes the body as XML.
    pub async fn fetch_xml<T: DeserializeOwned>(self) -> Result<T, Error> {
        self.send().await?.xml()
    }

    fn with_body(self, body: Bytes, content_type: &'static str) -> Self {
        self.map(|mut draft| {
            draft.body = body;
            draft
                .headers
                .push((CONTENT_TYPE, HeaderValue::from_static(content_type)));
            Ok(draft)
        })
    }

    fn fail(self, error: impl Into<Error>) -> Self {
        self.map(|_| Err(error.into()))
    }
}
