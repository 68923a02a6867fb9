use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{DecodeError, Error};

/// Where a [`Response`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseSource {
    /// Received from the transport during this call.
    Network,
    /// Rebuilt from a cache entry. No request was sent.
    Cache,
}

/// Outcome of the two-destination decoders.
///
/// See [`Response::json_with_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T, E> {
    /// The status matched, the body was decoded as the success shape.
    Expected(T),
    /// The status did not match, the body was decoded as the error shape.
    Unexpected(E),
}

impl<T, E> Decoded<T, E> {
    /// Returns `true` for [`Decoded::Expected`].
    pub fn matched(&self) -> bool {
        matches!(self, Self::Expected(_))
    }

    /// Converts into a `Result`, treating the error shape as `Err`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Expected(value) => Ok(value),
            Self::Unexpected(error) => Err(error),
        }
    }
}

/// Immutable snapshot of a final response.
///
/// The body has been read to the end before the response is handed out,
/// so every accessor can be called any number of times.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    expected: Option<StatusCode>,
    source: ResponseSource,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        expected: Option<StatusCode>,
        source: ResponseSource,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            expected,
            source,
        }
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers, all values kept.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The drained body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Takes the body out of the response.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Whether the response came from the network or the cache.
    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// Returns `true` if the status is the expected one.
    ///
    /// Without an expected status any 2xx matches.
    pub fn matched(&self) -> bool {
        match self.expected {
            Some(expected) => self.status == expected,
            None => self.status.is_success(),
        }
    }

    /// Body as a UTF-8 string.
    pub fn text(&self) -> Result<String, Error> {
        String::from_utf8(self.body.to_vec()).map_err(|e| DecodeError::from(e).into())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        decode_json(&self.body)
    }

    /// Decodes the body as XML.
    pub fn xml<T: DeserializeOwned>(&self) -> Result<T, Error> {
        decode_xml(&self.body)
    }

    /// Decodes the body as JSON into `T` when the status matched, into `E`
    /// otherwise.
    ///
    /// ```no_run
    /// # use serde::Deserialize;
    /// # #[derive(Deserialize)] struct User { id: u64 }
    /// # #[derive(Deserialize)] struct ApiError { message: String }
    /// # async fn run(client: reqbox::Client) -> Result<(), reqbox::Error> {
    /// let response = client.get("/users/1").send().await?;
    /// match response.json_with_error::<User, ApiError>()? {
    ///     reqbox::Decoded::Expected(user) => println!("user {}", user.id),
    ///     reqbox::Decoded::Unexpected(error) => println!("failed: {}", error.message),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn json_with_error<T, E>(&self) -> Result<Decoded<T, E>, Error>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        if self.matched() {
            decode_json(&self.body).map(Decoded::Expected)
        } else {
            decode_json(&self.body).map(Decoded::Unexpected)
        }
    }

    /// XML counterpart of [`json_with_error`](Self::json_with_error).
    pub fn xml_with_error<T, E>(&self) -> Result<Decoded<T, E>, Error>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        if self.matched() {
            decode_xml(&self.body).map(Decoded::Expected)
        } else {
            decode_xml(&self.body).map(Decoded::Unexpected)
        }
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| DecodeError::Json(e).into())
}

fn decode_xml<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    quick_xml::de::from_reader(body).map_err(|e| DecodeError::Xml(e.into()).into())
}
