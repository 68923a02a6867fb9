//! Persisted form of a response.
//!
//! A cache entry holds a JSON document with the status, the full header
//! map and the raw body bytes, never the wire framing. A hit rebuilds a
//! complete [`Response`] from it.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use reqbox_backend::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

use crate::response::{Response, ResponseSource};

/// Response snapshot as stored in a cache backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    #[serde(with = "http_serde::status_code")]
    status: StatusCode,
    #[serde(with = "http_serde::header_map")]
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    /// Captures `response` for storage.
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.bytes().clone(),
        }
    }

    /// Stored status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Stored headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Stored body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the snapshot into a cache value.
    pub fn encode(&self) -> CacheResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(CacheError::format)
    }

    /// Parses a cache value.
    pub fn decode(value: &[u8]) -> CacheResult<Self> {
        serde_json::from_slice(value).map_err(CacheError::format)
    }

    pub(crate) fn into_response(self, expected: Option<StatusCode>) -> Response {
        Response::new(
            self.status,
            self.headers,
            self.body,
            expected,
            ResponseSource::Cache,
        )
    }
}

#[cfg(test)]
mod tests {
    use http::header::{CONTENT_TYPE, SET_COOKIE};

    use super::*;

    #[test]
    fn test_multi_value_headers_survive_storage() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        headers.append(SET_COOKIE, "a=1".parse().unwrap());
        headers.append(SET_COOKIE, "b=2".parse().unwrap());

        let response = Response::new(
            StatusCode::OK,
            headers,
            Bytes::from_static(br#"{"id":1}"#),
            None,
            ResponseSource::Network,
        );
        let encoded = CachedResponse::from_response(&response).encode().unwrap();
        let restored = CachedResponse::decode(&encoded).unwrap().into_response(None);

        assert_eq!(restored.status(), StatusCode::OK);
        assert_eq!(restored.bytes(), response.bytes());
        let cookies: Vec<_> = restored.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(restored.source(), ResponseSource::Cache);
    }

    #[test]
    fn test_record_is_self_describing_json() {
        let snapshot = CachedResponse {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let encoded = snapshot.encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["status"], 404);
    }

    #[test]
    fn test_garbage_is_format_error() {
        let result = CachedResponse::decode(b"not json");
        assert!(matches!(result, Err(CacheError::Format(_))));
    }
}
