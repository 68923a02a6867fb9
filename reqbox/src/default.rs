//! Process-wide default client and shortcuts on top of it.

use std::sync::OnceLock;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{Client, error::Error, response::Response};

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

/// The shared default client, created on first use.
///
/// It is a plain [`Client::new`]: no base URL, no cache and a 30 second
/// per-attempt timeout. It cannot be reconfigured; build your own client
/// for anything else.
pub fn default_client() -> &'static Client {
    DEFAULT_CLIENT.get_or_init(Client::new)
}

/// GETs `url` and returns the body.
pub async fn get_bytes(url: &str) -> Result<Bytes, Error> {
    default_client().get(url).fetch_bytes().await
}

/// GETs `url` and returns the body as a string.
pub async fn get_string(url: &str) -> Result<String, Error> {
    default_client().get(url).fetch_text().await
}

/// GETs `url` and decodes the JSON body.
pub async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, Error> {
    default_client().get(url).fetch_json().await
}

/// Sends a HEAD request to `url`.
pub async fn head(url: &str) -> Result<Response, Error> {
    default_client().head(url).send().await
}

/// Sends a DELETE request to `url`.
pub async fn delete(url: &str) -> Result<Response, Error> {
    default_client().delete(url).send().await
}
