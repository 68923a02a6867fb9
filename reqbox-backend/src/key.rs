//! Cache key type.
//!
//! A key identifies one logical GET request: `{method}:{url}`, where the url
//! is the client's base URL followed by the request path, verbatim.
//!
//! ```
//! use reqbox_backend::CacheKey;
//!
//! let key = CacheKey::for_request("GET", "https://api.example.com/users");
//! assert_eq!(key.as_str(), "GET:https://api.example.com/users");
//! ```

use std::fmt;

use smol_str::{SmolStr, format_smolstr};

/// Key under which a response snapshot is stored.
///
/// Cloning is cheap: short keys are stored inline, long ones are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from an already rendered string.
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Renders the key for a request as `{method}:{url}`.
    pub fn for_request(method: &str, url: &str) -> Self {
        Self(format_smolstr!("{method}:{url}"))
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key as raw bytes, as stored by byte-oriented backends.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Approximate heap and inline footprint of the key in bytes.
    pub fn memory_size(&self) -> usize {
        let heap = if self.0.is_heap_allocated() {
            self.0.len()
        } else {
            0
        };
        std::mem::size_of::<Self>() + heap
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
