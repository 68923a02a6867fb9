use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Protocol spoken to an outbound proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    /// Plain HTTP proxy.
    Http,
    /// HTTP proxy reached over TLS.
    Https,
    /// SOCKS4 proxy. Needs the `socks` feature at runtime.
    Socks4,
    /// SOCKS5 proxy. Needs the `socks` feature at runtime.
    Socks5,
}

impl ProxyProtocol {
    /// URL scheme used for the proxy address.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for ProxyProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "socks4" => Ok(Self::Socks4),
            "socks5" => Ok(Self::Socks5),
            _ => Err(ConfigError::UnknownProxyProtocol(s.to_owned())),
        }
    }
}

/// Outbound proxy for the built-in transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    protocol: ProxyProtocol,
    address: String,
}

impl Proxy {
    /// Proxy at `address` (`host:port`), spoken to with `protocol`.
    pub fn new(protocol: ProxyProtocol, address: impl Into<String>) -> Self {
        Self {
            protocol,
            address: address.into(),
        }
    }

    /// Protocol spoken to the proxy.
    pub fn protocol(&self) -> ProxyProtocol {
        self.protocol
    }

    /// Address of the proxy as given.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Full proxy URL, e.g. `socks5://127.0.0.1:1080`.
    ///
    /// An address that already carries a scheme is used as is.
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("{}://{}", self.protocol, self.address)
        }
    }
}
