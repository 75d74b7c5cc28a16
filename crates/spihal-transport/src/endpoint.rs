use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Result, TransportError};

/// Setting that overrides the peer host.
pub const HOST_ENV: &str = "HAL_SPI_SOCKET_HOST";
/// Setting that overrides the peer port.
pub const PORT_ENV: &str = "HAL_SPI_SOCKET_PORT";

/// Peer host used when no setting is present.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Peer port used when no setting is present.
pub const DEFAULT_PORT: u16 = 9000;

/// A host/port pair naming the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Read the endpoint from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the endpoint from a settings lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| TransportError::InvalidPort { value })?,
            None => DEFAULT_PORT,
        };
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to socket addresses, preserving resolver order.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: self.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::NoAddress {
                endpoint: self.to_string(),
            });
        }
        Ok(addrs)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
