use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::SpiStream;

/// TCP transport.
///
/// Provides connect for backends and bind/accept for peers speaking the
/// frame protocol.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a TCP address. Port 0 picks an ephemeral port.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: label.clone(),
            source,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: label,
                source,
            })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SpiStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(SpiStream::from_tcp(stream))
    }

    /// Connect to the endpoint, trying each resolved address in order until
    /// one succeeds.
    ///
    /// With `timeout` set, each attempt is bounded individually.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<SpiStream> {
        let addrs = endpoint.resolve()?;
        let mut last_err = None;

        for addr in addrs {
            let attempt = match timeout {
                Some(limit) if !limit.is_zero() => TcpStream::connect_timeout(&addr, limit),
                _ => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(%endpoint, %addr, error = %err, "failed to disable Nagle");
                    }
                    debug!(%endpoint, %addr, "connected");
                    return Ok(SpiStream::from_tcp(stream));
                }
                Err(err) => {
                    debug!(%endpoint, %addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            endpoint: endpoint.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address to connect")
            }),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint a client should use to reach this listener.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.local_addr.ip().to_string(), self.local_addr.port())
    }
}
