//! TCP transport for the spihal network backend.
//!
//! Resolves the configured peer endpoint, connects to the first address that
//! accepts, and exposes the connection as a blocking [`SpiStream`]. The
//! listening side ([`TcpTransport::bind`]) exists for peers and tests.
//!
//! This is the lowest layer of spihal's network path. Framing builds on top
//! of the [`SpiStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

pub use endpoint::{Endpoint, DEFAULT_HOST, DEFAULT_PORT, HOST_ENV, PORT_ENV};
pub use error::{Result, TransportError};
pub use stream::SpiStream;
pub use tcp::TcpTransport;
