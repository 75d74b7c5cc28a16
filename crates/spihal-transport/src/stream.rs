use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected peer stream. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations. Reads
/// and writes block; bound them with [`SpiStream::set_read_timeout`] and
/// [`SpiStream::set_write_timeout`].
pub struct SpiStream {
    inner: TcpStream,
}

impl Read for SpiStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SpiStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl SpiStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// `Some(Duration::ZERO)` is rejected by the platform; pass `None` to
    /// block without a bound.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Close both directions of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for SpiStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiStream")
            .field("type", &"tcp")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
