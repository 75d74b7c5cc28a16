use std::io::ErrorKind;

use spihal_core::HalError;
use spihal_frame::FrameError;
use spihal_transport::TransportError;

/// Failures inside the network backend, before they are reduced to a
/// [`HalError`].
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The slot has no live connection to its peer.
    #[error("not connected to peer")]
    Disconnected,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A transfer reply carried a different number of bytes than were sent.
    #[error("response length {received} does not match request length {expected}")]
    LengthMismatch { expected: usize, received: usize },

    /// A receive reply carried more bytes than the caller asked for.
    #[error("response of {received} bytes overflows {capacity}-byte buffer")]
    Overflow { capacity: usize, received: usize },
}

impl NetError {
    /// Whether the peer is gone and the connection should be dropped.
    pub fn is_disconnect(&self) -> bool {
        match self {
            NetError::Disconnected | NetError::Frame(FrameError::ConnectionClosed) => true,
            NetError::Frame(FrameError::Io(err)) => matches!(
                err.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

impl From<NetError> for HalError {
    fn from(err: NetError) -> Self {
        match err {
            NetError::Disconnected => HalError::NotInitialized,
            NetError::Frame(FrameError::TimedOut) => HalError::TimedOut,
            NetError::Frame(FrameError::Io(io))
                if matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
            {
                HalError::TimedOut
            }
            other => HalError::Failed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetError>;
