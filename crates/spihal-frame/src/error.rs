/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a message kind outside the protocol's tag set.
    #[error("unknown message kind 0x{0:02X}")]
    UnknownKind(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a frame header was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// The header arrived but fewer payload bytes followed than it declared.
    #[error("truncated frame (expected {expected} payload bytes, received {received})")]
    Truncated { expected: usize, received: usize },

    /// No complete header arrived before the deadline.
    #[error("timed out waiting for frame header")]
    TimedOut,
}

pub type Result<T> = std::result::Result<T, FrameError>;
