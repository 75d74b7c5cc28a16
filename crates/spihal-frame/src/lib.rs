//! Fixed-header framing for the spihal wire protocol.
//!
//! Every message is one 8-byte header followed by its payload:
//! - 1-byte message kind
//! - 1-byte device id
//! - 2-byte little-endian payload length
//! - 4-byte little-endian sequence number
//!
//! Readers hand back whole frames; a payload cut short by EOF or by the
//! caller's deadline is reported as [`FrameError::Truncated`], never as a
//! silent short read.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_header, encode_frame, encode_header, Frame, FrameConfig, FrameHeader,
    HEADER_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use kind::MessageKind;
pub use reader::{FrameReader, ReadDeadline};
pub use writer::FrameWriter;
