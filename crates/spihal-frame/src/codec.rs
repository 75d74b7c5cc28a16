use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::MessageKind;

/// Frame header: kind (1) + device (1) + length (2) + sequence (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// The fixed header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message kind.
    pub kind: MessageKind,
    /// Device slot the message concerns.
    pub device: u8,
    /// Number of payload bytes following the header.
    pub length: u16,
    /// Sender-local request counter.
    pub sequence: u32,
}

/// A complete message: header plus payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame, deriving the header length from the payload.
    pub fn new(
        kind: MessageKind,
        device: u8,
        sequence: u32,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        let length = checked_length(payload.len())?;
        Ok(Self {
            header: FrameHeader {
                kind,
                device,
                length,
                sequence,
            },
            payload,
        })
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

fn checked_length(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD,
    })
}

/// Write the 8 header bytes.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬─────────────┬───────────────┬─────────────────┐
/// │ Kind   │ Device │ Length      │ Sequence      │ Payload          │
/// │ (1B)   │ (1B)   │ (2B LE)     │ (4B LE)       │ (Length bytes)   │
/// └────────┴────────┴─────────────┴───────────────┴─────────────────┘
/// ```
pub fn encode_header(header: &FrameHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u8(header.kind.as_u8());
    dst.put_u8(header.device);
    dst.put_u16_le(header.length);
    dst.put_u32_le(header.sequence);
}

/// Encode a header and its payload into the wire format.
pub fn encode_frame(
    kind: MessageKind,
    device: u8,
    sequence: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let header = FrameHeader {
        kind,
        device,
        length: checked_length(payload.len())?,
        sequence,
    };
    dst.reserve(HEADER_SIZE + payload.len());
    encode_header(&header, dst);
    dst.put_slice(payload);
    Ok(())
}

/// Parse a header from exactly [`HEADER_SIZE`] bytes.
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> Result<FrameHeader> {
    let mut src = &bytes[..];
    let kind = MessageKind::try_from(src.get_u8())?;
    let device = src.get_u8();
    let length = src.get_u16_le();
    let sequence = src.get_u32_le();
    Ok(FrameHeader {
        kind,
        device,
        length,
        sequence,
    })
}

/// Declared payload length of the header at the front of `src`.
///
/// Reads the length field without validating the kind byte.
pub(crate) fn peek_length(src: &BytesMut) -> Option<usize> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    Some(u16::from_le_bytes([src[2], src[3]]) as usize)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// A complete frame is always consumed, including one whose kind byte is
/// not a known tag: that frame is dropped and reported as
/// [`FrameError::UnknownKind`] so the next call starts at the next header.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(payload_len) = peek_length(src) else {
        return Ok(None);
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&src[..HEADER_SIZE]);
    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    let header = decode_header(&raw)?;
    Ok(Some(Frame { header, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 65535 (the wire limit).
    pub max_payload_size: usize,
    /// Read timeout for blocking operations without an explicit deadline.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
