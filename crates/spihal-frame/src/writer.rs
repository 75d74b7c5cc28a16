use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use spihal_transport::SpiStream;

use crate::codec::{encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::kind::MessageKind;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to any `Write` stream.
///
/// Header and payload leave in a single buffered write so a peer never sees
/// a header without its payload unless the connection fails mid-frame.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(
            frame.header.kind,
            frame.header.device,
            frame.header.sequence,
            frame.payload.as_ref(),
        )
    }

    /// Encode and send a header plus payload.
    pub fn send(
        &mut self,
        kind: MessageKind,
        device: u8,
        sequence: u32,
        payload: &[u8],
    ) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(kind, device, sequence, payload, &mut self.buf)?;
        debug_assert_eq!(self.buf.len(), HEADER_SIZE + payload.len());

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<SpiStream> {
    /// Create a frame writer for `SpiStream` and apply write timeout from config.
    pub fn with_config_stream(inner: SpiStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: spihal_transport::TransportError) -> FrameError {
    match err {
        spihal_transport::TransportError::Io(io) | spihal_transport::TransportError::Accept(io) => {
            FrameError::Io(io)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::reader::FrameReader;

    #[test]
    fn write_then_read_back() {
        let mut writer = FrameWriter::new(Vec::new());
        writer
            .send(MessageKind::Transfer, 3, 42, &[0xDE, 0xAD])
            .expect("send should succeed");

        let wire = writer.into_inner();
        assert_eq!(wire.len(), HEADER_SIZE + 2);

        let mut reader = FrameReader::new(Cursor::new(wire));
        let frame = reader.read_frame().expect("frame should decode");
        assert_eq!(frame.header.kind, MessageKind::Transfer);
        assert_eq!(frame.header.device, 3);
        assert_eq!(frame.header.sequence, 42);
        assert_eq!(frame.payload.as_ref(), &[0xDE, 0xAD]);
    }

    #[test]
    fn rejects_payload_over_configured_limit() {
        let config = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Vec::new(), config);
        let err = writer
            .send(MessageKind::Send, 0, 0, &[0u8; 5])
            .expect_err("payload exceeds limit");
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 5, max: 4 }));
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer
            .send(MessageKind::Deinit, 0, 0, &[])
            .expect_err("writer accepts nothing");
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_retries() {
        let mut writer = FrameWriter::new(InterruptOnce {
            interrupted: false,
            out: Vec::new(),
        });
        writer
            .send(MessageKind::GetStatus, 1, 5, &[])
            .expect("interrupt should be retried");
        assert_eq!(writer.get_ref().out.len(), HEADER_SIZE);
    }

    #[test]
    fn write_frame_uses_frame_header() {
        let frame = Frame::new(MessageKind::SetConfig, 5, 77, vec![1u8; 7]).expect("frame");
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(&frame).expect("write should succeed");
        let wire = writer.into_inner();
        assert_eq!(wire[0], MessageKind::SetConfig.as_u8());
        assert_eq!(wire[1], 5);
        assert_eq!(u16::from_le_bytes([wire[2], wire[3]]), 7);
        assert_eq!(u32::from_le_bytes([wire[4], wire[5], wire[6], wire[7]]), 77);
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        interrupted: bool,
        out: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
