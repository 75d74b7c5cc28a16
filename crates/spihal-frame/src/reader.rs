use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use spihal_transport::SpiStream;
use tracing::debug;

use crate::codec::{decode_frame, peek_length, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Streams whose blocking reads can be bounded by a timeout.
pub trait ReadDeadline: Read {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl ReadDeadline for SpiStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        SpiStream::set_read_timeout(self, timeout).map_err(|err| match err {
            spihal_transport::TransportError::Io(io) => io,
            other => std::io::Error::other(other.to_string()),
        })
    }
}

impl ReadDeadline for std::net::TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::net::TcpStream::set_read_timeout(self, timeout)
    }
}

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// EOF before any header byte is [`FrameError::ConnectionClosed`]; EOF
    /// after the header is [`FrameError::Truncated`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            match self.fill()? {
                0 => return Err(self.closed()),
                _ => continue,
            }
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Classify an EOF or an expired wait by how much of the frame arrived.
    fn incomplete(&mut self, when_headerless: FrameError) -> FrameError {
        match peek_length(&self.buf) {
            Some(expected) => {
                let received = self.buf.len() - HEADER_SIZE;
                debug!(expected, received, "discarding partial frame");
                self.buf.clear();
                FrameError::Truncated { expected, received }
            }
            None => when_headerless,
        }
    }

    fn closed(&mut self) -> FrameError {
        self.incomplete(FrameError::ConnectionClosed)
    }
}

impl<T: ReadDeadline> FrameReader<T> {
    /// Read the next complete frame, giving up once `timeout` has elapsed.
    ///
    /// `None` waits without bound. A header that has not fully arrived by the
    /// deadline yields [`FrameError::TimedOut`] and any partial header bytes
    /// stay buffered for the next call. A header whose payload has not fully
    /// arrived yields [`FrameError::Truncated`] and the partial frame is
    /// discarded.
    pub fn read_frame_within(&mut self, timeout: Option<Duration>) -> Result<Frame> {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        if deadline.is_none() {
            self.inner.set_read_timeout(None)?;
        }

        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(self.incomplete(FrameError::TimedOut));
                }
                self.inner.set_read_timeout(Some(deadline - now))?;
            }

            match self.fill() {
                Ok(0) => return Err(self.closed()),
                Ok(_) => continue,
                Err(FrameError::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl FrameReader<SpiStream> {
    /// Create a frame reader for `SpiStream` and apply read timeout from config.
    pub fn with_config_stream(inner: SpiStream, config: FrameConfig) -> Result<Self> {
        ReadDeadline::set_read_timeout(&inner, config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::{TcpListener, TcpStream};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::kind::MessageKind;

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");
        let client = TcpStream::connect(addr).expect("connect should succeed");
        let (server, _) = listener.accept().expect("accept should succeed");
        (client, server)
    }

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 1, 7, b"hello", &mut wire).expect("encode");

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().expect("frame should decode");

        assert_eq!(frame.header.kind, MessageKind::Response);
        assert_eq!(frame.header.device, 1);
        assert_eq!(frame.header.sequence, 7);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 0, 0, b"one", &mut wire).expect("encode");
        encode_frame(MessageKind::Response, 0, 1, b"two", &mut wire).expect("encode");

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let f1 = reader.read_frame().expect("first");
        let f2 = reader.read_frame().expect("second");

        assert_eq!((f1.header.sequence, f1.payload.as_ref()), (0, b"one".as_ref()));
        assert_eq!((f2.header.sequence, f2.payload.as_ref()), (1, b"two".as_ref()));
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 4, 2, b"slow", &mut wire).expect("encode");

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().expect("frame should assemble");
        assert_eq!(frame.header.device, 4);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().expect_err("empty stream has no frame");
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn short_payload_is_truncation_not_short_read() {
        let mut partial = BytesMut::new();
        partial.put_u8(MessageKind::Response.as_u8());
        partial.put_u8(0);
        partial.put_u16_le(16);
        partial.put_u32_le(3);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().expect_err("payload is short");
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 16,
                received: 9
            }
        ));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn unknown_kind_in_stream() {
        let bytes = vec![0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().expect_err("kind is invalid");
        assert!(matches!(err, FrameError::UnknownKind(0x55)));
    }

    #[test]
    fn unknown_kind_frame_does_not_block_the_next_reply() {
        let (client, mut server) = tcp_pair();
        let mut reader = FrameReader::new(client);

        let mut wire = BytesMut::new();
        wire.put_slice(&[0x81, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0xEE, 0xEE]);
        std::io::Write::write_all(&mut server, &wire).expect("write bad frame");

        let err = reader
            .read_frame_within(Some(Duration::from_secs(2)))
            .expect_err("kind 0x81 is not a tag");
        assert!(matches!(err, FrameError::UnknownKind(0x81)));
        assert_eq!(reader.buffered(), 0);

        wire.clear();
        encode_frame(MessageKind::Response, 0, 2, b"next", &mut wire).expect("encode");
        std::io::Write::write_all(&mut server, &wire).expect("write reply");
        let frame = reader
            .read_frame_within(Some(Duration::from_secs(2)))
            .expect("reply after the bad frame should decode");
        assert_eq!(frame.header.sequence, 2);
        assert_eq!(frame.payload.as_ref(), b"next");
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 0, 8, b"ok", &mut wire).expect("encode");

        let reader = InterruptedThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().expect("interrupt should be retried");
        assert_eq!(frame.header.sequence, 8);
    }

    #[test]
    fn deadline_without_header_times_out() {
        let (client, _server) = tcp_pair();
        let mut reader = FrameReader::new(client);

        let started = Instant::now();
        let err = reader
            .read_frame_within(Some(Duration::from_millis(50)))
            .expect_err("nothing was sent");
        assert!(matches!(err, FrameError::TimedOut));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn deadline_with_partial_header_keeps_bytes() {
        let (client, mut server) = tcp_pair();
        let mut reader = FrameReader::new(client);

        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 0, 5, b"late", &mut wire).expect("encode");
        std::io::Write::write_all(&mut server, &wire[..3]).expect("write partial header");

        let err = reader
            .read_frame_within(Some(Duration::from_millis(50)))
            .expect_err("header is incomplete");
        assert!(matches!(err, FrameError::TimedOut));
        assert_eq!(reader.buffered(), 3);

        std::io::Write::write_all(&mut server, &wire[3..]).expect("write remainder");
        let frame = reader
            .read_frame_within(Some(Duration::from_secs(2)))
            .expect("frame should complete");
        assert_eq!(frame.header.sequence, 5);
        assert_eq!(frame.payload.as_ref(), b"late");
    }

    #[test]
    fn deadline_with_short_payload_is_truncated() {
        let (client, mut server) = tcp_pair();
        let mut reader = FrameReader::new(client);

        let mut wire = BytesMut::new();
        encode_frame(MessageKind::Response, 0, 1, &[0xAB; 10], &mut wire).expect("encode");
        std::io::Write::write_all(&mut server, &wire[..HEADER_SIZE + 4]).expect("write");

        let err = reader
            .read_frame_within(Some(Duration::from_millis(50)))
            .expect_err("payload is incomplete");
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 10,
                received: 4
            }
        ));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn roundtrip_over_tcp() {
        let (client, server) = tcp_pair();
        let mut writer = crate::writer::FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer
            .send(MessageKind::Send, 2, 11, &[1, 2, 3, 4])
            .expect("write should succeed");
        let frame = reader
            .read_frame_within(Some(Duration::from_secs(2)))
            .expect("frame should arrive");

        assert_eq!(frame.header.kind, MessageKind::Send);
        assert_eq!(frame.header.device, 2);
        assert_eq!(frame.header.length, 4);
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
