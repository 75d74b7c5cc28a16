//! One device slot's connection to the peer.

use std::time::{Duration, Instant};

use spihal_core::{DeviceId, SpiConfig};
use spihal_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter, MessageKind};
use spihal_transport::{Endpoint, SpiStream, TcpTransport};
use tracing::{debug, info, warn};

use crate::config::SocketConfig;
use crate::error::{NetError, Result};

struct Connection {
    endpoint: Endpoint,
    reader: FrameReader<SpiStream>,
    writer: FrameWriter<SpiStream>,
}

impl Connection {
    fn establish(config: &SocketConfig) -> Result<Self> {
        let endpoint = config.endpoint.resolve()?;
        let stream = TcpTransport::connect(&endpoint, config.connect_timeout)?;
        let read_half = stream.try_clone()?;

        let frame_config = FrameConfig {
            write_timeout: config.write_timeout,
            ..FrameConfig::default()
        };
        let writer = FrameWriter::with_config_stream(stream, frame_config.clone())?;
        let reader = FrameReader::with_config(read_half, frame_config);

        Ok(Self {
            endpoint,
            reader,
            writer,
        })
    }
}

/// Transport session for one slot.
///
/// A link without a connection is in disconnected mode: the slot counts as
/// initialized but every request fails with [`NetError::Disconnected`].
pub(crate) struct Link {
    device: DeviceId,
    connection: Option<Connection>,
    sequence: u32,
    strict: bool,
}

impl Link {
    /// Connect to the configured peer and announce `spi`.
    ///
    /// Never fails: an unreachable peer leaves the link disconnected.
    pub(crate) fn open(device: DeviceId, spi: &SpiConfig, config: &SocketConfig) -> Self {
        let mut link = Self {
            device,
            connection: None,
            sequence: 0,
            strict: config.strict_correlation,
        };

        match Connection::establish(config) {
            Ok(connection) => {
                info!(%device, endpoint = %connection.endpoint, "connected to peer");
                link.connection = Some(connection);
                if let Err(err) = link.request(MessageKind::Init, &spi.to_wire()) {
                    warn!(%device, error = %err, "init announcement failed");
                }
            }
            Err(err) => {
                warn!(%device, error = %err, "peer unreachable, running in disconnected mode");
            }
        }
        link
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Sequence number the next request will carry.
    #[cfg(test)]
    pub(crate) fn next_sequence(&self) -> u32 {
        self.sequence
    }

    /// Send one request frame and return its sequence number.
    pub(crate) fn request(&mut self, kind: MessageKind, payload: &[u8]) -> Result<u32> {
        let device = self.device.as_u8();
        let connection = self.connection.as_mut().ok_or(NetError::Disconnected)?;

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let result = connection.writer.send(kind, device, sequence, payload);
        debug!(device, seq = sequence, kind = kind.name(), len = payload.len(), "request sent");
        self.settle(result.map(|()| sequence).map_err(NetError::from))
    }

    /// Wait for the reply to request `sequence`.
    ///
    /// Without strict correlation the first complete frame is the answer.
    /// With it, frames of another kind or sequence are dropped and the wait
    /// continues until `timeout` runs out.
    pub(crate) fn await_response(
        &mut self,
        sequence: u32,
        timeout: Option<Duration>,
    ) -> Result<Frame> {
        let result = self.read_response(sequence, timeout);
        self.settle(result)
    }

    /// Send a request and wait for its reply.
    pub(crate) fn exchange(
        &mut self,
        kind: MessageKind,
        payload: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Frame> {
        let sequence = self.request(kind, payload)?;
        self.await_response(sequence, timeout)
    }

    /// Say goodbye to the peer and drop the connection. Best-effort.
    pub(crate) fn close(&mut self) {
        if self.connection.is_none() {
            return;
        }
        if let Err(err) = self.request(MessageKind::Deinit, &[]) {
            debug!(device = %self.device, error = %err, "deinit announcement failed");
        }
        if let Some(connection) = self.connection.take() {
            if let Err(err) = connection.writer.get_ref().shutdown() {
                debug!(device = %self.device, error = %err, "shutdown failed");
            }
        }
    }

    fn read_response(&mut self, sequence: u32, timeout: Option<Duration>) -> Result<Frame> {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        let strict = self.strict;
        let device = self.device;
        let connection = self.connection.as_mut().ok_or(NetError::Disconnected)?;

        loop {
            let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            let frame = match connection.reader.read_frame_within(remaining) {
                Ok(frame) => frame,
                Err(FrameError::UnknownKind(tag)) if strict => {
                    warn!(%device, expected = sequence, tag, "discarding frame of unknown kind");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let header = frame.header;

            if !strict || (header.kind == MessageKind::Response && header.sequence == sequence) {
                debug!(
                    device = header.device,
                    seq = header.sequence,
                    len = frame.payload.len(),
                    "response received"
                );
                return Ok(frame);
            }
            warn!(
                device = header.device,
                expected = sequence,
                seq = header.sequence,
                kind = header.kind.name(),
                "discarding uncorrelated frame"
            );
        }
    }

    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(err) = &result {
            if err.is_disconnect() && self.connection.take().is_some() {
                warn!(device = %self.device, error = %err, "peer closed connection, slot disconnected");
            }
        }
        result
    }
}
