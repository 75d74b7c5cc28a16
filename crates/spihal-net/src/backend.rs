use std::time::Duration;

use spihal_core::{
    Backend, BackendKind, DeviceId, DeviceStatus, HalError, Operation, Result, SessionStore,
    SpiConfig,
};
use spihal_frame::MessageKind;
use tracing::{debug, info};

use crate::config::SocketConfig;
use crate::error::NetError;
use crate::session::Link;

/// SPI backend that forwards every operation to a remote peer.
///
/// Each initialized slot owns its own TCP connection. If the peer cannot be
/// reached, `init` still succeeds and the slot runs in disconnected mode:
/// `transfer`, `send`, `receive` and `set_config` then fail with
/// [`HalError::NotInitialized`] while `status` keeps answering. A new
/// `init` after `deinit` retries the connection.
pub struct SocketBackend {
    config: SocketConfig,
    sessions: SessionStore<Link>,
}

impl Default for SocketBackend {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl SocketBackend {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }
}

/// A zero timeout waits without a deadline.
fn wait_limit(timeout_ms: u32) -> Option<Duration> {
    (timeout_ms != 0).then(|| Duration::from_millis(u64::from(timeout_ms)))
}

/// The slot's link, or [`HalError::NotInitialized`] in disconnected mode.
fn connected<'a>(op: &'a mut Operation<'_, Link>) -> Result<&'a mut Link> {
    let link = op.resources()?;
    if link.is_connected() {
        Ok(link)
    } else {
        Err(HalError::NotInitialized)
    }
}

impl Backend for SocketBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Network
    }

    fn init(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        let mut online = false;
        self.sessions.init(device, config, |spi| {
            let link = Link::open(device, spi, &self.config);
            online = link.is_connected();
            Ok(link)
        })?;
        info!(%device, connected = online, "socket device initialized");
        Ok(())
    }

    fn deinit(&self, device: DeviceId) -> Result<()> {
        let (link, status) = self.sessions.deinit(device)?;
        if let Some(mut link) = link {
            link.close();
        }
        info!(
            %device,
            tx = status.tx_count,
            rx = status.rx_count,
            errors = status.error_count,
            "socket device deinitialized"
        );
        Ok(())
    }

    fn transfer(&self, device: DeviceId, tx: &[u8], rx: &mut [u8], timeout_ms: u32) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        connected(&mut op)?;

        op.track(|op| {
            let frame = op
                .resources()?
                .exchange(MessageKind::Transfer, tx, wait_limit(timeout_ms))?;
            if frame.payload.len() != rx.len() {
                return Err(NetError::LengthMismatch {
                    expected: rx.len(),
                    received: frame.payload.len(),
                }
                .into());
            }
            rx.copy_from_slice(&frame.payload);
            op.add_tx(tx.len());
            op.add_rx(rx.len());
            debug!(%device, len = tx.len(), "transferred");
            Ok(())
        })
    }

    fn send(&self, device: DeviceId, data: &[u8], timeout_ms: u32) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        connected(&mut op)?;

        op.track(|op| {
            let sequence = op.resources()?.request(MessageKind::Send, data)?;
            // The bytes left once the request hit the wire, acknowledged or not.
            op.add_tx(data.len());
            op.resources()?
                .await_response(sequence, wait_limit(timeout_ms))?;
            debug!(%device, len = data.len(), "sent");
            Ok(())
        })
    }

    fn receive(&self, device: DeviceId, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let mut op = self.sessions.begin(device)?;
        connected(&mut op)?;

        let wanted = u16::try_from(buf.len())
            .map_err(|_| HalError::InvalidParameter("receive length exceeds 65535 bytes"))?;

        op.track(|op| {
            let frame = op.resources()?.exchange(
                MessageKind::Receive,
                &wanted.to_be_bytes(),
                wait_limit(timeout_ms),
            )?;
            let received = frame.payload.len();
            if received > buf.len() {
                return Err(NetError::Overflow {
                    capacity: buf.len(),
                    received,
                }
                .into());
            }
            buf[..received].copy_from_slice(&frame.payload);
            op.add_rx(received);
            debug!(%device, len = received, requested = buf.len(), "received");
            Ok(received)
        })
    }

    fn set_config(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        let link = connected(&mut op)?;
        if let Err(err) = link.request(MessageKind::SetConfig, &config.to_wire()) {
            debug!(%device, error = %err, "config update not delivered");
        }
        op.replace_config(*config);
        info!(
            %device,
            clock_hz = config.clock_hz,
            mode = config.mode as u8,
            "socket device reconfigured"
        );
        Ok(())
    }

    fn status(&self, device: DeviceId) -> Result<DeviceStatus> {
        self.sessions.status(device)
    }
}
