//! In-memory loopback backend.
//!
//! Bytes passed to `send` are queued per slot and handed back by `receive`;
//! `transfer` echoes its tx buffer into rx. Nothing touches hardware, so
//! demos and tests run without a peer.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::backend::{Backend, BackendKind};
use crate::config::SpiConfig;
use crate::device::DeviceId;
use crate::error::Result;
use crate::status::DeviceStatus;
use crate::store::SessionStore;

/// Bytes a slot's loopback queue holds before further sends are dropped.
pub const LOOPBACK_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Loopback {
    queue: VecDeque<u8>,
}

/// Simulated backend.
#[derive(Default)]
pub struct SimBackend {
    sessions: SessionStore<Loopback>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for SimBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn init(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        self.sessions.init(device, config, |_| Ok(Loopback::default()))?;
        debug!(
            %device,
            clock_hz = config.clock_hz,
            mode = config.mode as u8,
            word_bits = config.word_bits,
            "simulated device initialized"
        );
        Ok(())
    }

    fn deinit(&self, device: DeviceId) -> Result<()> {
        self.sessions.deinit(device)?;
        debug!(%device, "simulated device deinitialized");
        Ok(())
    }

    fn transfer(&self, device: DeviceId, tx: &[u8], rx: &mut [u8], _timeout_ms: u32) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        rx.copy_from_slice(tx);
        op.add_tx(tx.len());
        op.add_rx(rx.len());
        trace!(%device, len = tx.len(), wire_time = ?op.config().wire_time(tx.len()), "transfer");
        Ok(())
    }

    fn send(&self, device: DeviceId, data: &[u8], _timeout_ms: u32) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        let loopback = op.resources()?;
        let room = LOOPBACK_CAPACITY.saturating_sub(loopback.queue.len());
        let kept = data.len().min(room);
        loopback.queue.extend(&data[..kept]);
        if kept < data.len() {
            debug!(%device, dropped = data.len() - kept, "loopback full");
        }
        op.add_tx(data.len());
        trace!(%device, len = data.len(), wire_time = ?op.config().wire_time(data.len()), "send");
        Ok(())
    }

    fn receive(&self, device: DeviceId, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
        let mut op = self.sessions.begin(device)?;
        let loopback = op.resources()?;
        let queued = buf.len().min(loopback.queue.len());
        for (slot, byte) in buf.iter_mut().zip(loopback.queue.drain(..queued)) {
            *slot = byte;
        }
        buf[queued..].fill(0);
        op.add_rx(buf.len());
        trace!(%device, len = buf.len(), queued, "receive");
        Ok(buf.len())
    }

    fn set_config(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        let mut op = self.sessions.begin(device)?;
        op.replace_config(*config);
        debug!(%device, clock_hz = config.clock_hz, "simulated device reconfigured");
        Ok(())
    }

    fn status(&self, device: DeviceId) -> Result<DeviceStatus> {
        self.sessions.status(device)
    }
}
