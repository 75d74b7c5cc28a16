//! The seven-operation contract every backend satisfies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SpiConfig;
use crate::device::DeviceId;
use crate::error::Result;
use crate::status::DeviceStatus;

/// Family a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Framed request/response against a remote peer.
    Network,
    /// In-memory loopback.
    Simulated,
    /// STM32 Nucleo peripheral registers.
    Stm32,
    /// Renesas RH850 peripheral registers.
    Rh850,
}

impl BackendKind {
    /// Implementation name reported to applications.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Network => "Socket",
            BackendKind::Simulated => "Simulation",
            BackendKind::Stm32 => "STM32-Nucleo",
            BackendKind::Rh850 => "RH850",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete SPI backend.
///
/// Implementors own one session per device slot and enforce the lifecycle
/// themselves: `init` on an initialized slot is [`HalError::Busy`], data
/// operations on a Reset slot are [`HalError::NotInitialized`], and an
/// operation issued while another is in flight on the same slot is
/// [`HalError::Busy`]. [`SessionStore`] implements these rules.
///
/// Arguments arrive already validated by [`SpiHal`]: `tx`, `rx` and `data`
/// are non-empty, `rx.len() == tx.len()`, and no buffer exceeds
/// `u16::MAX` bytes. `timeout_ms == 0` means wait without a deadline.
///
/// [`HalError::Busy`]: crate::HalError::Busy
/// [`HalError::NotInitialized`]: crate::HalError::NotInitialized
/// [`SessionStore`]: crate::SessionStore
/// [`SpiHal`]: crate::SpiHal
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn init(&self, device: DeviceId, config: &SpiConfig) -> Result<()>;

    fn deinit(&self, device: DeviceId) -> Result<()>;

    /// Full-duplex exchange: clock out `tx` while filling `rx`.
    fn transfer(&self, device: DeviceId, tx: &[u8], rx: &mut [u8], timeout_ms: u32) -> Result<()>;

    fn send(&self, device: DeviceId, data: &[u8], timeout_ms: u32) -> Result<()>;

    /// Fill `buf` with received bytes; returns how many were delivered.
    fn receive(&self, device: DeviceId, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Replace the slot configuration wholesale.
    fn set_config(&self, device: DeviceId, config: &SpiConfig) -> Result<()>;

    /// Snapshot of the slot status. Safe to call while an operation is in flight.
    fn status(&self, device: DeviceId) -> Result<DeviceStatus>;
}
