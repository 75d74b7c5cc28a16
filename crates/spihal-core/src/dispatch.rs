//! The validating dispatch context.

use tracing::info;

use crate::backend::{Backend, BackendKind};
use crate::config::SpiConfig;
use crate::device::DeviceId;
use crate::error::{HalError, Result};
use crate::status::DeviceStatus;

/// Largest buffer a single operation accepts (16-bit wire length).
pub const MAX_TRANSFER: usize = u16::MAX as usize;

/// Application-facing context holding the one active backend.
///
/// Every operation first fails with [`HalError::NotInitialized`] when no
/// backend is registered, then with [`HalError::InvalidParameter`] for a
/// device index above 6 or an empty, mismatched or oversized buffer. Only
/// then is the call forwarded, and the backend's result is returned as-is.
#[derive(Default)]
pub struct SpiHal {
    backend: Option<Box<dyn Backend>>,
}

impl SpiHal {
    /// A context with no backend registered.
    pub const fn new() -> Self {
        Self { backend: None }
    }

    pub fn with_backend<B: Backend + 'static>(backend: B) -> Self {
        let mut hal = Self::new();
        hal.register(backend);
        hal
    }

    /// Make `backend` the active backend, replacing any previous one.
    pub fn register<B: Backend + 'static>(&mut self, backend: B) {
        self.register_boxed(Box::new(backend));
    }

    pub fn register_boxed(&mut self, backend: Box<dyn Backend>) {
        info!(backend = backend.kind().name(), "backend registered");
        self.backend = Some(backend);
    }

    pub fn is_registered(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|backend| backend.kind())
    }

    /// Name of the active implementation, e.g. `"Socket"`.
    pub fn implementation_name(&self) -> Option<&'static str> {
        self.backend_kind().map(BackendKind::name)
    }

    fn target(&self, device: u8) -> Result<(&dyn Backend, DeviceId)> {
        let backend = self.backend.as_deref().ok_or(HalError::NotInitialized)?;
        let device = DeviceId::try_from(device)?;
        Ok((backend, device))
    }

    pub fn init(&self, device: u8, config: &SpiConfig) -> Result<()> {
        let (backend, device) = self.target(device)?;
        backend.init(device, config)
    }

    pub fn deinit(&self, device: u8) -> Result<()> {
        let (backend, device) = self.target(device)?;
        backend.deinit(device)
    }

    pub fn transfer(&self, device: u8, tx: &[u8], rx: &mut [u8], timeout_ms: u32) -> Result<()> {
        let (backend, device) = self.target(device)?;
        check_buffer(tx)?;
        if rx.len() != tx.len() {
            return Err(HalError::InvalidParameter("rx buffer length must match tx"));
        }
        backend.transfer(device, tx, rx, timeout_ms)
    }

    pub fn send(&self, device: u8, data: &[u8], timeout_ms: u32) -> Result<()> {
        let (backend, device) = self.target(device)?;
        check_buffer(data)?;
        backend.send(device, data, timeout_ms)
    }

    /// Receive up to `buf.len()` bytes; returns the count delivered.
    pub fn receive(&self, device: u8, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let (backend, device) = self.target(device)?;
        check_buffer(buf)?;
        backend.receive(device, buf, timeout_ms)
    }

    pub fn set_config(&self, device: u8, config: &SpiConfig) -> Result<()> {
        let (backend, device) = self.target(device)?;
        backend.set_config(device, config)
    }

    pub fn status(&self, device: u8) -> Result<DeviceStatus> {
        let (backend, device) = self.target(device)?;
        backend.status(device)
    }
}

impl std::fmt::Debug for SpiHal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiHal")
            .field("backend", &self.backend_kind())
            .finish()
    }
}

fn check_buffer(buf: &[u8]) -> Result<()> {
    if buf.is_empty() {
        return Err(HalError::InvalidParameter("buffer must not be empty"));
    }
    if buf.len() > MAX_TRANSFER {
        return Err(HalError::InvalidParameter("buffer exceeds 65535 bytes"));
    }
    Ok(())
}
