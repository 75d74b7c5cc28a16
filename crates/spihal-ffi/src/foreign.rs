//! Backends supplied from C as a table of function pointers.

use std::os::raw::c_int;

use spihal::{Backend, BackendKind, DeviceId, DeviceStatus, HalError, Result, SpiConfig};

use crate::types::{
    DeinitFn, GetStatusFn, HalSpiConfig, HalSpiOps, HalSpiStatus, InitFn, ReceiveFn, SendFn,
    SetConfigFn, TransferFn,
};

/// A C operation table whose seven entries are all present.
pub(crate) struct ForeignBackend {
    kind: BackendKind,
    init: InitFn,
    deinit: DeinitFn,
    transfer: TransferFn,
    send: SendFn,
    receive: ReceiveFn,
    set_config: SetConfigFn,
    get_status: GetStatusFn,
}

impl ForeignBackend {
    /// Accept `ops` only if every entry is bound.
    pub(crate) fn bind(ops: &HalSpiOps, kind: BackendKind) -> Result<Self> {
        let missing = HalError::InvalidParameter("operation table is incomplete");
        Ok(Self {
            kind,
            init: ops.init.ok_or_else(|| missing.clone())?,
            deinit: ops.deinit.ok_or_else(|| missing.clone())?,
            transfer: ops.transfer.ok_or_else(|| missing.clone())?,
            send: ops.send.ok_or_else(|| missing.clone())?,
            receive: ops.receive.ok_or_else(|| missing.clone())?,
            set_config: ops.set_config.ok_or_else(|| missing.clone())?,
            get_status: ops.get_status.ok_or(missing)?,
        })
    }
}

fn device_arg(device: DeviceId) -> c_int {
    c_int::from(device.as_u8())
}

fn length_arg(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| HalError::InvalidParameter("length exceeds 65535 bytes"))
}

fn check(code: c_int) -> Result<()> {
    match HalError::from_code(code) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

// SAFETY (all calls below): the registrant guarantees the table's functions
// stay valid for the life of the process and honor the pointer/length pairs
// they are given. Every pointer passed is derived from a live Rust reference
// or slice of the stated length.
impl Backend for ForeignBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn init(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        let raw = HalSpiConfig::from(config);
        check(unsafe { (self.init)(device_arg(device), &raw) })
    }

    fn deinit(&self, device: DeviceId) -> Result<()> {
        check(unsafe { (self.deinit)(device_arg(device)) })
    }

    fn transfer(&self, device: DeviceId, tx: &[u8], rx: &mut [u8], timeout_ms: u32) -> Result<()> {
        let length = length_arg(tx.len())?;
        if rx.len() < tx.len() {
            return Err(HalError::InvalidParameter("rx buffer shorter than tx"));
        }
        check(unsafe {
            (self.transfer)(
                device_arg(device),
                tx.as_ptr(),
                rx.as_mut_ptr(),
                length,
                timeout_ms,
            )
        })
    }

    fn send(&self, device: DeviceId, data: &[u8], timeout_ms: u32) -> Result<()> {
        let length = length_arg(data.len())?;
        check(unsafe { (self.send)(device_arg(device), data.as_ptr(), length, timeout_ms) })
    }

    fn receive(&self, device: DeviceId, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let length = length_arg(buf.len())?;
        check(unsafe { (self.receive)(device_arg(device), buf.as_mut_ptr(), length, timeout_ms) })?;
        Ok(buf.len())
    }

    fn set_config(&self, device: DeviceId, config: &SpiConfig) -> Result<()> {
        let raw = HalSpiConfig::from(config);
        check(unsafe { (self.set_config)(device_arg(device), &raw) })
    }

    fn status(&self, device: DeviceId) -> Result<DeviceStatus> {
        let mut raw = HalSpiStatus::default();
        check(unsafe { (self.get_status)(device_arg(device), &mut raw) })?;
        Ok(DeviceStatus::from(&raw))
    }
}
