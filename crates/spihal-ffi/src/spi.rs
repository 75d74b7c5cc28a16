use std::os::raw::c_int;
use std::slice;

use spihal::{HalError, SpiConfig, SpiHal};
use tracing::warn;

use crate::error;
use crate::foreign::ForeignBackend;
use crate::types::{HalSpiConfig, HalSpiOps, HalSpiStatus, HalStatus};

/// Shared entry path: clear the last error, require a registered backend,
/// then run `f`.
fn dispatch(f: impl FnOnce(&SpiHal) -> HalStatus) -> HalStatus {
    crate::ffi_boundary(HalStatus::Error, || {
        error::clear_error_state();
        crate::with_hal(|hal| {
            if !hal.is_registered() {
                return error::record(&HalError::NotInitialized);
            }
            f(hal)
        })
    })
}

/// Device indices that do not fit a `u8` are mapped to one the dispatch
/// layer rejects.
fn device_arg(device: c_int) -> u8 {
    u8::try_from(device).unwrap_or(u8::MAX)
}

/// # Safety
/// `config` must be null or point to a valid `HalSpiConfig`.
unsafe fn config_arg(config: *const HalSpiConfig) -> Result<SpiConfig, HalStatus> {
    if config.is_null() {
        return Err(error::invalid_param("config cannot be null"));
    }
    // SAFETY: non-null, validity guaranteed by the caller.
    let raw = unsafe { &*config };
    SpiConfig::try_from(raw).map_err(|err| error::record(&err))
}

/// Register a backend given as a C operation table.
///
/// Fails with `HAL_ERROR_INVALID_PARAM` if `ops` is null or any entry is
/// null; the previously registered backend then stays active. The table is
/// copied, so it need not outlive this call, but the functions it points to
/// must stay valid for the life of the process.
///
/// # Safety
/// `ops` must be null or point to a valid `HalSpiOps`.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_register_ops(ops: *const HalSpiOps) -> HalStatus {
    crate::ffi_boundary(HalStatus::Error, || {
        error::clear_error_state();
        if ops.is_null() {
            return error::invalid_param("ops cannot be null");
        }
        // SAFETY: non-null, validity guaranteed by the caller.
        let ops = unsafe { &*ops };
        match ForeignBackend::bind(ops, spihal::BUILD_KIND) {
            Ok(backend) => crate::with_hal_mut(|hal| {
                hal.register(backend);
                HalStatus::Ok
            }),
            Err(err) => {
                warn!(error = %err, "operation table rejected");
                error::record(&err)
            }
        }
    })
}

/// # Safety
/// `config` must be null or point to a valid `HalSpiConfig`.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_init(device: c_int, config: *const HalSpiConfig) -> HalStatus {
    dispatch(|hal| {
        // SAFETY: forwarded caller contract.
        match unsafe { config_arg(config) } {
            Ok(config) => error::to_status(hal.init(device_arg(device), &config)),
            Err(status) => status,
        }
    })
}

#[no_mangle]
pub extern "C" fn hal_spi_deinit(device: c_int) -> HalStatus {
    dispatch(|hal| error::to_status(hal.deinit(device_arg(device))))
}

/// Full-duplex exchange of `length` bytes.
///
/// `tx_data` and `rx_data` may point to the same buffer.
///
/// # Safety
/// `tx_data` must be readable and `rx_data` writable for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_transfer(
    device: c_int,
    tx_data: *const u8,
    rx_data: *mut u8,
    length: u16,
    timeout_ms: u32,
) -> HalStatus {
    dispatch(|hal| {
        if tx_data.is_null() || rx_data.is_null() {
            return error::invalid_param("tx_data and rx_data cannot be null");
        }
        if length == 0 {
            return error::invalid_param("length cannot be zero");
        }
        // Copy tx out first so an in-place buffer is never aliased.
        // SAFETY: non-null, readable for `length` bytes per the caller.
        let tx = unsafe { slice::from_raw_parts(tx_data, usize::from(length)) }.to_vec();
        // SAFETY: non-null, writable for `length` bytes per the caller.
        let rx = unsafe { slice::from_raw_parts_mut(rx_data, usize::from(length)) };
        error::to_status(hal.transfer(device_arg(device), &tx, rx, timeout_ms))
    })
}

/// # Safety
/// `data` must be readable for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_send(
    device: c_int,
    data: *const u8,
    length: u16,
    timeout_ms: u32,
) -> HalStatus {
    dispatch(|hal| {
        if data.is_null() {
            return error::invalid_param("data cannot be null");
        }
        if length == 0 {
            return error::invalid_param("length cannot be zero");
        }
        // SAFETY: non-null, readable for `length` bytes per the caller.
        let data = unsafe { slice::from_raw_parts(data, usize::from(length)) };
        error::to_status(hal.send(device_arg(device), data, timeout_ms))
    })
}

/// # Safety
/// `data` must be writable for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_receive(
    device: c_int,
    data: *mut u8,
    length: u16,
    timeout_ms: u32,
) -> HalStatus {
    dispatch(|hal| {
        if data.is_null() {
            return error::invalid_param("data cannot be null");
        }
        if length == 0 {
            return error::invalid_param("length cannot be zero");
        }
        // SAFETY: non-null, writable for `length` bytes per the caller.
        let buf = unsafe { slice::from_raw_parts_mut(data, usize::from(length)) };
        error::to_status(hal.receive(device_arg(device), buf, timeout_ms).map(|_| ()))
    })
}

/// # Safety
/// `config` must be null or point to a valid `HalSpiConfig`.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_set_config(
    device: c_int,
    config: *const HalSpiConfig,
) -> HalStatus {
    dispatch(|hal| {
        // SAFETY: forwarded caller contract.
        match unsafe { config_arg(config) } {
            Ok(config) => error::to_status(hal.set_config(device_arg(device), &config)),
            Err(status) => status,
        }
    })
}

/// # Safety
/// `status` must be null or point to writable `HalSpiStatus` storage.
#[no_mangle]
pub unsafe extern "C" fn hal_spi_get_status(device: c_int, status: *mut HalSpiStatus) -> HalStatus {
    dispatch(|hal| {
        if status.is_null() {
            return error::invalid_param("status cannot be null");
        }
        match hal.status(device_arg(device)) {
            Ok(current) => {
                // SAFETY: non-null, writable per the caller.
                unsafe { status.write(HalSpiStatus::from(&current)) };
                HalStatus::Ok
            }
            Err(err) => error::record(&err),
        }
    })
}
