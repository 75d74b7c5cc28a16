//! spihal-ffi: C-ABI exports for spihal.
//!
//! One process-wide [`SpiHal`] context backs every `hal_spi_*` call. It is
//! populated either by `hal_init` (the backend selected at build time) or by
//! `hal_spi_register_ops` (a C operation table, e.g. a peripheral register
//! driver).

mod error;
mod foreign;
mod spi;
mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;
use std::sync::{PoisonError, RwLock};

use spihal::{BackendKind, SpiHal};

pub use spi::{
    hal_spi_deinit, hal_spi_get_status, hal_spi_init, hal_spi_receive, hal_spi_register_ops,
    hal_spi_send, hal_spi_set_config, hal_spi_transfer,
};
pub use types::{
    DeinitFn, GetStatusFn, HalSpiConfig, HalSpiOps, HalSpiStatus, HalStatus, InitFn, ReceiveFn,
    SendFn, SetConfigFn, TransferFn, HAL_ERROR, HAL_ERROR_BUSY, HAL_ERROR_INVALID_PARAM,
    HAL_ERROR_NOT_INIT, HAL_ERROR_NO_DATA, HAL_ERROR_TIMEOUT, HAL_OK, HAL_SPI_MAX_INTERFACES,
};

static HAL: RwLock<SpiHal> = RwLock::new(SpiHal::new());

fn with_hal<T>(f: impl FnOnce(&SpiHal) -> T) -> T {
    let hal = HAL.read().unwrap_or_else(PoisonError::into_inner);
    f(&hal)
}

fn with_hal_mut<T>(f: impl FnOnce(&mut SpiHal) -> T) -> T {
    let mut hal = HAL.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut hal)
}

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

fn c_name(kind: BackendKind) -> &'static CStr {
    match kind {
        BackendKind::Network => c"Socket",
        BackendKind::Simulated => c"Simulation",
        BackendKind::Stm32 => c"STM32-Nucleo",
        BackendKind::Rh850 => c"RH850",
    }
}

/// Register the backend selected at build time.
#[no_mangle]
pub extern "C" fn hal_init() -> HalStatus {
    ffi_boundary(HalStatus::Error, || {
        error::clear_error_state();
        with_hal_mut(|hal| error::to_status(spihal::init(hal)))
    })
}

/// Name of the active implementation, or of the build-time selection when
/// nothing is registered yet. The string is static.
#[no_mangle]
pub extern "C" fn hal_get_implementation_name() -> *const c_char {
    ffi_boundary(std::ptr::null(), || {
        let kind = with_hal(SpiHal::backend_kind).unwrap_or(spihal::BUILD_KIND);
        c_name(kind).as_ptr()
    })
}

/// Message for the last failed call on this thread; empty after a success.
#[no_mangle]
pub extern "C" fn hal_last_error() -> *const c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[cfg(test)]
mod tests {
    use std::os::raw::c_int;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    use super::*;

    /// Tests share the process-wide context.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn exclusive() -> MutexGuard<'static, ()> {
        let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        with_hal_mut(|hal| *hal = SpiHal::new());
        guard
    }

    fn last_error() -> String {
        // SAFETY: hal_last_error returns a pointer to a thread-local CString.
        unsafe { CStr::from_ptr(hal_last_error()) }
            .to_str()
            .expect("last error should be UTF-8")
            .to_string()
    }

    fn implementation_name() -> String {
        // SAFETY: the name is a static C string.
        unsafe { CStr::from_ptr(hal_get_implementation_name()) }
            .to_str()
            .expect("name should be UTF-8")
            .to_string()
    }

    static STUB_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn stub_init(_device: c_int, config: *const HalSpiConfig) -> c_int {
        STUB_CALLS.fetch_add(1, Ordering::SeqCst);
        // SAFETY: the dispatcher passes a live config.
        if unsafe { (*config).baudrate } == 0 {
            return -4;
        }
        0
    }

    unsafe extern "C" fn stub_deinit(_device: c_int) -> c_int {
        0
    }

    unsafe extern "C" fn stub_transfer(
        _device: c_int,
        tx: *const u8,
        rx: *mut u8,
        length: u16,
        _timeout_ms: u32,
    ) -> c_int {
        for i in 0..usize::from(length) {
            // SAFETY: both buffers hold `length` bytes.
            unsafe { *rx.add(i) = (*tx.add(i)).wrapping_add(1) };
        }
        0
    }

    unsafe extern "C" fn stub_send(_device: c_int, _data: *const u8, _len: u16, _t: u32) -> c_int {
        -3
    }

    unsafe extern "C" fn stub_receive(_device: c_int, data: *mut u8, length: u16, _t: u32) -> c_int {
        // SAFETY: `data` holds `length` bytes.
        unsafe { std::ptr::write_bytes(data, 0xA5, usize::from(length)) };
        0
    }

    unsafe extern "C" fn stub_set_config(_device: c_int, _config: *const HalSpiConfig) -> c_int {
        0
    }

    unsafe extern "C" fn stub_get_status(_device: c_int, status: *mut HalSpiStatus) -> c_int {
        // SAFETY: the dispatcher passes writable storage.
        unsafe {
            status.write(HalSpiStatus {
                state: 1,
                tx_count: 11,
                rx_count: 22,
                error_count: 0,
                is_busy: false,
            })
        };
        0
    }

    fn stub_ops() -> HalSpiOps {
        HalSpiOps {
            init: Some(stub_init),
            deinit: Some(stub_deinit),
            transfer: Some(stub_transfer),
            send: Some(stub_send),
            receive: Some(stub_receive),
            set_config: Some(stub_set_config),
            get_status: Some(stub_get_status),
        }
    }

    fn default_config() -> HalSpiConfig {
        HalSpiConfig {
            baudrate: 1_000_000,
            mode: 0,
            bit_order: 0,
            data_bits: 8,
        }
    }

    #[test]
    fn calls_before_registration_are_not_initialized() {
        let _guard = exclusive();
        let config = default_config();
        let mut buf = [0u8; 2];
        let mut status = HalSpiStatus::default();

        // SAFETY: all pointers reference live locals.
        unsafe {
            assert_eq!(hal_spi_init(0, &config), HalStatus::NotInit);
            assert_eq!(
                hal_spi_transfer(0, buf.as_ptr(), buf.as_mut_ptr(), 2, 10),
                HalStatus::NotInit
            );
            assert_eq!(hal_spi_send(0, buf.as_ptr(), 2, 10), HalStatus::NotInit);
            assert_eq!(hal_spi_receive(0, buf.as_mut_ptr(), 2, 10), HalStatus::NotInit);
            assert_eq!(hal_spi_set_config(0, &config), HalStatus::NotInit);
            assert_eq!(hal_spi_get_status(0, &mut status), HalStatus::NotInit);
        }
        assert_eq!(hal_spi_deinit(0), HalStatus::NotInit);
        assert!(!last_error().is_empty());
        assert_eq!(implementation_name(), spihal::BUILD_KIND.name());
    }

    #[test]
    fn incomplete_table_is_rejected_and_previous_kept() {
        let _guard = exclusive();
        let ops = stub_ops();
        // SAFETY: pointer to a live local table.
        assert_eq!(unsafe { hal_spi_register_ops(&ops) }, HalStatus::Ok);

        let fields: [fn(&mut HalSpiOps); 7] = [
            |ops| ops.init = None,
            |ops| ops.deinit = None,
            |ops| ops.transfer = None,
            |ops| ops.send = None,
            |ops| ops.receive = None,
            |ops| ops.set_config = None,
            |ops| ops.get_status = None,
        ];
        for clear in fields {
            let mut partial = stub_ops();
            clear(&mut partial);
            // SAFETY: pointer to a live local table.
            assert_eq!(
                unsafe { hal_spi_register_ops(&partial) },
                HalStatus::InvalidParam
            );
        }
        // SAFETY: null is an accepted input.
        assert_eq!(
            unsafe { hal_spi_register_ops(std::ptr::null()) },
            HalStatus::InvalidParam
        );

        let mut status = HalSpiStatus::default();
        // SAFETY: pointer to a live local.
        assert_eq!(unsafe { hal_spi_get_status(0, &mut status) }, HalStatus::Ok);
        assert_eq!(status.tx_count, 11, "stub table is still active");
    }

    #[test]
    fn foreign_table_receives_forwarded_calls() {
        let _guard = exclusive();
        let ops = stub_ops();
        let config = default_config();
        // SAFETY: pointers reference live locals.
        unsafe {
            assert_eq!(hal_spi_register_ops(&ops), HalStatus::Ok);
            let before = STUB_CALLS.load(Ordering::SeqCst);
            assert_eq!(hal_spi_init(2, &config), HalStatus::Ok);
            assert!(STUB_CALLS.load(Ordering::SeqCst) > before);

            let zero_clock = HalSpiConfig {
                baudrate: 0,
                ..config
            };
            assert_eq!(hal_spi_init(2, &zero_clock), HalStatus::InvalidParam);

            let mut buf = [1u8, 2, 3];
            assert_eq!(
                hal_spi_transfer(2, buf.as_ptr(), buf.as_mut_ptr(), 3, 10),
                HalStatus::Ok
            );
            assert_eq!(buf, [2, 3, 4], "in-place transfer");

            assert_eq!(hal_spi_send(2, buf.as_ptr(), 3, 10), HalStatus::Timeout);
            assert!(last_error().contains("timed out"));

            let mut rx = [0u8; 2];
            assert_eq!(hal_spi_receive(2, rx.as_mut_ptr(), 2, 10), HalStatus::Ok);
            assert_eq!(rx, [0xA5, 0xA5]);
            assert!(last_error().is_empty());
        }
    }

    #[test]
    fn argument_checks() {
        let _guard = exclusive();
        let ops = stub_ops();
        let config = default_config();
        let mut buf = [0u8; 4];
        // SAFETY: pointers reference live locals or are null on purpose.
        unsafe {
            assert_eq!(hal_spi_register_ops(&ops), HalStatus::Ok);
            assert_eq!(hal_spi_init(7, &config), HalStatus::InvalidParam);
            assert_eq!(hal_spi_init(-1, &config), HalStatus::InvalidParam);
            assert_eq!(hal_spi_init(0, std::ptr::null()), HalStatus::InvalidParam);
            assert_eq!(
                hal_spi_transfer(0, std::ptr::null(), buf.as_mut_ptr(), 4, 10),
                HalStatus::InvalidParam
            );
            assert_eq!(
                hal_spi_transfer(0, buf.as_ptr(), buf.as_mut_ptr(), 0, 10),
                HalStatus::InvalidParam
            );
            assert_eq!(hal_spi_send(0, std::ptr::null(), 4, 10), HalStatus::InvalidParam);
            assert_eq!(hal_spi_receive(0, buf.as_mut_ptr(), 0, 10), HalStatus::InvalidParam);
            assert_eq!(
                hal_spi_get_status(0, std::ptr::null_mut()),
                HalStatus::InvalidParam
            );
            let bad_mode = HalSpiConfig { mode: 4, ..config };
            assert_eq!(hal_spi_set_config(0, &bad_mode), HalStatus::InvalidParam);
        }
    }

    #[cfg(not(any(feature = "socket", feature = "stm32", feature = "rh850")))]
    #[test]
    fn hal_init_selects_simulation() {
        let _guard = exclusive();
        assert_eq!(hal_init(), HalStatus::Ok);
        assert_eq!(implementation_name(), "Simulation");

        let config = default_config();
        let data = [9u8, 8, 7];
        let mut rx = [0u8; 3];
        let mut status = HalSpiStatus::default();
        // SAFETY: pointers reference live locals.
        unsafe {
            assert_eq!(hal_spi_init(1, &config), HalStatus::Ok);
            assert_eq!(hal_spi_init(1, &config), HalStatus::Busy);
            assert_eq!(hal_spi_send(1, data.as_ptr(), 3, 100), HalStatus::Ok);
            assert_eq!(hal_spi_receive(1, rx.as_mut_ptr(), 3, 100), HalStatus::Ok);
            assert_eq!(hal_spi_get_status(1, &mut status), HalStatus::Ok);
        }
        assert_eq!(rx, data);
        assert_eq!((status.tx_count, status.rx_count), (3, 3));
        assert_eq!(status.state, 1);
        assert_eq!(hal_spi_deinit(1), HalStatus::Ok);
        // SAFETY: pointer to a live local.
        assert_eq!(
            unsafe { hal_spi_get_status(1, &mut status) },
            HalStatus::NotInit
        );
    }
}
