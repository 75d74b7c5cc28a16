use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use spihal::HalError;

use crate::types::HalStatus;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

/// Record `err` as this thread's last error and return its status code.
pub(crate) fn record(err: &HalError) -> HalStatus {
    set_error_message(err.to_string());
    HalStatus::from(err)
}

pub(crate) fn invalid_param(message: &'static str) -> HalStatus {
    record(&HalError::InvalidParameter(message))
}

pub(crate) fn to_status(result: spihal::Result<()>) -> HalStatus {
    match result {
        Ok(()) => HalStatus::Ok,
        Err(err) => record(&err),
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
