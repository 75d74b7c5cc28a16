use std::os::raw::c_int;

use spihal::{BitOrder, DeviceState, DeviceStatus, HalError, SpiConfig, SpiMode};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalStatus {
    Ok = 0,
    Error = -1,
    Busy = -2,
    Timeout = -3,
    InvalidParam = -4,
    NotInit = -5,
    NoData = -6,
}

#[allow(dead_code)]
pub const HAL_OK: HalStatus = HalStatus::Ok;
#[allow(dead_code)]
pub const HAL_ERROR: HalStatus = HalStatus::Error;
#[allow(dead_code)]
pub const HAL_ERROR_BUSY: HalStatus = HalStatus::Busy;
#[allow(dead_code)]
pub const HAL_ERROR_TIMEOUT: HalStatus = HalStatus::Timeout;
#[allow(dead_code)]
pub const HAL_ERROR_INVALID_PARAM: HalStatus = HalStatus::InvalidParam;
#[allow(dead_code)]
pub const HAL_ERROR_NOT_INIT: HalStatus = HalStatus::NotInit;
#[allow(dead_code)]
pub const HAL_ERROR_NO_DATA: HalStatus = HalStatus::NoData;

#[allow(dead_code)]
pub const HAL_SPI_MAX_INTERFACES: c_int = spihal::DEVICE_COUNT as c_int;

impl From<&HalError> for HalStatus {
    fn from(err: &HalError) -> Self {
        match err {
            HalError::Failed(_) => HalStatus::Error,
            HalError::Busy => HalStatus::Busy,
            HalError::TimedOut => HalStatus::Timeout,
            HalError::InvalidParameter(_) => HalStatus::InvalidParam,
            HalError::NotInitialized => HalStatus::NotInit,
            HalError::NoData => HalStatus::NoData,
        }
    }
}

/// `hal_spi_config_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalSpiConfig {
    pub baudrate: u32,
    pub mode: c_int,
    pub bit_order: c_int,
    pub data_bits: u8,
}

impl TryFrom<&HalSpiConfig> for SpiConfig {
    type Error = HalError;

    fn try_from(raw: &HalSpiConfig) -> Result<Self, Self::Error> {
        let mode = u8::try_from(raw.mode)
            .map_err(|_| HalError::InvalidParameter("spi mode must be 0-3"))
            .and_then(SpiMode::try_from)?;
        let bit_order = u8::try_from(raw.bit_order)
            .map_err(|_| HalError::InvalidParameter("bit order must be 0 or 1"))
            .and_then(BitOrder::try_from)?;
        Ok(SpiConfig {
            clock_hz: raw.baudrate,
            mode,
            bit_order,
            word_bits: raw.data_bits,
        })
    }
}

impl From<&SpiConfig> for HalSpiConfig {
    fn from(config: &SpiConfig) -> Self {
        Self {
            baudrate: config.clock_hz,
            mode: c_int::from(config.mode as u8),
            bit_order: c_int::from(config.bit_order as u8),
            data_bits: config.word_bits,
        }
    }
}

/// `hal_spi_status_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalSpiStatus {
    pub state: c_int,
    pub tx_count: u32,
    pub rx_count: u32,
    pub error_count: u32,
    pub is_busy: bool,
}

impl From<&DeviceStatus> for HalSpiStatus {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            state: c_int::from(status.state as u8),
            tx_count: status.tx_count,
            rx_count: status.rx_count,
            error_count: status.error_count,
            is_busy: status.busy,
        }
    }
}

impl From<&HalSpiStatus> for DeviceStatus {
    fn from(raw: &HalSpiStatus) -> Self {
        let state = match raw.state {
            0 => DeviceState::Reset,
            1 => DeviceState::Ready,
            2 => DeviceState::Busy,
            _ => DeviceState::Error,
        };
        Self {
            state,
            tx_count: raw.tx_count,
            rx_count: raw.rx_count,
            error_count: raw.error_count,
            busy: raw.is_busy,
        }
    }
}

pub type InitFn = unsafe extern "C" fn(device: c_int, config: *const HalSpiConfig) -> c_int;
pub type DeinitFn = unsafe extern "C" fn(device: c_int) -> c_int;
pub type TransferFn = unsafe extern "C" fn(
    device: c_int,
    tx_data: *const u8,
    rx_data: *mut u8,
    length: u16,
    timeout_ms: u32,
) -> c_int;
pub type SendFn =
    unsafe extern "C" fn(device: c_int, data: *const u8, length: u16, timeout_ms: u32) -> c_int;
pub type ReceiveFn =
    unsafe extern "C" fn(device: c_int, data: *mut u8, length: u16, timeout_ms: u32) -> c_int;
pub type SetConfigFn = unsafe extern "C" fn(device: c_int, config: *const HalSpiConfig) -> c_int;
pub type GetStatusFn = unsafe extern "C" fn(device: c_int, status: *mut HalSpiStatus) -> c_int;

/// `hal_spi_ops_t`: a backend supplied as seven C function pointers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HalSpiOps {
    pub init: Option<InitFn>,
    pub deinit: Option<DeinitFn>,
    pub transfer: Option<TransferFn>,
    pub send: Option<SendFn>,
    pub receive: Option<ReceiveFn>,
    pub set_config: Option<SetConfigFn>,
    pub get_status: Option<GetStatusFn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_codes() {
        for err in [
            HalError::Failed(String::new()),
            HalError::Busy,
            HalError::TimedOut,
            HalError::InvalidParameter("x"),
            HalError::NotInitialized,
            HalError::NoData,
        ] {
            assert_eq!(HalStatus::from(&err) as i32, err.code());
        }
    }

    #[test]
    fn config_conversion_validates_enums() {
        let raw = HalSpiConfig {
            baudrate: 2_000_000,
            mode: 2,
            bit_order: 1,
            data_bits: 16,
        };
        let config = SpiConfig::try_from(&raw).expect("valid config");
        assert_eq!(config.mode, SpiMode::Mode2);
        assert_eq!(config.bit_order, BitOrder::LsbFirst);
        assert_eq!(HalSpiConfig::from(&config), raw);

        let bad = HalSpiConfig { mode: -1, ..raw };
        assert!(matches!(
            SpiConfig::try_from(&bad),
            Err(HalError::InvalidParameter(_))
        ));
    }

    #[test]
    fn unknown_foreign_state_is_error() {
        let raw = HalSpiStatus {
            state: 42,
            ..HalSpiStatus::default()
        };
        assert_eq!(DeviceStatus::from(&raw).state, DeviceState::Error);
    }
}
