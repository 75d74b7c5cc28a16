use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HalError, Result};

/// Encoded size of a [`SpiConfig`] on the wire.
pub const CONFIG_WIRE_SIZE: usize = 7;

/// Clock polarity/phase combination.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0 = 0,
    /// CPOL=0, CPHA=1
    Mode1 = 1,
    /// CPOL=1, CPHA=0
    Mode2 = 2,
    /// CPOL=1, CPHA=1
    Mode3 = 3,
}

impl SpiMode {
    /// Clock idles high.
    pub fn cpol(self) -> bool {
        matches!(self, SpiMode::Mode2 | SpiMode::Mode3)
    }

    /// Data is captured on the second clock edge.
    pub fn cpha(self) -> bool {
        matches!(self, SpiMode::Mode1 | SpiMode::Mode3)
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = HalError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SpiMode::Mode0),
            1 => Ok(SpiMode::Mode1),
            2 => Ok(SpiMode::Mode2),
            3 => Ok(SpiMode::Mode3),
            _ => Err(HalError::InvalidParameter("spi mode must be 0-3")),
        }
    }
}

/// Order in which bits of a word are shifted out.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitOrder {
    #[default]
    MsbFirst = 0,
    LsbFirst = 1,
}

impl TryFrom<u8> for BitOrder {
    type Error = HalError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BitOrder::MsbFirst),
            1 => Ok(BitOrder::LsbFirst),
            _ => Err(HalError::InvalidParameter("bit order must be 0 or 1")),
        }
    }
}

/// Per-device bus configuration. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiConfig {
    /// Clock rate in hertz.
    pub clock_hz: u32,
    pub mode: SpiMode,
    pub bit_order: BitOrder,
    /// Bits per data unit, normally 8, 16 or 32.
    pub word_bits: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            clock_hz: 1_000_000,
            mode: SpiMode::Mode0,
            bit_order: BitOrder::MsbFirst,
            word_bits: 8,
        }
    }
}

impl SpiConfig {
    /// Encode as clock (u32 LE), mode, bit order, word width.
    pub fn to_wire(&self) -> [u8; CONFIG_WIRE_SIZE] {
        let clock = self.clock_hz.to_le_bytes();
        [
            clock[0],
            clock[1],
            clock[2],
            clock[3],
            self.mode as u8,
            self.bit_order as u8,
            self.word_bits,
        ]
    }

    /// Decode the layout produced by [`SpiConfig::to_wire`]. Trailing bytes
    /// are ignored.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONFIG_WIRE_SIZE {
            return Err(HalError::InvalidParameter("config payload too short"));
        }
        Ok(Self {
            clock_hz: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            mode: SpiMode::try_from(bytes[4])?,
            bit_order: BitOrder::try_from(bytes[5])?,
            word_bits: bytes[6],
        })
    }

    /// Nominal time to clock `length` data units through the bus.
    ///
    /// `None` when the clock rate is zero.
    pub fn wire_time(&self, length: usize) -> Option<Duration> {
        if self.clock_hz == 0 {
            return None;
        }
        let bits = length as u128 * u128::from(self.word_bits);
        let nanos = bits * 1_000_000_000 / u128::from(self.clock_hz);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}
