use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HalError;

/// Number of independent device slots.
pub const DEVICE_COUNT: usize = 7;

/// Identifier of one device slot, guaranteed to be in `0..DEVICE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceId(u8);

impl DeviceId {
    /// Returns `None` for indices outside the slot range.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < DEVICE_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Array index of this slot.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every valid identifier in ascending order.
    pub fn all() -> impl Iterator<Item = DeviceId> {
        (0..DEVICE_COUNT as u8).map(DeviceId)
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = HalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(HalError::InvalidParameter("device index out of range"))
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
