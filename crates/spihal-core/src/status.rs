use serde::{Deserialize, Serialize};

/// Lifecycle state of a device slot.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceState {
    /// Never initialized, or deinitialized.
    #[default]
    Reset = 0,
    /// Initialized and idle.
    Ready = 1,
    /// One operation in flight.
    Busy = 2,
    /// Backend-defined fault state. Nothing in this crate enters it.
    Error = 3,
}

/// Snapshot of a slot's state and running counters.
///
/// Counters only grow while the slot is initialized; they saturate rather
/// than wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: DeviceState,
    /// Total bytes transmitted.
    pub tx_count: u32,
    /// Total bytes received.
    pub rx_count: u32,
    /// Total failed operations.
    pub error_count: u32,
    pub busy: bool,
}

impl DeviceStatus {
    /// Status of a freshly initialized slot.
    pub fn ready() -> Self {
        Self {
            state: DeviceState::Ready,
            ..Self::default()
        }
    }
}
