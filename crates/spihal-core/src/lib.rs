//! Uniform SPI-style operations over a swappable backend.
//!
//! Application code talks to one [`SpiHal`] context. The context holds
//! exactly one registered [`Backend`] and forwards the seven operations to it
//! after validating the device index and buffer arguments. Backends keep one
//! session per device slot in a [`SessionStore`], which enforces the
//! Reset → Ready → Busy → Ready lifecycle.
//!
//! # Crate Structure
//!
//! - [`device`] — validated device identifiers (slots 0-6)
//! - [`config`] — clock/mode/bit order/word width configuration
//! - [`status`] — lifecycle state and running counters
//! - [`store`] — per-slot session records with the busy guard
//! - [`backend`] — the seven-operation backend contract
//! - [`dispatch`] — the validating dispatch context
//! - [`sim`] — in-memory loopback backend

pub mod backend;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod sim;
pub mod status;
pub mod store;

pub use backend::{Backend, BackendKind};
pub use config::{BitOrder, SpiConfig, SpiMode, CONFIG_WIRE_SIZE};
pub use device::{DeviceId, DEVICE_COUNT};
pub use dispatch::{SpiHal, MAX_TRANSFER};
pub use error::{HalError, Result};
pub use sim::{SimBackend, LOOPBACK_CAPACITY};
pub use status::{DeviceState, DeviceStatus};
pub use store::{Operation, SessionStore};
