//! SPI hardware abstraction with a swappable backend.
//!
//! Application code talks to a [`SpiHal`] context; the backend behind it is
//! chosen when the crate is built:
//!
//! | features          | [`init`] registers        | implementation name |
//! |-------------------|---------------------------|---------------------|
//! | none              | [`SimBackend`]            | `Simulation`        |
//! | `socket`          | `net::SocketBackend`      | `Socket`            |
//! | `stm32` / `rh850` | nothing, supplied over FFI | `STM32-Nucleo` / `RH850` |
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP endpoint resolution and connections
//! - [`frame`] — the 8-byte-header wire protocol
//! - [`net`] — the network backend (behind `socket` feature)
//!
//! Core types (device ids, configuration, status, the [`Backend`] trait and
//! [`SpiHal`]) are re-exported at the crate root.

use tracing::{info, warn};

pub use spihal_core::*;

/// Re-export transport types.
pub mod transport {
    pub use spihal_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spihal_frame::*;
}

/// Re-export network backend types (requires `socket` feature).
#[cfg(feature = "socket")]
pub mod net {
    pub use spihal_net::*;
}

/// Backend family selected by this build's features.
///
/// Precedence when several are enabled: `stm32`, `rh850`, `socket`, then
/// simulation.
pub const BUILD_KIND: BackendKind = if cfg!(feature = "stm32") {
    BackendKind::Stm32
} else if cfg!(feature = "rh850") {
    BackendKind::Rh850
} else if cfg!(feature = "socket") {
    BackendKind::Network
} else {
    BackendKind::Simulated
};

/// A fresh instance of the built-in backend for [`BUILD_KIND`], if this
/// crate provides one.
pub fn builtin_backend() -> Option<Box<dyn Backend>> {
    match BUILD_KIND {
        BackendKind::Simulated => Some(Box::new(SimBackend::new())),
        #[cfg(feature = "socket")]
        BackendKind::Network => Some(Box::new(spihal_net::SocketBackend::default())),
        _ => None,
    }
}

/// Register the build-selected backend with `hal`.
///
/// Peripheral targets have no built-in backend; for them this succeeds only
/// if a backend was already registered, and otherwise reports
/// [`HalError::NotInitialized`].
pub fn init(hal: &mut SpiHal) -> Result<()> {
    match builtin_backend() {
        Some(backend) => {
            hal.register_boxed(backend);
            info!(implementation = BUILD_KIND.name(), "HAL initialized");
            Ok(())
        }
        None if hal.is_registered() => {
            info!(implementation = BUILD_KIND.name(), "HAL initialized with external backend");
            Ok(())
        }
        None => {
            warn!(
                implementation = BUILD_KIND.name(),
                "no built-in backend for this target; register one before init"
            );
            Err(HalError::NotInitialized)
        }
    }
}

/// A context with the build-selected backend already registered.
pub fn context() -> Result<SpiHal> {
    let mut hal = SpiHal::new();
    init(&mut hal)?;
    Ok(hal)
}
