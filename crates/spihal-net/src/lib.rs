//! Network backend for spihal.
//!
//! [`SocketBackend`] turns the seven SPI operations into framed requests
//! against a remote peer, one TCP connection per device slot. Requests carry
//! a per-slot sequence number; each data operation then blocks for one reply
//! frame under the caller's timeout.
//!
//! | operation    | request payload         | waits for reply |
//! |--------------|-------------------------|-----------------|
//! | `init`       | 7-byte config           | no              |
//! | `deinit`     | empty                   | no              |
//! | `transfer`   | tx bytes                | yes, same length |
//! | `send`       | data bytes              | yes, any length |
//! | `receive`    | requested length, u16 BE | yes, up to requested |
//! | `set_config` | 7-byte config           | no              |
//! | `status`     | not sent                | no              |

pub mod backend;
pub mod config;
pub mod error;
mod session;

pub use backend::SocketBackend;
pub use config::{EndpointSource, RetryPolicy, SocketConfig};
pub use error::{NetError, Result};
