// src/lib.rs
//! ForceBind: force the source address of an unmodified program's sockets
//!
//! This library holds everything behind two artifacts:
//!
//! - **libforcebind.so** (`forcebind-shim` crate): preloaded into the target
//!   program, it replaces `bind` and `connect` so outgoing sockets use the
//!   address in `FORCE_BIND_IP`
//! - **forcebind**: the launcher that sets up the environment and runs the
//!   target program
//!
//! # Architecture
//!
//! The library is structured into a few modules:
//!
//! - **interception**: address handling, symbol resolution, interface
//!   checks and the `bind`/`connect` logic
//! - **runtime**: launching a command with the shim preloaded
//! - **observability**: tagged stderr logging
//! - **utils**: configuration and errors

// Public module exports
pub mod interception;
pub mod observability;
pub mod runtime;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use interception::{ForcedAddress, Interceptor, InterfaceInventory, SocketAddress};
pub use runtime::launcher::{LaunchConfig, Launcher};
pub use utils::config::ShimConfig;
pub use utils::errors::{Result, ShimError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
