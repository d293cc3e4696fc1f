// src/runtime/mod.rs
//! Running programs under the shim
//!
//! ```text
//! forcebind <IP> <command> [args...]
//!     │
//!     ├─ locate libforcebind.so beside the executable
//!     ├─ LD_PRELOAD=<shim>  FORCE_BIND_IP=<IP>
//!     └─ spawn, wait, exit with the child's code
//! ```

pub mod launcher;

// Re-export commonly used types
pub use launcher::{exit_code, LaunchConfig, Launcher};
