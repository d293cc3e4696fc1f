// src/interception/mod.rs
//! Socket interposition layer
//!
//! This module forces the source address of an unmodified program's sockets:
//!
//! - **Address**: forced-address text and owned `sockaddr` copies
//! - **Symbols**: one-time resolution of the genuine `bind`/`connect`
//! - **Inventory**: is the forced address assigned to this host?
//! - **Engine**: the `bind`/`connect` decision logic
//!
//! The `extern "C"` symbols themselves live in the `forcebind-shim` crate,
//! so that only the preloaded object ever defines `bind` and `connect`.
//!
//! # Architecture
//!
//! ```text
//! Target Program (Unmodified)
//!     │
//!     ├─ bind()    ─┐
//!     └─ connect() ─┴─► libforcebind.so ─► Interceptor ─┬─► Inventory (getifaddrs)
//!                                                       │
//!                                                       └─► RealSymbols (RTLD_NEXT)
//!                                                                │
//!                                                                ▼
//!                                                              libc
//! ```

pub mod address;
pub mod engine;
pub mod inventory;
pub mod symbols;

// Re-export commonly used types
pub use address::{AddressFamily, ForcedAddress, SocketAddress};
pub use engine::{Interceptor, RealCalls, SocketCalls};
pub use inventory::{HostInterfaces, InterfaceInventory, InterfaceSource};
pub use symbols::{NextSymbol, RealSymbols, SymbolLookup, SymbolResolver};
