// shim/src/lib.rs
//! ForceBind preload object
//!
//! Builds `libforcebind.so`. The launcher puts it in `LD_PRELOAD`, where its
//! `bind` and `connect` shadow libc's for the whole target process. All of
//! the decision logic lives in `forcebind_core::interception`; this crate
//! only owns the exported symbols and the process-wide state behind them.
//!
//! Kept separate from `forcebind_core` so the launcher and anything else
//! linking the core library keep libc's own `bind` and `connect`.

// The crate's own unit-test binary must keep the real libc symbols
#[cfg(all(target_os = "linux", not(test)))]
pub mod exports;
