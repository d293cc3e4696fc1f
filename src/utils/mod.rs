// src/utils/mod.rs
//! Shared utilities
//!
//! - **Config**: environment-sourced settings for the shim
//! - **Errors**: the crate-wide error type

pub mod config;
pub mod errors;

pub use config::ShimConfig;
pub use errors::{Result, ShimError};
