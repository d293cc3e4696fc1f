// src/utils/errors.rs
//! Error types shared by the shim and the launcher

use crate::interception::address::AddressFamily;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ShimError>;

/// Errors raised by forcebind
#[derive(Debug, Error)]
pub enum ShimError {
    /// The genuine implementation of a libc symbol could not be located.
    /// Inside a target process this is fatal.
    #[error("dlsym failed for {symbol}: {reason}")]
    SymbolNotFound { symbol: String, reason: String },

    /// Host interface enumeration failed
    #[error("unable to check local interfaces: {0}")]
    InterfaceEnumeration(#[source] nix::errno::Errno),

    /// Address text could not be converted to its binary form
    #[error("failed to convert {text} to {family} address")]
    InvalidAddress { text: String, family: AddressFamily },

    /// Configuration could not be loaded from the environment
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The shim shared object is missing next to the launcher
    #[error("shim library not found at {}", .0.display())]
    ShimNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
