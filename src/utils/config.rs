// src/utils/config.rs
//! Shim configuration
//!
//! The launcher hands settings to the shim through the environment:
//!
//! - `FORCE_BIND_IP`: address outbound sockets should originate from
//! - `FORCE_BIND_LOG`: filter directive for shim diagnostics (default `info`)
//!
//! The shim reads them once, on the first intercepted call, and passes the
//! resulting value into the interception engine.

use crate::interception::address::ForcedAddress;
use crate::utils::errors::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// Prefix shared by every forcebind environment variable
pub const ENV_PREFIX: &str = "FORCE_BIND";

/// Variable carrying the forced source address
pub const FORCE_BIND_IP_VAR: &str = "FORCE_BIND_IP";

/// Variable carrying the diagnostics filter
pub const FORCE_BIND_LOG_VAR: &str = "FORCE_BIND_LOG";

/// Filter applied to shim diagnostics when none is configured
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Settings read by the shim inside the target process
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShimConfig {
    /// Forced source address (`FORCE_BIND_IP`)
    #[serde(default)]
    pub ip: Option<String>,

    /// Diagnostics filter (`FORCE_BIND_LOG`)
    #[serde(default)]
    pub log: Option<String>,
}

impl ShimConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit set of variables instead of the process
    /// environment. Keys use the full variable names, e.g. `FORCE_BIND_IP`.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self::from_environment(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let config = Config::builder().add_source(env).build()?;
        Ok(config.try_deserialize()?)
    }

    /// The forced address, or `None` when interception is a pass-through
    pub fn forced_address(&self) -> Option<ForcedAddress> {
        self.ip.as_deref().and_then(ForcedAddress::new)
    }

    /// Filter directive for shim diagnostics
    pub fn log_filter(&self) -> &str {
        self.log
            .as_deref()
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}
