// src/runtime/launcher.rs
//! Launcher for running a command under the shim
//!
//! Locates `libforcebind.so` next to the running executable, then spawns the
//! target command with:
//! - `LD_PRELOAD` pointing at the shim (absolute path)
//! - `FORCE_BIND_IP` set to the requested address
//! - stdin, stdout and stderr inherited

use crate::utils::config::FORCE_BIND_IP_VAR;
use crate::utils::errors::{Result, ShimError};
use std::net::IpAddr;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

/// File name of the shim shared object
pub const SHIM_FILE_NAME: &str = "libforcebind.so";

/// Dynamic linker preload variable
pub const PRELOAD_VAR: &str = "LD_PRELOAD";

/// What to run and which address to force
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Forced source address, passed through verbatim
    pub ip: String,

    /// Command to run
    pub command: String,

    /// Arguments for the command
    pub args: Vec<String>,
}

/// Spawns commands with the shim preloaded
#[derive(Debug, Clone)]
pub struct Launcher {
    shim_path: PathBuf,
}

impl Launcher {
    /// Find the shim next to the current executable
    pub fn locate() -> Result<Self> {
        let exe = std::env::current_exe()?;
        Self::beside(&exe)
    }

    /// Find the shim in the directory holding `exe`
    pub fn beside(exe: &Path) -> Result<Self> {
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        let candidate = dir.join(SHIM_FILE_NAME);

        if !candidate.is_file() {
            return Err(ShimError::ShimNotFound(candidate));
        }

        // LD_PRELOAD is resolved from the child's working directory, which
        // need not be ours
        let shim_path = candidate.canonicalize()?;
        debug!("Using shim at {:?}", shim_path);

        Ok(Self { shim_path })
    }

    /// Absolute path of the shim
    pub fn shim_path(&self) -> &Path {
        &self.shim_path
    }

    /// Environment the child needs. An existing preload list is kept,
    /// after the shim.
    pub fn env_vars(&self, ip: &str, existing_preload: Option<&str>) -> Vec<(String, String)> {
        let shim = self.shim_path.to_string_lossy();
        let preload = match existing_preload.filter(|p| !p.is_empty()) {
            Some(existing) => format!("{}:{}", shim, existing),
            None => shim.into_owned(),
        };

        vec![
            (PRELOAD_VAR.to_string(), preload),
            (FORCE_BIND_IP_VAR.to_string(), ip.to_string()),
        ]
    }

    /// Run the command to completion
    pub async fn run(&self, config: &LaunchConfig) -> Result<ExitStatus> {
        if config.ip.parse::<IpAddr>().is_err() {
            warn!("{} does not look like an IP address", config.ip);
        }

        let existing = std::env::var(PRELOAD_VAR).ok();
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(self.env_vars(&config.ip, existing.as_deref()))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = command.spawn()?;
        debug!("Spawned {} with PID {:?}", config.command, child.id());

        // Ctrl-C reaches the whole foreground process group; the child
        // decides what to do with it and we report whatever status it ends with
        loop {
            tokio::select! {
                status = child.wait() => return Ok(status?),
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    debug!("Interrupt received, waiting for {}", config.command);
                }
            }
        }
    }
}

/// Exit code mirroring the child's: its own code, or `128 + signal`
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
