// src/main.rs
//! ForceBind launcher
//!
//! Runs a command with `libforcebind.so` preloaded so its outgoing sockets
//! use the given source address.

use clap::Parser;
use forcebind_core::observability::init_tracing;
use forcebind_core::runtime::{exit_code, LaunchConfig, Launcher};
use std::process;
use tracing::{debug, error};

const USAGE: &str = "\
ForceBind: force the source address of a program's sockets
Usage:
  forcebind <IP_ADDRESS> <COMMAND> [ARGS...]

Example:
  forcebind 192.168.1.100 curl example.com
  forcebind 2001:db8::10 curl -6 example.com

Notes:
  - You must use an IP address that exists on one of your network interfaces
  - To see your available IP addresses, run: ip addr
  - IPv4 and IPv6 addresses are supported; sockets of the other family are left alone

Environment:
  LD_PRELOAD      Path to libforcebind.so (set automatically)
  FORCE_BIND_IP   IP address to force bind (set automatically)
  FORCE_BIND_LOG  Log filter, e.g. debug (default: info in the shim, warn here)
";

#[derive(Parser, Debug)]
#[command(name = "forcebind")]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Source address to force
    ip: String,

    /// Command to run and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    fn into_launch_config(self) -> LaunchConfig {
        let mut command = self.command.into_iter();
        LaunchConfig {
            ip: self.ip,
            command: command.next().unwrap_or_default(),
            args: command.collect(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) => {
            print!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
    }

    let launcher = match Launcher::locate() {
        Ok(launcher) => launcher,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let config = cli.into_launch_config();
    match launcher.run(&config).await {
        Ok(status) => {
            debug!("{} exited with {}", config.command, status);
            process::exit(exit_code(status));
        }
        Err(e) => {
            error!("Error running command: {}", e);
            process::exit(1);
        }
    }
}
