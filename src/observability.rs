// src/observability.rs
//! Logging for the shim and the launcher
//!
//! Every line goes to stderr and starts with [`LOG_TAG`] so it can be told
//! apart from the target program's own output:
//!
//! ```text
//! [forcebind] INFO Intercepted IPv4 bind: Forcing IP to 192.168.1.50, port 0
//! ```
//!
//! The shim runs inside someone else's process, which may have its own
//! global subscriber, so it never installs one. It builds a private
//! [`Dispatch`] instead and scopes each intercepted call to it. The launcher
//! owns its process and installs a global subscriber.

use crate::utils::config::{DEFAULT_LOG_FILTER, FORCE_BIND_LOG_VAR};
use anyhow::{Context, Result};
use std::fmt;
use std::io;
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Prefix of every diagnostic line
pub const LOG_TAG: &str = "[forcebind]";

/// Launcher filter when `FORCE_BIND_LOG` is unset
const LAUNCHER_LOG_FILTER: &str = "warn";

/// `[forcebind] LEVEL message key=value`
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedFormat;

impl<S, N> FormatEvent<S, N> for TaggedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} {} ", LOG_TAG, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Write one tagged `ERROR` line to `writer`, bypassing every filter.
///
/// For the unrecoverable faults after which the process exits; the user's
/// `FORCE_BIND_LOG` cannot silence them.
pub fn report_fatal<W: io::Write>(mut writer: W, error: &dyn fmt::Display) -> io::Result<()> {
    writeln!(writer, "{} {} {}", LOG_TAG, Level::ERROR, error)?;
    writer.flush()
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Private dispatch writing tagged lines to `writer`
pub fn build_dispatch<W>(filter: &str, writer: W) -> Dispatch
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(TaggedFormat)
                .with_ansi(false)
                .with_writer(writer),
        )
        .with(env_filter(filter));

    Dispatch::new(subscriber)
}

/// Private dispatch used inside the target process
pub fn shim_dispatch(filter: &str) -> Dispatch {
    build_dispatch(filter, std::io::stderr)
}

/// Install the launcher's global subscriber
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env(FORCE_BIND_LOG_VAR)
        .unwrap_or_else(|_| EnvFilter::new(LAUNCHER_LOG_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(TaggedFormat)
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
