// src/interception/engine.rs
//! Interception engine
//!
//! Decides, for every `bind` and `connect` the target process makes, whether
//! the source address can be forced, and then delegates exactly once to the
//! genuine call:
//!
//! ```text
//! call ─► forced address? ──no──► real call (unmodified)
//!              │yes
//!              ▼
//!         local address? ──no──► warn (bind keeps going, connect delegates)
//!              │
//!              ▼
//!         family match? ──no───► warn / skip, real call (unmodified)
//!              │yes
//!              ▼
//!   bind:    real bind with the address rewritten, port kept
//!   connect: real bind(forced, port 0), then real connect (unmodified)
//! ```
//!
//! The return value and `errno` seen by the caller are always those of the
//! last real call; the engine never makes up a result.

use crate::interception::address::{AddressFamily, ForcedAddress, SocketAddress};
use crate::interception::inventory::{InterfaceInventory, InterfaceSource};
use crate::interception::symbols::RealSymbols;
use libc::{c_int, sockaddr, socklen_t};
use std::io;
use tracing::{debug, error, info, warn};

/// Delegation seam to the genuine socket calls
pub trait SocketCalls: Send + Sync {
    /// # Safety
    ///
    /// Same contract as libc `bind`.
    unsafe fn bind(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int;

    /// # Safety
    ///
    /// Same contract as libc `connect`.
    unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int;
}

/// Socket calls backed by the resolved libc symbols
#[derive(Clone, Copy)]
pub struct RealCalls {
    symbols: RealSymbols,
}

impl RealCalls {
    pub fn new(symbols: RealSymbols) -> Self {
        Self { symbols }
    }
}

impl SocketCalls for RealCalls {
    unsafe fn bind(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        (self.symbols.bind)(fd, addr, len)
    }

    unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        (self.symbols.connect)(fd, addr, len)
    }
}

/// The `bind`/`connect` replacement logic
pub struct Interceptor<C, S> {
    forced: Option<ForcedAddress>,
    calls: C,
    inventory: InterfaceInventory<S>,
}

impl<C: SocketCalls, S: InterfaceSource> Interceptor<C, S> {
    /// Create an interceptor. `forced = None` makes every call a pass-through.
    pub fn new(forced: Option<ForcedAddress>, calls: C, inventory: InterfaceInventory<S>) -> Self {
        Self {
            forced,
            calls,
            inventory,
        }
    }

    /// Underlying socket calls
    pub fn calls(&self) -> &C {
        &self.calls
    }

    /// Replacement for `bind(2)`.
    ///
    /// A non-local forced address only produces a warning; the rewrite is
    /// still attempted and the kernel gets the final word.
    ///
    /// # Safety
    ///
    /// Same contract as libc `bind`.
    pub unsafe fn bind(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        let Some(forced) = &self.forced else {
            return self.calls.bind(fd, addr, len);
        };

        if !self.inventory.is_local(forced.text()) {
            warn_not_local(forced);
        }

        let target = SocketAddress::read(addr, len);
        match rewrite_for_bind(forced, &target) {
            Some(rewritten) => {
                info!(
                    "Intercepted {} bind: Forcing IP to {}, port {}",
                    forced.family(),
                    forced,
                    rewritten.port().unwrap_or(0)
                );
                self.calls.bind(fd, rewritten.as_ptr(), rewritten.socklen())
            }
            None => self.calls.bind(fd, addr, len),
        }
    }

    /// Replacement for `connect(2)`.
    ///
    /// Programs that never call `bind` get their source address from a
    /// pre-bind to the forced address (port 0) on the same descriptor. The
    /// destination is never rewritten and `connect` is always issued, even
    /// when the pre-bind fails.
    ///
    /// # Safety
    ///
    /// Same contract as libc `connect`.
    pub unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        let Some(forced) = &self.forced else {
            return self.calls.connect(fd, addr, len);
        };

        let destination = SocketAddress::read(addr, len);
        info!("Intercepted connect to {}", destination);

        if !self.inventory.is_local(forced.text()) {
            warn_not_local(forced);
            return self.calls.connect(fd, addr, len);
        }

        if let Some(local) = local_for_connect(forced, &destination) {
            info!("Binding to {} {} before connecting", forced.family(), forced);

            if self.calls.bind(fd, local.as_ptr(), local.socklen()) != 0 {
                let err = io::Error::last_os_error();
                warn!("Failed to bind to {}: {}", forced, err);
            }
        }

        self.calls.connect(fd, addr, len)
    }
}

fn warn_not_local(forced: &ForcedAddress) {
    warn!(
        "{} is not a local IP address. Only local IPs can be used for binding.",
        forced
    );
    warn!("Try using one of your machine's actual IP addresses.");
}

/// Rewritten copy of `target` carrying the forced address, or `None` when
/// no override applies
fn rewrite_for_bind(forced: &ForcedAddress, target: &SocketAddress) -> Option<SocketAddress> {
    let family = compatible_family(forced, target)?;

    let rewritten = match family {
        AddressFamily::Ipv4 => forced.to_ipv4().map(|ip| target.with_ipv4(ip)),
        AddressFamily::Ipv6 => forced.to_ipv6().map(|ip| target.with_ipv6(ip)),
    };

    match rewritten {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Local address to pre-bind before connecting to `destination`
fn local_for_connect(forced: &ForcedAddress, destination: &SocketAddress) -> Option<SocketAddress> {
    let family = compatible_family(forced, destination)?;

    let local = match family {
        AddressFamily::Ipv4 => forced.to_ipv4().map(SocketAddress::local_v4),
        AddressFamily::Ipv6 => forced.to_ipv6().map(SocketAddress::local_v6),
    };

    match local {
        Ok(addr) => Some(addr),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Shared family of the forced address and the socket address, if any
fn compatible_family(forced: &ForcedAddress, socket: &SocketAddress) -> Option<AddressFamily> {
    let Some(family) = socket.family() else {
        debug!("Unsupported address family ({}), not overriding", socket);
        return None;
    };

    if family != forced.family() {
        warn!(
            "IP family mismatch. Socket is {} but forced IP {} is {}",
            family,
            forced,
            forced.family()
        );
        return None;
    }

    Some(family)
}
