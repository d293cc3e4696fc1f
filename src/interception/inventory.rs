// src/interception/inventory.rs
//! Interface inventory
//!
//! Answers "is this address currently assigned to the host?" by enumerating
//! interface addresses on every call. Nothing is cached: addresses come and
//! go while the target process runs (DHCP renewal, VPN up/down).

use crate::utils::errors::{Result, ShimError};
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use tracing::{debug, warn};

/// Addresses accepted without enumerating
pub const LOOPBACK_LITERALS: [&str; 2] = ["127.0.0.1", "::1"];

/// Source of the host's interface addresses
pub trait InterfaceSource: Send + Sync {
    /// Every IPv4/IPv6 address currently assigned to a local interface
    fn addresses(&self) -> Result<Vec<IpAddr>>;
}

/// Reads interface addresses with `getifaddrs(3)`
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInterfaces;

impl InterfaceSource for HostInterfaces {
    fn addresses(&self) -> Result<Vec<IpAddr>> {
        let interfaces = nix::ifaddrs::getifaddrs().map_err(ShimError::InterfaceEnumeration)?;

        let addresses = interfaces
            .filter_map(|ifa| ifa.address)
            .filter_map(|storage| {
                if let Some(sin) = storage.as_sockaddr_in() {
                    Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()))
                } else {
                    storage
                        .as_sockaddr_in6()
                        .map(|sin6| IpAddr::V6(*SocketAddrV6::from(*sin6).ip()))
                }
            })
            .collect();

        Ok(addresses)
    }
}

/// Validates forced addresses against the host's interfaces
pub struct InterfaceInventory<S> {
    source: S,
}

impl<S: InterfaceSource> InterfaceInventory<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Whether `address` is usable as a local bind source.
    ///
    /// Loopback literals are always local. Otherwise the text must equal the
    /// textual form of an interface address, minus any `%zone` suffix.
    /// When enumeration itself fails the answer is `true`: a transient host
    /// error must not silently disable forcing the user asked for.
    pub fn is_local(&self, address: &str) -> bool {
        if LOOPBACK_LITERALS.contains(&address) {
            return true;
        }

        match self.source.addresses() {
            Ok(addresses) => {
                let found = addresses
                    .iter()
                    .any(|ip| strip_zone(&ip.to_string()) == address);
                debug!(
                    "{} {} among {} interface addresses",
                    address,
                    if found { "found" } else { "not found" },
                    addresses.len()
                );
                found
            }
            Err(e) => {
                warn!("{}", e);
                true
            }
        }
    }
}

/// Drop an IPv6 zone index (`fe80::1%eth0` -> `fe80::1`)
pub fn strip_zone(text: &str) -> &str {
    match text.find('%') {
        Some(idx) => &text[..idx],
        None => text,
    }
}
