// src/interception/address.rs
//! Address model for the interception engine
//!
//! Forced addresses arrive as text, socket addresses arrive as raw `sockaddr`
//! pointers. Both are turned into owned values here so the engine never
//! writes into caller memory and never trusts a caller length it has not
//! checked.

use crate::utils::errors::{Result, ShimError};
use libc::{sa_family_t, sockaddr, sockaddr_in, sockaddr_in6, socklen_t};
use std::fmt;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Classify address text. Anything containing a colon counts as IPv6;
    /// this is a heuristic, not a parse.
    pub fn of_text(text: &str) -> Self {
        if text.contains(':') {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        }
    }

    /// Map a raw `sa_family` value, `None` for anything but IPv4/IPv6
    pub fn from_raw(family: sa_family_t) -> Option<Self> {
        match libc::c_int::from(family) {
            libc::AF_INET => Some(AddressFamily::Ipv4),
            libc::AF_INET6 => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }

    /// Raw `sa_family` value
    pub fn raw(self) -> sa_family_t {
        match self {
            AddressFamily::Ipv4 => libc::AF_INET as sa_family_t,
            AddressFamily::Ipv6 => libc::AF_INET6 as sa_family_t,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => f.write_str("IPv4"),
            AddressFamily::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// The address outbound sockets are forced to originate from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedAddress {
    text: String,
    family: AddressFamily,
}

impl ForcedAddress {
    /// Wrap configured address text. Empty text means "no forced address".
    pub fn new(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }

        Some(Self {
            text: text.to_string(),
            family: AddressFamily::of_text(text),
        })
    }

    /// Address text exactly as configured
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Family derived from the text
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Binary IPv4 form of the address
    pub fn to_ipv4(&self) -> Result<Ipv4Addr> {
        self.text
            .parse()
            .map_err(|_| self.invalid(AddressFamily::Ipv4))
    }

    /// Binary IPv6 form of the address
    pub fn to_ipv6(&self) -> Result<Ipv6Addr> {
        self.text
            .parse()
            .map_err(|_| self.invalid(AddressFamily::Ipv6))
    }

    fn invalid(&self, family: AddressFamily) -> ShimError {
        ShimError::InvalidAddress {
            text: self.text.clone(),
            family,
        }
    }
}

impl fmt::Display for ForcedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Owned copy of a socket address passed to `bind`/`connect`
#[derive(Clone, Copy)]
pub enum SocketAddress {
    V4(sockaddr_in),
    V6(sockaddr_in6),
    /// Any other family, or an IP family whose length was too short to copy
    Unsupported(sa_family_t),
}

impl SocketAddress {
    /// Copy a caller-supplied address.
    ///
    /// # Safety
    ///
    /// `addr` must be null or point to at least `len` readable bytes.
    pub unsafe fn read(addr: *const sockaddr, len: socklen_t) -> Self {
        let len = len as usize;
        if addr.is_null() || len < mem::size_of::<sa_family_t>() {
            return SocketAddress::Unsupported(libc::AF_UNSPEC as sa_family_t);
        }

        let family = ptr::read_unaligned(ptr::addr_of!((*addr).sa_family));
        match AddressFamily::from_raw(family) {
            Some(AddressFamily::Ipv4) if len >= mem::size_of::<sockaddr_in>() => {
                SocketAddress::V4(ptr::read_unaligned(addr.cast::<sockaddr_in>()))
            }
            Some(AddressFamily::Ipv6) if len >= mem::size_of::<sockaddr_in6>() => {
                SocketAddress::V6(ptr::read_unaligned(addr.cast::<sockaddr_in6>()))
            }
            _ => SocketAddress::Unsupported(family),
        }
    }

    /// Local IPv4 address with port 0, so the kernel picks the port
    pub fn local_v4(ip: Ipv4Addr) -> Self {
        // SAFETY: sockaddr_in is plain old data, all-zero is valid
        let mut sin: sockaddr_in = unsafe { mem::zeroed() };
        sin.sin_family = AddressFamily::Ipv4.raw();
        sin.sin_port = 0;
        sin.sin_addr.s_addr = u32::from_ne_bytes(ip.octets());
        SocketAddress::V4(sin)
    }

    /// Local IPv6 address with port 0, so the kernel picks the port
    pub fn local_v6(ip: Ipv6Addr) -> Self {
        // SAFETY: sockaddr_in6 is plain old data, all-zero is valid
        let mut sin6: sockaddr_in6 = unsafe { mem::zeroed() };
        sin6.sin6_family = AddressFamily::Ipv6.raw();
        sin6.sin6_port = 0;
        sin6.sin6_addr.s6_addr = ip.octets();
        SocketAddress::V6(sin6)
    }

    /// Family of the address, `None` when unsupported
    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            SocketAddress::V4(_) => Some(AddressFamily::Ipv4),
            SocketAddress::V6(_) => Some(AddressFamily::Ipv6),
            SocketAddress::Unsupported(_) => None,
        }
    }

    /// Port in host byte order
    pub fn port(&self) -> Option<u16> {
        match self {
            SocketAddress::V4(sin) => Some(u16::from_be(sin.sin_port)),
            SocketAddress::V6(sin6) => Some(u16::from_be(sin6.sin6_port)),
            SocketAddress::Unsupported(_) => None,
        }
    }

    /// Copy with the IPv4 address replaced. Every other field, the port
    /// included, is kept as is. `None` unless this is an IPv4 address.
    pub fn with_ipv4(&self, ip: Ipv4Addr) -> Option<Self> {
        match *self {
            SocketAddress::V4(mut sin) => {
                sin.sin_addr.s_addr = u32::from_ne_bytes(ip.octets());
                Some(SocketAddress::V4(sin))
            }
            _ => None,
        }
    }

    /// Copy with the IPv6 address replaced. Port, flow info and scope id
    /// are kept as is. `None` unless this is an IPv6 address.
    pub fn with_ipv6(&self, ip: Ipv6Addr) -> Option<Self> {
        match *self {
            SocketAddress::V6(mut sin6) => {
                sin6.sin6_addr.s6_addr = ip.octets();
                Some(SocketAddress::V6(sin6))
            }
            _ => None,
        }
    }

    /// Standard library view, `None` when unsupported
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match self {
            SocketAddress::V4(sin) => Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes()),
                u16::from_be(sin.sin_port),
            ))),
            SocketAddress::V6(sin6) => Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            ))),
            SocketAddress::Unsupported(_) => None,
        }
    }

    /// Pointer for handing this copy to a real socket call. Null for
    /// unsupported addresses, which are never delegated from a copy.
    pub fn as_ptr(&self) -> *const sockaddr {
        match self {
            SocketAddress::V4(sin) => (sin as *const sockaddr_in).cast(),
            SocketAddress::V6(sin6) => (sin6 as *const sockaddr_in6).cast(),
            SocketAddress::Unsupported(_) => ptr::null(),
        }
    }

    /// Length of the structure behind [`as_ptr`](Self::as_ptr)
    pub fn socklen(&self) -> socklen_t {
        let size = match self {
            SocketAddress::V4(_) => mem::size_of::<sockaddr_in>(),
            SocketAddress::V6(_) => mem::size_of::<sockaddr_in6>(),
            SocketAddress::Unsupported(_) => 0,
        };
        size as socklen_t
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.to_socket_addr()) {
            (_, Some(addr)) => write!(f, "{}", addr),
            (SocketAddress::Unsupported(family), None) => write!(f, "unknown (family {})", family),
            _ => f.write_str("unknown"),
        }
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SocketAddress({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(ip: [u8; 4], port: u16) -> SocketAddress {
        let mut addr = SocketAddress::local_v4(Ipv4Addr::from(ip));
        if let SocketAddress::V4(sin) = &mut addr {
            sin.sin_port = port.to_be();
        }
        addr
    }

    #[test]
    fn test_family_heuristic() {
        assert_eq!(AddressFamily::of_text("192.168.1.50"), AddressFamily::Ipv4);
        assert_eq!(AddressFamily::of_text("::1"), AddressFamily::Ipv6);
        // Not a real address, still classified by the colon
        assert_eq!(AddressFamily::of_text("not:an:address"), AddressFamily::Ipv6);
        assert_eq!(AddressFamily::of_text("garbage"), AddressFamily::Ipv4);
    }

    #[test]
    fn test_forced_address_conversions() {
        let forced = ForcedAddress::new("10.1.2.3").unwrap();
        assert_eq!(forced.to_ipv4().unwrap(), Ipv4Addr::new(10, 1, 2, 3));
        assert!(forced.to_ipv6().is_err());

        let forced = ForcedAddress::new("2001:db8::7").unwrap();
        assert_eq!(forced.to_ipv6().unwrap(), "2001:db8::7".parse::<Ipv6Addr>().unwrap());

        let malformed = ForcedAddress::new("2001:db8:::zz").unwrap();
        assert!(matches!(
            malformed.to_ipv6(),
            Err(ShimError::InvalidAddress { family: AddressFamily::Ipv6, .. })
        ));
    }

    #[test]
    fn test_empty_forced_address() {
        assert!(ForcedAddress::new("").is_none());
    }

    #[test]
    fn test_read_ipv4() {
        let original = v4([0, 0, 0, 0], 8080);
        let read = unsafe { SocketAddress::read(original.as_ptr(), original.socklen()) };

        assert_eq!(read.family(), Some(AddressFamily::Ipv4));
        assert_eq!(read.to_socket_addr(), Some("0.0.0.0:8080".parse().unwrap()));
    }

    #[test]
    fn test_read_short_length_is_unsupported() {
        let original = v4([127, 0, 0, 1], 80);
        let read = unsafe { SocketAddress::read(original.as_ptr(), 4) };

        assert!(read.family().is_none());
        assert!(matches!(read, SocketAddress::Unsupported(f) if f == libc::AF_INET as sa_family_t));
    }

    #[test]
    fn test_read_null() {
        let read = unsafe { SocketAddress::read(ptr::null(), 16) };
        assert!(read.family().is_none());
    }

    #[test]
    fn test_read_unix_socket_unsupported() {
        let mut sun: libc::sockaddr_un = unsafe { mem::zeroed() };
        sun.sun_family = libc::AF_UNIX as sa_family_t;
        let read = unsafe {
            SocketAddress::read(
                (&sun as *const libc::sockaddr_un).cast(),
                mem::size_of::<libc::sockaddr_un>() as socklen_t,
            )
        };

        assert!(read.family().is_none());
        assert_eq!(read.to_string(), format!("unknown (family {})", libc::AF_UNIX));
    }

    #[test]
    fn test_rewrite_keeps_port() {
        let original = v4([0, 0, 0, 0], 4242);
        let rewritten = original.with_ipv4(Ipv4Addr::new(192, 168, 1, 50)).unwrap();

        assert_eq!(rewritten.to_socket_addr(), Some("192.168.1.50:4242".parse().unwrap()));
        assert!(original.with_ipv6(Ipv6Addr::LOCALHOST).is_none());
    }

    #[test]
    fn test_rewrite_v6_keeps_scope() {
        let mut original = SocketAddress::local_v6(Ipv6Addr::UNSPECIFIED);
        if let SocketAddress::V6(sin6) = &mut original {
            sin6.sin6_port = 443u16.to_be();
            sin6.sin6_scope_id = 3;
        }

        let rewritten = original.with_ipv6(Ipv6Addr::LOCALHOST).unwrap();
        match rewritten.to_socket_addr() {
            Some(SocketAddr::V6(addr)) => {
                assert_eq!(*addr.ip(), Ipv6Addr::LOCALHOST);
                assert_eq!(addr.port(), 443);
                assert_eq!(addr.scope_id(), 3);
            }
            other => panic!("unexpected address: {:?}", other),
        }
    }

    #[test]
    fn test_local_addresses_use_port_zero() {
        assert_eq!(SocketAddress::local_v4(Ipv4Addr::LOCALHOST).port(), Some(0));
        assert_eq!(SocketAddress::local_v6(Ipv6Addr::LOCALHOST).port(), Some(0));
        assert_eq!(
            SocketAddress::local_v6(Ipv6Addr::LOCALHOST).socklen() as usize,
            mem::size_of::<sockaddr_in6>()
        );
    }
}
