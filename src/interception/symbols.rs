// src/interception/symbols.rs
//! Resolution of the genuine libc socket calls
//!
//! The shim exports its own `bind` and `connect`, so the real ones must be
//! looked up as the *next* definition in symbol resolution order
//! (`dlsym(RTLD_NEXT, ...)`). Resolution happens once per process and the
//! resulting handle bundle is immutable afterwards.

use crate::observability;
use crate::utils::errors::{Result, ShimError};
use libc::{addrinfo, c_char, c_int, c_void, sockaddr, socklen_t};
use once_cell::sync::OnceCell;
use std::ffi::CStr;
use std::io;
use std::mem;
use std::ptr::NonNull;
use tracing::debug;

/// Signature of libc `bind`
pub type BindFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;

/// Signature of libc `connect`
pub type ConnectFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;

/// Signature of libc `getaddrinfo`
pub type GetaddrinfoFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const addrinfo,
    *mut *mut addrinfo,
) -> c_int;

// SAFETY: all three literals end in exactly one NUL
const BIND: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"bind\0") };
const CONNECT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"connect\0") };
const GETADDRINFO: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"getaddrinfo\0") };

/// Handles to the genuine implementations
#[derive(Clone, Copy)]
pub struct RealSymbols {
    pub bind: BindFn,
    pub connect: ConnectFn,
    /// Reserved; nothing routes through it yet
    pub getaddrinfo: Option<GetaddrinfoFn>,
}

/// Symbol lookup seam
pub trait SymbolLookup: Send + Sync {
    /// Address of the definition of `name` that the shim should delegate to
    fn lookup(&self, name: &CStr) -> Result<NonNull<c_void>>;
}

/// Looks up the next definition after the shim (`RTLD_NEXT`)
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSymbol;

impl SymbolLookup for NextSymbol {
    fn lookup(&self, name: &CStr) -> Result<NonNull<c_void>> {
        // SAFETY: name is NUL-terminated; dlerror is called first to clear
        // any stale error so the one reported below belongs to this lookup
        unsafe {
            libc::dlerror();
            let ptr = libc::dlsym(libc::RTLD_NEXT, name.as_ptr());
            NonNull::new(ptr).ok_or_else(|| ShimError::SymbolNotFound {
                symbol: name.to_string_lossy().into_owned(),
                reason: last_dl_error(),
            })
        }
    }
}

unsafe fn last_dl_error() -> String {
    let message = libc::dlerror();
    if message.is_null() {
        "symbol not found".to_string()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    }
}

/// Process-wide, exactly-once symbol table
pub struct SymbolResolver<L> {
    lookup: L,
    table: OnceCell<RealSymbols>,
}

impl<L: SymbolLookup> SymbolResolver<L> {
    /// Create an empty resolver; nothing is looked up until [`resolve`](Self::resolve)
    pub const fn new(lookup: L) -> Self {
        Self {
            lookup,
            table: OnceCell::new(),
        }
    }

    /// Resolved handles, looking them up on first use. Concurrent first
    /// callers block until one of them has published the table.
    pub fn resolve(&self) -> Result<&RealSymbols> {
        self.table.get_or_try_init(|| {
            let bind = self.lookup.lookup(BIND)?;
            let connect = self.lookup.lookup(CONNECT)?;
            let getaddrinfo = match self.lookup.lookup(GETADDRINFO) {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    debug!("getaddrinfo unavailable: {}", e);
                    None
                }
            };

            debug!("Resolved real bind at {:p}, connect at {:p}", bind, connect);

            // SAFETY: the pointers are the C definitions of these exact
            // symbols, whose signatures match the function types
            unsafe {
                Ok(RealSymbols {
                    bind: mem::transmute::<*mut c_void, BindFn>(bind.as_ptr()),
                    connect: mem::transmute::<*mut c_void, ConnectFn>(connect.as_ptr()),
                    getaddrinfo: getaddrinfo
                        .map(|ptr| mem::transmute::<*mut c_void, GetaddrinfoFn>(ptr.as_ptr())),
                })
            }
        })
    }

    /// Like [`resolve`](Self::resolve), but terminates the process when a
    /// required symbol is missing. The diagnostic naming the symbol goes
    /// straight to stderr, whatever the log filter says.
    pub fn resolve_or_exit(&self) -> &RealSymbols {
        match self.resolve() {
            Ok(symbols) => symbols,
            Err(e) => {
                let _ = observability::report_fatal(io::stderr().lock(), &e);
                std::process::exit(1);
            }
        }
    }

    /// Whether the table has been populated
    pub fn is_resolved(&self) -> bool {
        self.table.get().is_some()
    }
}
