// src/test_utils.rs
//! Shared test doubles for the interception engine

use crate::interception::address::SocketAddress;
use crate::interception::engine::SocketCalls;
use crate::interception::inventory::InterfaceSource;
use crate::observability;
use crate::utils::errors::{Result, ShimError};
use libc::{c_int, sockaddr, socklen_t};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Dispatch;

/// Set the calling thread's errno
pub fn set_errno(value: c_int) {
    // SAFETY: __errno_location always returns the calling thread's errno slot
    unsafe { *libc::__errno_location() = value }
}

/// Read the calling thread's errno
pub fn errno() -> c_int {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Interface source returning a fixed list, or failing
#[derive(Clone)]
pub struct ScriptedInterfaces {
    addresses: Option<Vec<IpAddr>>,
    enumerations: Arc<AtomicUsize>,
}

impl ScriptedInterfaces {
    pub fn with(addresses: &[&str]) -> Self {
        Self {
            addresses: Some(addresses.iter().map(|a| a.parse().unwrap()).collect()),
            enumerations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            addresses: None,
            enumerations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl InterfaceSource for ScriptedInterfaces {
    fn addresses(&self) -> Result<Vec<IpAddr>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.addresses
            .clone()
            .ok_or(ShimError::InterfaceEnumeration(nix::errno::Errno::EACCES))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Bind,
    Connect,
}

/// One delegated socket call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub fd: c_int,
    /// Pointer handed to the real call, to tell caller memory from a copy
    pub ptr: *const sockaddr,
    pub len: socklen_t,
    pub addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    ret: c_int,
    errno: c_int,
}

impl Outcome {
    const OK: Outcome = Outcome { ret: 0, errno: 0 };

    fn apply(self) -> c_int {
        if self.ret != 0 {
            set_errno(self.errno);
        }
        self.ret
    }
}

/// `SocketCalls` that records every delegation and returns scripted results
pub struct RecordingCalls {
    calls: Mutex<Vec<RecordedCall>>,
    bind_outcome: Outcome,
    connect_outcome: Outcome,
}

// The recorded pointers are only compared, never dereferenced
unsafe impl Send for RecordingCalls {}
unsafe impl Sync for RecordingCalls {}

impl RecordingCalls {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            bind_outcome: Outcome::OK,
            connect_outcome: Outcome::OK,
        }
    }

    /// Real `bind` fails with `errno`
    pub fn failing_bind(mut self, errno: c_int) -> Self {
        self.bind_outcome = Outcome { ret: -1, errno };
        self
    }

    /// Real `connect` fails with `errno`
    pub fn failing_connect(mut self, errno: c_int) -> Self {
        self.connect_outcome = Outcome { ret: -1, errno };
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn binds(&self) -> Vec<RecordedCall> {
        self.of_kind(CallKind::Bind)
    }

    pub fn connects(&self) -> Vec<RecordedCall> {
        self.of_kind(CallKind::Connect)
    }

    fn of_kind(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    unsafe fn record(&self, kind: CallKind, fd: c_int, addr: *const sockaddr, len: socklen_t) {
        let call = RecordedCall {
            kind,
            fd,
            ptr: addr,
            len,
            addr: SocketAddress::read(addr, len).to_socket_addr(),
        };
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for RecordingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketCalls for RecordingCalls {
    unsafe fn bind(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        self.record(CallKind::Bind, fd, addr, len);
        self.bind_outcome.apply()
    }

    unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        self.record(CallKind::Connect, fd, addr, len);
        self.connect_outcome.apply()
    }
}

/// Log sink shared between a test and its dispatch
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Dispatch formatting like the shim's, writing into a capture buffer
pub fn capture_logs(filter: &str) -> (Dispatch, LogCapture) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let dispatch = observability::build_dispatch(filter, move || writer.clone());
    (dispatch, capture)
}
