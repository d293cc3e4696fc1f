// shim/src/exports.rs
//! Exported `bind`/`connect` symbols (Linux, LD_PRELOAD)
//!
//! Loaded ahead of libc, these definitions win symbol resolution for every
//! call the target process makes. The first call builds the process-wide
//! shim state; every call then runs the engine inside the shim's private
//! log dispatch.

use forcebind_core::interception::{
    HostInterfaces, Interceptor, InterfaceInventory, NextSymbol, RealCalls, SymbolResolver,
};
use forcebind_core::observability;
use forcebind_core::ShimConfig;
use libc::{c_int, sockaddr, socklen_t};
use once_cell::sync::OnceCell;
use tracing::{dispatcher, info, warn, Dispatch};

/// Genuine libc entry points, resolved once per process
static RESOLVER: SymbolResolver<NextSymbol> = SymbolResolver::new(NextSymbol);

static SHIM: OnceCell<Shim> = OnceCell::new();

struct Shim {
    dispatch: Dispatch,
    interceptor: Interceptor<RealCalls, HostInterfaces>,
}

impl Shim {
    fn init() -> Self {
        let (config, load_error) = match ShimConfig::load() {
            Ok(config) => (config, None),
            Err(e) => (ShimConfig::default(), Some(e)),
        };

        let dispatch = observability::shim_dispatch(config.log_filter());

        let interceptor = dispatcher::with_default(&dispatch, || {
            if let Some(e) = load_error {
                warn!("{}, forcing disabled", e);
            }

            let symbols = RESOLVER.resolve_or_exit();
            let forced = config.forced_address();
            if let Some(forced) = &forced {
                info!("Forcing outbound {} traffic from {}", forced.family(), forced);
            }

            Interceptor::new(
                forced,
                RealCalls::new(*symbols),
                InterfaceInventory::new(HostInterfaces),
            )
        });

        Self {
            dispatch,
            interceptor,
        }
    }

    fn get() -> &'static Shim {
        SHIM.get_or_init(Shim::init)
    }

    /// Run `call` inside the shim's dispatch, handing the caller the result
    /// and errno of the real call untouched.
    fn run<F>(&self, call: F) -> c_int
    where
        F: FnOnce(&Interceptor<RealCalls, HostInterfaces>) -> c_int,
    {
        let (ret, errno) = dispatcher::with_default(&self.dispatch, || {
            let ret = call(&self.interceptor);
            (ret, errno())
        });
        set_errno(errno);
        ret
    }
}

fn errno() -> c_int {
    // SAFETY: __errno_location always returns the calling thread's errno slot
    unsafe { *libc::__errno_location() }
}

fn set_errno(value: c_int) {
    // SAFETY: as above
    unsafe { *libc::__errno_location() = value }
}

/// Interposed `bind(2)`
///
/// # Safety
///
/// Same contract as libc `bind`.
#[no_mangle]
pub unsafe extern "C" fn bind(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    Shim::get().run(|interceptor| interceptor.bind(fd, addr, len))
}

/// Interposed `connect(2)`
///
/// # Safety
///
/// Same contract as libc `connect`.
#[no_mangle]
pub unsafe extern "C" fn connect(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    Shim::get().run(|interceptor| interceptor.connect(fd, addr, len))
}
