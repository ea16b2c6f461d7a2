//! The binary interface between a host and its plugins.
//!
//! # Exports
//!
//! Every plugin exports three symbols:
//! - `hookwire_plugin_version(host: u32) -> VersionReply`
//! - `hookwire_plugin_register(manager: *const RawManager) -> i32`
//! - `hookwire_plugin_unregister(manager: *const RawManager) -> i32`
//!
//! [`declare_plugin!`](crate::declare_plugin) generates them.
//!
//! # Manager bridge
//!
//! The host never hands its registry to a plugin. It wraps any
//! [`HandleManager`] in a [`RawManager`], a `#[repr(C)]` context pointer plus
//! a table of `extern "C"` trampolines, which only lives for the duration of
//! [`with_raw_manager`]. Status codes from [`status`] carry failures back.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{status, RegistryError};
use crate::manager::{HandleManager, Manager};
use crate::signature::{CallbackRef, Signature};
use crate::version::{Version, VersionWindow};

/// Exported version query symbol.
pub const VERSION_SYMBOL: &str = "hookwire_plugin_version";
/// Exported register entry symbol.
pub const REGISTER_SYMBOL: &str = "hookwire_plugin_register";
/// Exported unregister entry symbol.
pub const UNREGISTER_SYMBOL: &str = "hookwire_plugin_unregister";

/// Version query: receives the host version, reports the plugin's own.
pub type VersionFn = unsafe extern "C" fn(host: u32) -> VersionReply;
/// Register and unregister entry points.
pub type EntryFn = unsafe extern "C" fn(manager: *const RawManager) -> i32;

/// Reply to the host's version query.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionReply {
    /// The plugin's API version, raw-encoded.
    pub version: u32,
    /// Whether the plugin accepts the host version it was given.
    pub accepts_host: bool,
}

impl VersionReply {
    pub fn version(&self) -> Version {
        Version::from_raw(self.version)
    }
}

/// Borrowed UTF-8 string passed by pointer and length.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StrRef {
    ptr: *const u8,
    len: usize,
}

impl StrRef {
    pub fn new(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    /// # Safety
    /// `ptr` and `len` must describe live memory for the returned lifetime.
    pub unsafe fn as_str<'a>(&self) -> Option<&'a str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }
}

/// Receives callbacks one by one during a lookup.
pub type LookupSink = unsafe extern "C" fn(out: *mut c_void, callback: CallbackRef);

/// Trampolines behind a [`RawManager`].
#[repr(C)]
pub struct ManagerVTable {
    pub register: unsafe extern "C" fn(
        ctx: *mut c_void,
        handle: StrRef,
        callback: CallbackRef,
        conflict: *mut Signature,
    ) -> i32,
    pub unregister:
        unsafe extern "C" fn(ctx: *mut c_void, handle: StrRef, callback: CallbackRef) -> i32,
    pub lookup: unsafe extern "C" fn(
        ctx: *mut c_void,
        handle: StrRef,
        out: *mut c_void,
        sink: LookupSink,
    ) -> i32,
}

/// Type-erased manager handed across the module boundary.
#[repr(C)]
pub struct RawManager {
    ctx: *mut c_void,
    vtable: *const ManagerVTable,
}

impl RawManager {
    pub(crate) fn ctx(&self) -> *mut c_void {
        self.ctx
    }

    pub(crate) fn vtable(&self) -> &ManagerVTable {
        // SAFETY: only `with_raw_manager` builds a RawManager, always with
        // the static table.
        unsafe { &*self.vtable }
    }
}

static HOST_VTABLE: ManagerVTable = ManagerVTable {
    register: host_register,
    unregister: host_unregister,
    lookup: host_lookup,
};

type ManagerSlot<'a> = &'a mut dyn HandleManager;

/// Expose `manager` as a [`RawManager`] for the duration of `f`.
pub fn with_raw_manager<R>(manager: &mut dyn HandleManager, f: impl FnOnce(&RawManager) -> R) -> R {
    let mut slot: ManagerSlot<'_> = manager;
    let raw = RawManager {
        ctx: &mut slot as *mut ManagerSlot<'_> as *mut c_void,
        vtable: &HOST_VTABLE,
    };
    f(&raw)
}

unsafe fn slot<'a>(ctx: *mut c_void) -> &'a mut ManagerSlot<'a> {
    unsafe { &mut *(ctx as *mut ManagerSlot<'a>) }
}

unsafe extern "C" fn host_register(
    ctx: *mut c_void,
    handle: StrRef,
    callback: CallbackRef,
    conflict: *mut Signature,
) -> i32 {
    let Some(handle) = (unsafe { handle.as_str() }) else {
        return status::INVALID_HANDLE;
    };
    let manager = unsafe { slot(ctx) };
    let result = catch_unwind(AssertUnwindSafe(|| manager.register(handle, callback)));
    match result {
        Ok(Ok(())) => status::OK,
        Ok(Err(err)) => {
            if let RegistryError::SignatureMismatch { expected, .. } = &err {
                if !conflict.is_null() {
                    unsafe { *conflict = *expected };
                }
            }
            err.status()
        }
        Err(_) => status::PANICKED,
    }
}

unsafe extern "C" fn host_unregister(ctx: *mut c_void, handle: StrRef, callback: CallbackRef) -> i32 {
    let Some(handle) = (unsafe { handle.as_str() }) else {
        return status::INVALID_HANDLE;
    };
    let manager = unsafe { slot(ctx) };
    match catch_unwind(AssertUnwindSafe(|| manager.unregister(handle, callback))) {
        Ok(Ok(())) => status::OK,
        Ok(Err(err)) => err.status(),
        Err(_) => status::PANICKED,
    }
}

unsafe extern "C" fn host_lookup(
    ctx: *mut c_void,
    handle: StrRef,
    out: *mut c_void,
    sink: LookupSink,
) -> i32 {
    let Some(handle) = (unsafe { handle.as_str() }) else {
        return status::INVALID_HANDLE;
    };
    let manager = unsafe { slot(ctx) };
    match catch_unwind(AssertUnwindSafe(|| manager.lookup(handle))) {
        Ok(callbacks) => {
            for callback in callbacks {
                unsafe { sink(out, callback) };
            }
            status::OK
        }
        Err(_) => status::PANICKED,
    }
}

/// Run a plugin entry point against the manager the host passed in.
///
/// Used by [`declare_plugin!`](crate::declare_plugin); panics inside `entry`
/// are reported as [`status::PANICKED`].
///
/// # Safety
/// `raw` must be null or the pointer the host passed to the entry point.
pub unsafe fn run_entry(
    raw: *const RawManager,
    entry: fn(&mut Manager<'_>) -> Result<(), RegistryError>,
) -> i32 {
    let Some(mut manager) = (unsafe { Manager::from_raw(raw) }) else {
        return status::NULL_MANAGER;
    };
    match catch_unwind(AssertUnwindSafe(|| entry(&mut manager))) {
        Ok(Ok(())) => status::OK,
        Ok(Err(err)) => err.status(),
        Err(_) => status::PANICKED,
    }
}

/// Answer the host's version query.
pub fn version_reply(host: u32, version: Version, accepts: VersionWindow) -> VersionReply {
    VersionReply {
        version: version.as_raw(),
        accepts_host: accepts.contains(Version::from_raw(host)),
    }
}
