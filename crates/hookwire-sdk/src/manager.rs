//! The manager interface plugins register their callbacks through.

use std::ffi::c_void;

use crate::abi::{RawManager, StrRef};
use crate::error::{status, RegistryError};
use crate::signature::{Callable, CallbackRef, Signature};

/// Narrow registry interface exposed to plugins.
///
/// The host implements it over its handle registry; plugins receive a
/// [`Manager`] that forwards every call across the module boundary.
pub trait HandleManager {
    /// Attach `callback` to `handle`, creating the handle on first use.
    fn register(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError>;

    /// Detach a previously attached `callback` from `handle`.
    fn unregister(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError>;

    /// Callbacks attached to `handle`, in attachment order.
    fn lookup(&self, handle: &str) -> Vec<CallbackRef>;
}

/// Typed helpers over any [`HandleManager`].
pub trait HandleManagerExt: HandleManager {
    fn register_fn<F: Callable>(&mut self, handle: &str, function: F) -> Result<(), RegistryError> {
        self.register(handle, CallbackRef::of(function))
    }

    fn unregister_fn<F: Callable>(&mut self, handle: &str, function: F) -> Result<(), RegistryError> {
        self.unregister(handle, CallbackRef::of(function))
    }

    /// Typed callbacks on `handle`. Fails if any of them has another shape.
    fn lookup_fn<F: Callable>(&self, handle: &str) -> Result<Vec<F>, RegistryError> {
        self.lookup(handle)
            .into_iter()
            .map(|callback| {
                callback
                    .typed::<F>()
                    .ok_or_else(|| RegistryError::SignatureMismatch {
                        handle: handle.to_string(),
                        expected: F::SIGNATURE,
                        found: callback.signature(),
                    })
            })
            .collect()
    }
}

impl<M: HandleManager + ?Sized> HandleManagerExt for M {}

/// Plugin-side view of the host's manager.
///
/// Only valid inside the entry point it was handed to.
pub struct Manager<'a> {
    raw: &'a RawManager,
}

impl<'a> Manager<'a> {
    /// # Safety
    /// `raw` must be null or point to a live [`RawManager`] built by the host.
    pub unsafe fn from_raw(raw: *const RawManager) -> Option<Manager<'a>> {
        unsafe { raw.as_ref() }.map(|raw| Manager { raw })
    }
}

unsafe extern "C" fn collect(out: *mut c_void, callback: CallbackRef) {
    let out = unsafe { &mut *(out as *mut Vec<CallbackRef>) };
    out.push(callback);
}

impl HandleManager for Manager<'_> {
    fn register(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        let mut conflict = Signature::ERASED;
        let code = unsafe {
            (self.raw.vtable().register)(
                self.raw.ctx(),
                StrRef::new(handle),
                callback,
                &mut conflict,
            )
        };
        RegistryError::check(code, handle, conflict, callback.signature())
    }

    fn unregister(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        let code =
            unsafe { (self.raw.vtable().unregister)(self.raw.ctx(), StrRef::new(handle), callback) };
        RegistryError::check(code, handle, Signature::ERASED, callback.signature())
    }

    /// A lookup the host fails to answer (a non-OK status, such as
    /// [`status::PANICKED`]) reads as an empty handle.
    fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        let mut found: Vec<CallbackRef> = Vec::new();
        let code = unsafe {
            (self.raw.vtable().lookup)(
                self.raw.ctx(),
                StrRef::new(handle),
                &mut found as *mut Vec<CallbackRef> as *mut c_void,
                collect,
            )
        };
        if code != status::OK {
            found.clear();
        }
        found
    }
}
