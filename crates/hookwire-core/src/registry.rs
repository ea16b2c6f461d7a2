//! Handle registry.
//!
//! Maps handle names to the ordered list of callbacks plugins attached to
//! them. Order of attachment is the order of invocation in a fold.

use std::collections::HashMap;

use hookwire_sdk::{Callable, CallbackRef, HandleManager, RegistryError, Signature, TypeTag};
use tracing::debug;

/// Callbacks attached to a single handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleEntry {
    callbacks: Vec<CallbackRef>,
}

impl HandleEntry {
    pub fn callbacks(&self) -> &[CallbackRef] {
        &self.callbacks
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn contains(&self, callback: &CallbackRef) -> bool {
        self.callbacks.iter().any(|c| c.same_target(callback))
    }

    /// Tag shared by the typed callbacks currently attached.
    pub fn signature(&self) -> Option<Signature> {
        self.callbacks
            .iter()
            .map(CallbackRef::signature)
            .find(|s| !s.is_erased())
    }
}

/// Registry of named extension points.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: HashMap<String, HandleEntry>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `callback` to `handle`, creating the entry on first use.
    pub fn register(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        self.attach(handle, callback).map(|_| ())
    }

    /// Detach the first callback on `handle` with the same target.
    ///
    /// The entry stays in place, possibly empty.
    pub fn unregister(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        self.detach(handle, callback).map(|_| ())
    }

    /// Callbacks on `handle` in attachment order; empty for unknown handles.
    pub fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        self.entries
            .get(handle)
            .map(|entry| entry.callbacks.clone())
            .unwrap_or_default()
    }

    /// Typed callbacks on `handle`.
    ///
    /// Fails with [`RegistryError::SignatureMismatch`] if any callback was
    /// registered with a different shape, or without type information.
    pub fn lookup_as<F: Callable>(&self, handle: &str) -> Result<Vec<F>, RegistryError> {
        let Some(entry) = self.entries.get(handle) else {
            return Ok(Vec::new());
        };
        entry
            .callbacks
            .iter()
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

    /// Thread `seed` through every callback on `handle` in attachment order.
    ///
    /// `apply` receives the accumulator and the next callback and returns the
    /// new accumulator. With no callbacks the seed is returned unchanged.
    pub fn fold_with<T, G>(&self, handle: &str, seed: T, mut apply: G) -> T
    where
        G: FnMut(T, &CallbackRef) -> T,
    {
        match self.entries.get(handle) {
            Some(entry) => entry
                .callbacks
                .iter()
                .fold(seed, |acc, callback| apply(acc, callback)),
            None => seed,
        }
    }

    /// Fold over `fn(T) -> T` callbacks: `fN(...f2(f1(seed)))`.
    pub fn fold<T: TypeTag + 'static>(&self, handle: &str, seed: T) -> Result<T, RegistryError> {
        let callbacks = self.lookup_as::<fn(T) -> T>(handle)?;
        Ok(callbacks.into_iter().fold(seed, |acc, f| f(acc)))
    }

    pub fn entry(&self, handle: &str) -> Option<&HandleEntry> {
        self.entries.get(handle)
    }

    /// Known handle names, sorted.
    pub fn handles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of callbacks on `handle`.
    pub fn callback_count(&self, handle: &str) -> usize {
        self.entries.get(handle).map_or(0, HandleEntry::len)
    }

    /// Whether no handle holds any callback.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HandleEntry::is_empty)
    }

    pub fn contains(&self, handle: &str, callback: &CallbackRef) -> bool {
        self.entries
            .get(handle)
            .is_some_and(|entry| entry.contains(callback))
    }

    /// Returns whether the entry was created by this call.
    pub(crate) fn attach(&mut self, handle: &str, callback: CallbackRef) -> Result<bool, RegistryError> {
        if handle.is_empty() {
            return Err(RegistryError::InvalidHandle(handle.to_string()));
        }

        let created = !self.entries.contains_key(handle);
        let entry = self.entries.entry(handle.to_string()).or_default();

        if entry.contains(&callback) {
            return Err(RegistryError::DuplicateCallback(handle.to_string()));
        }
        if let Some(expected) = entry.signature() {
            let found = callback.signature();
            if !found.is_erased() && found != expected {
                return Err(RegistryError::SignatureMismatch {
                    handle: handle.to_string(),
                    expected,
                    found,
                });
            }
        }

        entry.callbacks.push(callback);
        debug!(
            category = "plugin",
            handle,
            signature = %callback.signature(),
            callbacks = entry.callbacks.len(),
            "Callback registered"
        );
        Ok(created)
    }

    /// Returns the position the callback was removed from.
    pub(crate) fn detach(&mut self, handle: &str, callback: CallbackRef) -> Result<usize, RegistryError> {
        let entry = self
            .entries
            .get_mut(handle)
            .ok_or_else(|| RegistryError::UnknownHandle(handle.to_string()))?;
        let index = entry
            .callbacks
            .iter()
            .position(|c| c.same_target(&callback))
            .ok_or_else(|| RegistryError::CallbackNotAttached(handle.to_string()))?;

        entry.callbacks.remove(index);
        debug!(
            category = "plugin",
            handle,
            callbacks = entry.callbacks.len(),
            "Callback unregistered"
        );
        Ok(index)
    }

    /// Undo an [`attach`](Self::attach).
    pub(crate) fn discard(&mut self, handle: &str, callback: CallbackRef, created: bool) {
        if let Some(entry) = self.entries.get_mut(handle) {
            if let Some(index) = entry.callbacks.iter().position(|c| c.same_target(&callback)) {
                entry.callbacks.remove(index);
            }
            if created && entry.is_empty() {
                self.entries.remove(handle);
            }
        }
    }

    /// Undo a [`detach`](Self::detach).
    pub(crate) fn restore(&mut self, handle: &str, index: usize, callback: CallbackRef) {
        let entry = self.entries.entry(handle.to_string()).or_default();
        let index = index.min(entry.callbacks.len());
        entry.callbacks.insert(index, callback);
    }
}

impl HandleManager for HandleRegistry {
    fn register(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        HandleRegistry::register(self, handle, callback)
    }

    fn unregister(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        HandleRegistry::unregister(self, handle, callback)
    }

    fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        HandleRegistry::lookup(self, handle)
    }
}
