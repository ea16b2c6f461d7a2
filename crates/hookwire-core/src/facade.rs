//! Host implementation of the plugin-facing manager.
//!
//! A [`RegistryFacade`] is built fresh around the registry for each entry
//! point call. It records every change a plugin makes so the runtime can
//! attribute callbacks to their plugin and undo a failed call exactly.

use hookwire_sdk::{CallbackRef, HandleManager, RegistryError};

use crate::registry::HandleRegistry;

/// A registry change made through the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Registered {
        handle: String,
        callback: CallbackRef,
        created: bool,
    },
    Unregistered {
        handle: String,
        callback: CallbackRef,
        index: usize,
    },
}

/// Journaling [`HandleManager`] over a borrowed [`HandleRegistry`].
pub struct RegistryFacade<'a> {
    registry: &'a mut HandleRegistry,
    journal: Vec<Change>,
    first_error: Option<RegistryError>,
}

impl<'a> RegistryFacade<'a> {
    pub fn new(registry: &'a mut HandleRegistry) -> Self {
        Self {
            registry,
            journal: Vec::new(),
            first_error: None,
        }
    }

    /// Changes applied so far, oldest first.
    pub fn journal(&self) -> &[Change] {
        &self.journal
    }

    /// The first request the registry refused, if any.
    pub fn first_error(&self) -> Option<&RegistryError> {
        self.first_error.as_ref()
    }

    /// Consume the facade, keeping its changes.
    pub fn commit(self) -> Vec<Change> {
        self.journal
    }

    /// Consume the facade, reverting every change it applied.
    pub fn rollback(self) {
        let RegistryFacade {
            registry, journal, ..
        } = self;
        for change in journal.into_iter().rev() {
            match change {
                Change::Registered {
                    handle,
                    callback,
                    created,
                } => registry.discard(&handle, callback, created),
                Change::Unregistered {
                    handle,
                    callback,
                    index,
                } => registry.restore(&handle, index, callback),
            }
        }
    }

    fn record_error(&mut self, err: &RegistryError) {
        if self.first_error.is_none() {
            self.first_error = Some(err.clone());
        }
    }
}

impl HandleManager for RegistryFacade<'_> {
    fn register(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        match self.registry.attach(handle, callback) {
            Ok(created) => {
                self.journal.push(Change::Registered {
                    handle: handle.to_string(),
                    callback,
                    created,
                });
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    fn unregister(&mut self, handle: &str, callback: CallbackRef) -> Result<(), RegistryError> {
        match self.registry.detach(handle, callback) {
            Ok(index) => {
                self.journal.push(Change::Unregistered {
                    handle: handle.to_string(),
                    callback,
                    index,
                });
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        self.registry.lookup(handle)
    }
}
