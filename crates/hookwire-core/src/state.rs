//! Per-plugin lifecycle state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PluginError;

/// Lifecycle state of a plugin module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Unloaded,
    /// Module opened, entry points not yet checked.
    Opened,
    VersionChecked,
    /// Register entry point succeeded.
    Registered,
    /// Listed in the runtime and serving callbacks.
    Active,
    /// Unregister entry point ran; the module is not yet released.
    Unregistering,
    Closed,
}

impl PluginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginState::Unloaded => "unloaded",
            PluginState::Opened => "opened",
            PluginState::VersionChecked => "version_checked",
            PluginState::Registered => "registered",
            PluginState::Active => "active",
            PluginState::Unregistering => "unregistering",
            PluginState::Closed => "closed",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub from: PluginState,
    pub to: PluginState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Validates and records lifecycle transitions.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PluginState,
    history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PluginState::Unloaded,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> PluginState {
        self.current
    }

    /// Transition to a new state.
    pub fn transition(&mut self, to: PluginState, reason: impl Into<String>) -> Result<(), PluginError> {
        Self::validate_transition(self.current, to)?;

        self.history.push(StateTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
            reason: reason.into(),
        });
        self.current = to;
        Ok(())
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    fn validate_transition(from: PluginState, to: PluginState) -> Result<(), PluginError> {
        use PluginState::*;

        match (from, to) {
            (Unloaded, Opened) => Ok(()),

            (Opened, VersionChecked) => Ok(()),
            (Opened, Closed) => Ok(()),

            (VersionChecked, Registered) => Ok(()),
            (VersionChecked, Closed) => Ok(()),

            (Registered, Active) => Ok(()),

            (Active, Unregistering) => Ok(()),

            // A failed unregister entry puts the plugin back in service.
            (Unregistering, Active) => Ok(()),
            (Unregistering, Closed) => Ok(()),

            _ => Err(PluginError::InvalidState { from, to }),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut machine = StateMachine::new();
        for state in [
            PluginState::Opened,
            PluginState::VersionChecked,
            PluginState::Registered,
            PluginState::Active,
            PluginState::Unregistering,
            PluginState::Closed,
        ] {
            machine.transition(state, state.as_str()).unwrap();
        }
        assert_eq!(machine.current(), PluginState::Closed);
        assert_eq!(machine.history().len(), 6);
        assert_eq!(machine.history()[0].from, PluginState::Unloaded);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = StateMachine::new();
        assert!(matches!(
            machine.transition(PluginState::Active, "skip"),
            Err(PluginError::InvalidState {
                from: PluginState::Unloaded,
                to: PluginState::Active
            })
        ));
        assert!(machine.history().is_empty());

        machine.transition(PluginState::Opened, "open").unwrap();
        machine.transition(PluginState::Closed, "missing symbol").unwrap();
        assert!(machine.transition(PluginState::Opened, "reopen").is_err());
    }

    #[test]
    fn test_failed_unregister_returns_to_active() {
        let mut machine = StateMachine::new();
        machine.transition(PluginState::Opened, "").unwrap();
        machine.transition(PluginState::VersionChecked, "").unwrap();
        machine.transition(PluginState::Registered, "").unwrap();
        machine.transition(PluginState::Active, "").unwrap();
        machine.transition(PluginState::Unregistering, "").unwrap();
        machine.transition(PluginState::Active, "rolled back").unwrap();
        assert_eq!(machine.current(), PluginState::Active);
    }
}
