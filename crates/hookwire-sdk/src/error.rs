//! Registry error types and their ABI status codes.

use crate::signature::Signature;

/// Status codes returned across the plugin boundary.
pub mod status {
    pub const OK: i32 = 0;
    pub const INVALID_HANDLE: i32 = 1;
    pub const DUPLICATE_CALLBACK: i32 = 2;
    pub const CALLBACK_NOT_ATTACHED: i32 = 3;
    pub const UNKNOWN_HANDLE: i32 = 4;
    pub const SIGNATURE_MISMATCH: i32 = 5;
    /// The manager pointer handed to an entry point was null.
    pub const NULL_MANAGER: i32 = 64;
    /// Code on the far side of the boundary panicked.
    pub const PANICKED: i32 = 65;
}

/// Violations of the handle registry's invariants.
///
/// These indicate a bug in host or plugin code, not an environmental failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid handle name: {0:?}")]
    InvalidHandle(String),

    #[error("Callback already attached to handle: {0}")]
    DuplicateCallback(String),

    #[error("Callback not attached to handle: {0}")]
    CallbackNotAttached(String),

    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    #[error("Signature mismatch on handle {handle}: expected {expected}, found {found}")]
    SignatureMismatch {
        handle: String,
        expected: Signature,
        found: Signature,
    },

    #[error("Request on handle {handle} failed with status {code}")]
    Status { handle: String, code: i32 },
}

impl RegistryError {
    /// Status code carried across the ABI for this error.
    pub fn status(&self) -> i32 {
        match self {
            RegistryError::InvalidHandle(_) => status::INVALID_HANDLE,
            RegistryError::DuplicateCallback(_) => status::DUPLICATE_CALLBACK,
            RegistryError::CallbackNotAttached(_) => status::CALLBACK_NOT_ATTACHED,
            RegistryError::UnknownHandle(_) => status::UNKNOWN_HANDLE,
            RegistryError::SignatureMismatch { .. } => status::SIGNATURE_MISMATCH,
            RegistryError::Status { code, .. } => *code,
        }
    }

    /// The handle the failed request targeted.
    pub fn handle(&self) -> &str {
        match self {
            RegistryError::InvalidHandle(handle)
            | RegistryError::DuplicateCallback(handle)
            | RegistryError::CallbackNotAttached(handle)
            | RegistryError::UnknownHandle(handle)
            | RegistryError::SignatureMismatch { handle, .. }
            | RegistryError::Status { handle, .. } => handle,
        }
    }

    /// Rebuild an error from a status code on the plugin side.
    ///
    /// `expected` and `found` fill in a signature mismatch; they are ignored
    /// for other codes. Returns `Ok(())` for [`status::OK`].
    pub fn check(
        code: i32,
        handle: &str,
        expected: Signature,
        found: Signature,
    ) -> Result<(), RegistryError> {
        let handle = handle.to_string();
        match code {
            status::OK => Ok(()),
            status::INVALID_HANDLE => Err(RegistryError::InvalidHandle(handle)),
            status::DUPLICATE_CALLBACK => Err(RegistryError::DuplicateCallback(handle)),
            status::CALLBACK_NOT_ATTACHED => Err(RegistryError::CallbackNotAttached(handle)),
            status::UNKNOWN_HANDLE => Err(RegistryError::UnknownHandle(handle)),
            status::SIGNATURE_MISMATCH => Err(RegistryError::SignatureMismatch {
                handle,
                expected,
                found,
            }),
            code => Err(RegistryError::Status { handle, code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::DuplicateCallback("seedGeneration".to_string());
        assert_eq!(
            err.to_string(),
            "Callback already attached to handle: seedGeneration"
        );
    }

    #[test]
    fn test_status_roundtrip() {
        let sig = Signature::of::<fn(i32) -> i32>();
        let errors = [
            RegistryError::InvalidHandle(String::new()),
            RegistryError::DuplicateCallback("h".into()),
            RegistryError::CallbackNotAttached("h".into()),
            RegistryError::UnknownHandle("h".into()),
            RegistryError::Status {
                handle: "h".into(),
                code: status::PANICKED,
            },
        ];
        for err in errors {
            let rebuilt = RegistryError::check(err.status(), err.handle(), sig, sig).unwrap_err();
            assert_eq!(rebuilt, err);
        }
        assert!(RegistryError::check(status::OK, "h", sig, sig).is_ok());
    }
}
