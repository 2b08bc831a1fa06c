use std::time::Duration;

use thiserror::Error;

use crate::credential::CredentialError;

/// Failure reported by a cloud API or settings store call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),
}

/// Coarse classification of an [`AttackError`], mirroring how operators
/// should react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request; nothing was touched.
    Validation,
    /// A name or resource could not be resolved; nothing was touched.
    Resolution,
    /// A cloud call failed mid-sequence.
    Remote,
    /// Cleanup after a failure did not complete; manual intervention needed.
    Cleanup,
}

/// Error type of the attack lifecycle contract.
#[derive(Debug, Error)]
pub enum AttackError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Resolution(String),

    #[error("failed to acquire cloud credentials: {0}")]
    Credential(#[from] CredentialError),

    #[error("failed to create {client} client: {source}")]
    ClientConstruction {
        client: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: RemoteError,
    },

    #[error("{context} did not complete within {}s", waited.as_secs())]
    Timeout { context: String, waited: Duration },

    #[error("no free security rule priority between {base} and {max}")]
    PriorityExhausted { base: u16, max: u16 },

    #[error("{cause}; all {rolled_back} security rules created so far were removed again")]
    RolledBack {
        cause: Box<AttackError>,
        rolled_back: usize,
    },

    #[error("{cause}; additionally failed to clean up security rules: {cleanup}")]
    CleanupFailed {
        cause: Box<AttackError>,
        cleanup: Box<AttackError>,
        remaining: Vec<String>,
    },

    #[error("unknown execution {0}")]
    UnknownExecution(String),

    #[error("state of execution {0} does not belong to action {1}")]
    StateMismatch(String, String),
}

impl AttackError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttackError::Validation(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        AttackError::Resolution(message.into())
    }

    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        AttackError::Remote {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AttackError::Validation(_)
            | AttackError::UnknownExecution(_)
            | AttackError::StateMismatch(..) => ErrorKind::Validation,
            AttackError::Resolution(_) => ErrorKind::Resolution,
            AttackError::CleanupFailed { .. } => ErrorKind::Cleanup,
            AttackError::Credential(_)
            | AttackError::ClientConstruction { .. }
            | AttackError::Remote { .. }
            | AttackError::Timeout { .. }
            | AttackError::PriorityExhausted { .. }
            | AttackError::RolledBack { .. } => ErrorKind::Remote,
        }
    }
}
