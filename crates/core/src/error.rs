//! Error types for the demarc transaction runtime
//!
//! All public operations return [`TransactionError`] through the [`Result`]
//! alias. The variants distinguish the cases callers genuinely react to
//! differently:
//!
//! - **IllegalState**: propagation rules violated (`never` with an existing
//!   transaction, `mandatory` without one, commit/rollback after completion).
//! - **NestedNotSupported**: a nested transaction was requested but the
//!   engine or the resource manager cannot honor it.
//! - **SuspensionNotSupported**: propagation requires suspending the current
//!   transaction but the resource manager cannot suspend.
//! - **InvalidTimeout**: timeout below the permitted minimum.
//! - **UnexpectedRollback**: commit could not proceed because the transaction
//!   was globally marked rollback-only.
//! - **System**: the resource manager itself failed (begin/commit/rollback).
//! - **Usage**: API misuse, such as releasing a savepoint that is not held.
//!
//! `UnexpectedRollback` is the one variant with control-flow significance
//! inside the engine; everything else is reported as-is to the caller.

use thiserror::Error;

/// Result type alias for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Error type for all transaction runtime operations
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A propagation rule or lifecycle rule was violated.
    #[error("illegal transaction state: {message}")]
    IllegalState {
        /// What was violated
        message: String,
    },

    /// A nested transaction was requested but cannot be honored.
    #[error("nested transaction not supported: {message}")]
    NestedNotSupported {
        /// Why nesting is unavailable
        message: String,
    },

    /// Suspension was required but the resource manager cannot suspend.
    #[error("transaction suspension not supported: {message}")]
    SuspensionNotSupported {
        /// Why suspension is unavailable
        message: String,
    },

    /// The definition carried a timeout below the permitted minimum.
    #[error("invalid transaction timeout: {seconds}")]
    InvalidTimeout {
        /// The rejected timeout value
        seconds: i32,
    },

    /// Commit was silently turned into a rollback.
    ///
    /// Raised at the outermost transaction boundary when the transaction was
    /// globally marked rollback-only, or earlier when the engine is
    /// configured to fail early.
    #[error("unexpected rollback: {message}")]
    UnexpectedRollback {
        /// Why the transaction rolled back
        message: String,
    },

    /// The resource manager failed while executing a transactional operation.
    #[error("transaction system failure: {message}")]
    System {
        /// What failed
        message: String,
        /// Underlying resource-manager error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The API was used incorrectly.
    #[error("transaction usage error: {message}")]
    Usage {
        /// What was misused
        message: String,
    },
}

impl TransactionError {
    /// Create an `IllegalState` error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        TransactionError::IllegalState {
            message: message.into(),
        }
    }

    /// Create a `NestedNotSupported` error.
    pub fn nested_not_supported(message: impl Into<String>) -> Self {
        TransactionError::NestedNotSupported {
            message: message.into(),
        }
    }

    /// Create a `SuspensionNotSupported` error.
    pub fn suspension_not_supported(message: impl Into<String>) -> Self {
        TransactionError::SuspensionNotSupported {
            message: message.into(),
        }
    }

    /// Create an `InvalidTimeout` error.
    pub fn invalid_timeout(seconds: i32) -> Self {
        TransactionError::InvalidTimeout { seconds }
    }

    /// Create an `UnexpectedRollback` error.
    pub fn unexpected_rollback(message: impl Into<String>) -> Self {
        TransactionError::UnexpectedRollback {
            message: message.into(),
        }
    }

    /// Create a `System` error without an underlying source.
    pub fn system(message: impl Into<String>) -> Self {
        TransactionError::System {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `System` error wrapping an underlying resource-manager error.
    pub fn system_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TransactionError::System {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Usage` error.
    pub fn usage(message: impl Into<String>) -> Self {
        TransactionError::Usage {
            message: message.into(),
        }
    }

    /// Whether this error reports a propagation or lifecycle violation.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, TransactionError::IllegalState { .. })
    }

    /// Whether this error reports a silent rollback of a commit attempt.
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, TransactionError::UnexpectedRollback { .. })
    }

    /// Whether this error originated in the resource manager.
    pub fn is_system(&self) -> bool {
        matches!(self, TransactionError::System { .. })
    }

    /// Whether this error reports API misuse.
    pub fn is_usage(&self) -> bool {
        matches!(self, TransactionError::Usage { .. })
    }
}
