//! Transaction synchronization contract
//!
//! Participants that need to cooperate with running transactions (connection
//! pools, caches, session holders) implement [`TransactionSynchronization`]
//! and register with the per-flow binding registry. The engine invokes the
//! callbacks in a fixed order around commit and rollback:
//!
//! 1. `before_commit(read_only)` (commit path only)
//! 2. `before_completion`
//! 3. physical commit or rollback on the resource manager
//! 4. `after_commit` (successful commit only)
//! 5. `after_completion(status)`
//!
//! `suspend` and `resume` bracket displacement of the enclosing transaction,
//! and `flush` is an on-demand hook for pending-change propagation. All
//! callbacks run in registration order. Every operation has a no-op default
//! so participants only implement what they care about.

use crate::error::Result;

/// Outcome reported to `after_completion`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStatus {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
    /// The outcome is unknown, typically after a completion-phase failure or
    /// when the real outcome is decided by an outer transaction.
    Unknown,
}

impl CompletionStatus {
    /// Canonical lowercase name, as used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Committed => "committed",
            CompletionStatus::RolledBack => "rolled_back",
            CompletionStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback contract for transaction participants
///
/// Errors from `before_commit`, `after_commit`, `suspend`, `resume` and
/// `flush` propagate to the engine (and may abort a commit); errors from
/// `before_completion` and `after_completion` are logged by the dispatcher
/// and never prevent the remaining callbacks from running.
pub trait TransactionSynchronization {
    /// The enclosing transaction scope is being suspended.
    fn suspend(&self) -> Result<()> {
        Ok(())
    }

    /// A previously suspended transaction scope is being reinstated.
    fn resume(&self) -> Result<()> {
        Ok(())
    }

    /// Flush pending changes to the underlying resource, if any.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// The transaction is about to commit. An error here aborts the commit
    /// and diverts to rollback.
    fn before_commit(&self, read_only: bool) -> Result<()> {
        let _ = read_only;
        Ok(())
    }

    /// The transaction is about to complete, by commit or by rollback.
    fn before_completion(&self) -> Result<()> {
        Ok(())
    }

    /// The transaction committed. An error here reaches the caller, but the
    /// transaction is still considered committed.
    fn after_commit(&self) -> Result<()> {
        Ok(())
    }

    /// The transaction completed with the given outcome.
    fn after_completion(&self, status: CompletionStatus) -> Result<()> {
        let _ = status;
        Ok(())
    }
}
