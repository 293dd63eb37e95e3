//! Transaction status handle
//!
//! [`TransactionStatus`] is what callers hold between `get_transaction` and
//! `commit`/`rollback`. It is a plain record with optional parts rather than
//! a hierarchy: the same type represents a newly begun transaction, a
//! participating scope, an empty non-transactional scope, and a
//! savepoint-scoped nested transaction, distinguished by which fields are
//! populated.

use demarc_core::{IsolationLevel, ResourceManager, TransactionSynchronization};
use std::rc::Rc;

/// Snapshot of an enclosing transaction displaced by suspension.
///
/// Consumed exactly once when the displaced transaction is resumed.
pub(crate) struct SuspendedFlow<S> {
    /// Resource-manager suspension token, absent when only synchronization
    /// state was suspended.
    pub(crate) resources: Option<S>,
    /// Synchronizations that were registered when suspension happened,
    /// absent when synchronization was not active.
    pub(crate) synchronizations: Option<Vec<Rc<dyn TransactionSynchronization>>>,
    pub(crate) name: Option<String>,
    pub(crate) read_only: bool,
    pub(crate) isolation: Option<IsolationLevel>,
    pub(crate) was_active: bool,
}

/// Handle for a transaction scope obtained from the engine
///
/// The status owns the resource manager's opaque transaction object for the
/// duration of the scope. The engine mutates the handle on completion; the
/// caller's interaction is limited to inspecting flags and requesting
/// rollback-only.
pub struct TransactionStatus<R: ResourceManager> {
    pub(crate) transaction: Option<R::Transaction>,
    pub(crate) new_transaction: bool,
    pub(crate) new_synchronization: bool,
    pub(crate) read_only: bool,
    pub(crate) savepoint: Option<R::Savepoint>,
    pub(crate) suspended: Option<SuspendedFlow<R::Suspended>>,
    pub(crate) rollback_only: bool,
    pub(crate) completed: bool,
}

impl<R: ResourceManager> TransactionStatus<R> {
    /// Whether this scope carries an actual transaction object.
    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Whether this scope begun a new physical transaction.
    ///
    /// Reports `false` for empty scopes even though they own their logical
    /// boundary, matching the flag's meaning of "a physical begin happened".
    pub fn is_new_transaction(&self) -> bool {
        self.has_transaction() && self.new_transaction
    }

    /// Whether this scope initialized synchronization for the flow.
    pub fn is_new_synchronization(&self) -> bool {
        self.new_synchronization
    }

    /// Whether the definition declared this scope read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a savepoint is held for this scope.
    pub fn has_savepoint(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Whether commit or rollback already ran for this scope.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Request rollback as the only possible outcome of this scope.
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    /// Whether rollback-only was requested on this handle.
    ///
    /// The engine's `is_rollback_only` additionally consults the global
    /// marker on the underlying transaction.
    pub fn is_local_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Borrow the underlying transaction object, if any.
    pub fn transaction(&self) -> Option<&R::Transaction> {
        self.transaction.as_ref()
    }

    /// Mutably borrow the underlying transaction object, if any.
    pub fn transaction_mut(&mut self) -> Option<&mut R::Transaction> {
        self.transaction.as_mut()
    }
}

impl<R: ResourceManager> std::fmt::Debug for TransactionStatus<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("has_transaction", &self.has_transaction())
            .field("new_transaction", &self.new_transaction)
            .field("new_synchronization", &self.new_synchronization)
            .field("read_only", &self.read_only)
            .field("has_savepoint", &self.has_savepoint())
            .field("has_suspended", &self.suspended.is_some())
            .field("rollback_only", &self.rollback_only)
            .field("completed", &self.completed)
            .finish()
    }
}
