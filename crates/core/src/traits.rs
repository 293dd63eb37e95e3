//! Resource manager contract
//!
//! [`ResourceManager`] is the single seam between the propagation engine and
//! whatever actually owns transactions: a relational connection, a message
//! broker session, a distributed coordinator. The engine never inspects the
//! transaction object, the suspension token, or the savepoint token; all
//! three are associated types chosen by the implementation.
//!
//! Only `acquire`, `begin`, `commit` and `rollback` are required. Everything
//! else has a default expressing "not supported": managers that cannot
//! suspend, nest, or participate simply leave the defaults in place and the
//! engine surfaces the corresponding errors when a caller asks for those
//! behaviors.

use crate::definition::TransactionDefinition;
use crate::error::{Result, TransactionError};

/// Contract the propagation engine requires of an underlying resource manager
pub trait ResourceManager {
    /// Opaque per-call transaction object.
    ///
    /// Carries whatever state the manager needs to begin, commit and roll
    /// back; for an already-running transaction it carries enough to
    /// participate in it.
    type Transaction;

    /// Opaque token describing a suspended transaction's resources.
    type Suspended;

    /// Opaque savepoint token.
    type Savepoint;

    /// Return a transaction object for the current flow.
    ///
    /// The object may or may not represent an already-active transaction;
    /// [`ResourceManager::is_existing`] decides which.
    fn acquire(&self) -> Result<Self::Transaction>;

    /// Whether the acquired object represents an already-active transaction.
    ///
    /// The default says no, meaning participation is never detected.
    fn is_existing(&self, transaction: &Self::Transaction) -> bool {
        let _ = transaction;
        false
    }

    /// Begin a new physical transaction.
    ///
    /// Called either with no transaction active or after the previous one was
    /// suspended. `timeout_seconds` is already resolved against the engine
    /// default; `None` means the infrastructure default applies.
    fn begin(
        &self,
        transaction: &mut Self::Transaction,
        definition: &TransactionDefinition,
        timeout_seconds: Option<u32>,
    ) -> Result<()>;

    /// Suspend the current transaction's resources, returning a token that
    /// will later be passed to [`ResourceManager::resume`].
    fn suspend(&self, transaction: &mut Self::Transaction) -> Result<Self::Suspended> {
        let _ = transaction;
        Err(TransactionError::suspension_not_supported(
            "resource manager does not support transaction suspension",
        ))
    }

    /// Reinstate resources captured by [`ResourceManager::suspend`].
    fn resume(
        &self,
        transaction: Option<&mut Self::Transaction>,
        suspended: Self::Suspended,
    ) -> Result<()> {
        let _ = (transaction, suspended);
        Err(TransactionError::suspension_not_supported(
            "resource manager does not support transaction resumption",
        ))
    }

    /// Hook invoked just before the `before_commit` synchronizations.
    ///
    /// An error aborts the commit and diverts to rollback.
    fn prepare_for_commit(&self, transaction: &mut Self::Transaction) -> Result<()> {
        let _ = transaction;
        Ok(())
    }

    /// Commit the given transaction.
    fn commit(&self, transaction: &mut Self::Transaction) -> Result<()>;

    /// Roll back the given transaction.
    fn rollback(&self, transaction: &mut Self::Transaction) -> Result<()>;

    /// Mark the given transaction rollback-only on behalf of a participant.
    ///
    /// Only called when the current scope participates in an outer
    /// transaction; the default treats participation as unsupported.
    fn set_rollback_only(&self, transaction: &mut Self::Transaction) -> Result<()> {
        let _ = transaction;
        Err(TransactionError::illegal_state(
            "participating in existing transactions is not supported by this resource manager",
        ))
    }

    /// Whether the given transaction carries a global rollback-only marker.
    fn is_rollback_only(&self, transaction: &Self::Transaction) -> bool {
        let _ = transaction;
        false
    }

    /// Release resources held by the transaction object after completion.
    fn cleanup(&self, transaction: &mut Self::Transaction) {
        let _ = transaction;
    }

    /// Create a savepoint on the given transaction.
    fn create_savepoint(&self, transaction: &mut Self::Transaction) -> Result<Self::Savepoint> {
        let _ = transaction;
        Err(TransactionError::nested_not_supported(
            "resource manager does not support savepoints",
        ))
    }

    /// Roll the transaction back to the given savepoint.
    fn rollback_to_savepoint(
        &self,
        transaction: &mut Self::Transaction,
        savepoint: &Self::Savepoint,
    ) -> Result<()> {
        let _ = (transaction, savepoint);
        Err(TransactionError::nested_not_supported(
            "resource manager does not support savepoints",
        ))
    }

    /// Release the given savepoint.
    fn release_savepoint(
        &self,
        transaction: &mut Self::Transaction,
        savepoint: Self::Savepoint,
    ) -> Result<()> {
        let _ = (transaction, savepoint);
        Err(TransactionError::nested_not_supported(
            "resource manager does not support savepoints",
        ))
    }

    /// Whether nested transactions should use savepoints on the existing
    /// transaction (`true`, the single-resource default) or a genuine nested
    /// `begin` (`false`, for coordinators with native nesting).
    fn use_savepoint_for_nested(&self) -> bool {
        true
    }

    /// Whether `commit` should still be invoked on a transaction that is
    /// globally marked rollback-only, letting the manager raise its own
    /// rollback error.
    fn commit_on_global_rollback_only(&self) -> bool {
        false
    }
}
