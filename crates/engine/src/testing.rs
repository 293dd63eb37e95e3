//! Testing utilities for the propagation engine
//!
//! This module provides deterministic doubles for exercising the engine
//! without a real transactional resource:
//!
//! - [`MemoryResourceManager`]: a savepoint- and suspension-capable resource
//!   manager that appends every operation to an ordered event log and can be
//!   told to fail specific operations.
//! - [`RecordingSynchronization`]: a synchronization that appends each
//!   callback invocation to the same kind of log, optionally failing one
//!   callback.
//!
//! Sharing one log between the manager and the synchronizations makes the
//! relative order of callbacks and physical operations directly assertable:
//!
//! ```ignore
//! let log = shared_log();
//! let manager = TransactionManager::new(MemoryResourceManager::with_log(log.clone()));
//! // ... run a transaction ...
//! assert_eq!(events(&log), vec!["begin", "a:before-commit(false)", "commit"]);
//! ```

use demarc_core::{
    CompletionStatus, ResourceManager, Result, TransactionDefinition, TransactionError,
    TransactionSynchronization,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Create an event log to share between test doubles.
pub fn shared_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot the events recorded so far.
pub fn events(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().clone()
}

/// Transaction object handed out by [`MemoryResourceManager`].
#[derive(Debug)]
pub struct MemoryTransaction {
    existing: bool,
}

/// Suspension token of [`MemoryResourceManager`].
#[derive(Debug)]
pub struct SuspendedTransaction {
    rollback_only: bool,
}

/// Savepoint token of [`MemoryResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySavepoint(u64);

#[derive(Default)]
struct ManagerState {
    active: bool,
    rollback_only: bool,
    next_savepoint: u64,
    failing: HashSet<&'static str>,
}

/// In-memory resource manager recording every operation
///
/// The manager models a single physical transaction per flow of use: `begin`
/// activates it, `commit`/`rollback` deactivate it, `suspend` parks it and
/// `resume` reinstates it together with its rollback-only marker. Savepoints
/// are counted tokens. Any operation can be made to fail by name through
/// [`MemoryResourceManager::fail_on`].
pub struct MemoryResourceManager {
    savepoint_for_nested: bool,
    commit_on_global_rollback_only: bool,
    log: Arc<Mutex<Vec<String>>>,
    state: Arc<Mutex<ManagerState>>,
}

impl MemoryResourceManager {
    /// Create a manager with its own event log.
    pub fn new() -> Self {
        MemoryResourceManager::with_log(shared_log())
    }

    /// Create a manager appending to the given event log.
    pub fn with_log(log: Arc<Mutex<Vec<String>>>) -> Self {
        MemoryResourceManager {
            savepoint_for_nested: true,
            commit_on_global_rollback_only: false,
            log,
            state: Arc::new(Mutex::new(ManagerState::default())),
        }
    }

    /// Use native nested transactions instead of savepoints.
    pub fn with_native_nesting(mut self) -> Self {
        self.savepoint_for_nested = false;
        self
    }

    /// Expect `commit` even when the transaction is globally rollback-only.
    pub fn with_commit_on_global_rollback_only(mut self) -> Self {
        self.commit_on_global_rollback_only = true;
        self
    }

    /// Make the named operation fail until cleared.
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().failing.insert(operation);
    }

    /// Stop failing the named operation.
    pub fn succeed_on(&self, operation: &'static str) {
        self.state.lock().failing.remove(operation);
    }

    /// Pretend a transaction is already running, as if begun by an outer
    /// coordinator.
    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    /// Whether the physical transaction is currently active.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Whether the physical transaction carries the global rollback-only
    /// marker.
    pub fn is_marked_rollback_only(&self) -> bool {
        self.state.lock().rollback_only
    }

    /// The event log this manager appends to.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// Snapshot the events recorded so far.
    pub fn events(&self) -> Vec<String> {
        events(&self.log)
    }

    /// Drop all recorded events.
    pub fn clear_events(&self) {
        self.log.lock().clear();
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        if self.state.lock().failing.contains(operation) {
            self.log.lock().push(format!("{operation}-failed"));
            return Err(TransactionError::system(format!(
                "injected {operation} failure"
            )));
        }
        self.log.lock().push(operation.to_string());
        Ok(())
    }
}

impl Default for MemoryResourceManager {
    fn default() -> Self {
        MemoryResourceManager::new()
    }
}

impl ResourceManager for MemoryResourceManager {
    type Transaction = MemoryTransaction;
    type Suspended = SuspendedTransaction;
    type Savepoint = MemorySavepoint;

    fn acquire(&self) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction {
            existing: self.state.lock().active,
        })
    }

    fn is_existing(&self, transaction: &MemoryTransaction) -> bool {
        transaction.existing
    }

    fn begin(
        &self,
        _transaction: &mut MemoryTransaction,
        _definition: &TransactionDefinition,
        _timeout_seconds: Option<u32>,
    ) -> Result<()> {
        self.record("begin")?;
        let mut state = self.state.lock();
        state.active = true;
        state.rollback_only = false;
        Ok(())
    }

    fn suspend(&self, _transaction: &mut MemoryTransaction) -> Result<SuspendedTransaction> {
        self.record("suspend")?;
        let mut state = self.state.lock();
        let token = SuspendedTransaction {
            rollback_only: state.rollback_only,
        };
        state.active = false;
        state.rollback_only = false;
        Ok(token)
    }

    fn resume(
        &self,
        _transaction: Option<&mut MemoryTransaction>,
        suspended: SuspendedTransaction,
    ) -> Result<()> {
        self.record("resume")?;
        let mut state = self.state.lock();
        state.active = true;
        state.rollback_only = suspended.rollback_only;
        Ok(())
    }

    fn prepare_for_commit(&self, _transaction: &mut MemoryTransaction) -> Result<()> {
        self.record("prepare")
    }

    fn commit(&self, _transaction: &mut MemoryTransaction) -> Result<()> {
        self.record("commit")?;
        let mut state = self.state.lock();
        state.active = false;
        state.rollback_only = false;
        Ok(())
    }

    fn rollback(&self, _transaction: &mut MemoryTransaction) -> Result<()> {
        self.record("rollback")?;
        let mut state = self.state.lock();
        state.active = false;
        state.rollback_only = false;
        Ok(())
    }

    fn set_rollback_only(&self, _transaction: &mut MemoryTransaction) -> Result<()> {
        self.record("set-rollback-only")?;
        self.state.lock().rollback_only = true;
        Ok(())
    }

    fn is_rollback_only(&self, _transaction: &MemoryTransaction) -> bool {
        self.state.lock().rollback_only
    }

    fn cleanup(&self, _transaction: &mut MemoryTransaction) {
        self.log.lock().push("cleanup".to_string());
    }

    fn create_savepoint(&self, _transaction: &mut MemoryTransaction) -> Result<MemorySavepoint> {
        self.record("create-savepoint")?;
        let mut state = self.state.lock();
        state.next_savepoint += 1;
        Ok(MemorySavepoint(state.next_savepoint))
    }

    fn rollback_to_savepoint(
        &self,
        _transaction: &mut MemoryTransaction,
        _savepoint: &MemorySavepoint,
    ) -> Result<()> {
        self.record("rollback-to-savepoint")
    }

    fn release_savepoint(
        &self,
        _transaction: &mut MemoryTransaction,
        _savepoint: MemorySavepoint,
    ) -> Result<()> {
        self.record("release-savepoint")
    }

    fn use_savepoint_for_nested(&self) -> bool {
        self.savepoint_for_nested
    }

    fn commit_on_global_rollback_only(&self) -> bool {
        self.commit_on_global_rollback_only
    }
}

/// Synchronization that records every callback into a shared event log
///
/// Events are recorded as `<label>:<callback>`, so several labeled instances
/// sharing one log yield a totally ordered trace. [`RecordingSynchronization::failing`]
/// builds an instance whose named callback records and then fails.
pub struct RecordingSynchronization {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
}

impl RecordingSynchronization {
    /// Create a recording synchronization with the given label.
    pub fn new(label: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        RecordingSynchronization {
            label: label.into(),
            log,
            fail_on: None,
        }
    }

    /// Create a recording synchronization whose named callback fails after
    /// recording. Callback names are the lowercase hyphenated forms, e.g.
    /// `"before-commit"` or `"after-completion"`.
    pub fn failing(
        label: impl Into<String>,
        log: Arc<Mutex<Vec<String>>>,
        operation: &'static str,
    ) -> Self {
        RecordingSynchronization {
            label: label.into(),
            log,
            fail_on: Some(operation),
        }
    }

    fn record(&self, operation: &'static str, event: String) -> Result<()> {
        self.log.lock().push(format!("{}:{}", self.label, event));
        if self.fail_on == Some(operation) {
            return Err(TransactionError::system(format!(
                "injected {operation} failure in synchronization '{}'",
                self.label
            )));
        }
        Ok(())
    }
}

impl TransactionSynchronization for RecordingSynchronization {
    fn suspend(&self) -> Result<()> {
        self.record("suspend", "suspend".to_string())
    }

    fn resume(&self) -> Result<()> {
        self.record("resume", "resume".to_string())
    }

    fn flush(&self) -> Result<()> {
        self.record("flush", "flush".to_string())
    }

    fn before_commit(&self, read_only: bool) -> Result<()> {
        self.record("before-commit", format!("before-commit({read_only})"))
    }

    fn before_completion(&self) -> Result<()> {
        self.record("before-completion", "before-completion".to_string())
    }

    fn after_commit(&self) -> Result<()> {
        self.record("after-commit", "after-commit".to_string())
    }

    fn after_completion(&self, status: CompletionStatus) -> Result<()> {
        self.record("after-completion", format!("after-completion({status})"))
    }
}
