//! Propagation engine
//!
//! [`TransactionManager`] implements the transaction orchestration protocol
//! over a pluggable [`ResourceManager`]:
//!
//! 1. `get_transaction` applies the propagation decision table, beginning,
//!    joining, suspending or nesting as required, and initializes the
//!    per-flow registry for the new scope.
//! 2. `commit` runs the commit state machine: rollback-only diversion,
//!    before-commit and before-completion callbacks, the physical commit (or
//!    savepoint release), after-commit and after-completion callbacks.
//! 3. `rollback` runs the rollback state machine: savepoint rollback, full
//!    rollback, or rollback-only marking when merely participating.
//!
//! Both completion paths finish through the same cleanup: the status is
//! marked completed, the registry is torn down if this scope owned it, the
//! resource manager gets its cleanup hook, and any transaction displaced by
//! this scope is resumed.
//!
//! The engine executes synchronously on the calling flow and holds no state
//! besides the resource manager and its immutable configuration; everything
//! per-flow lives in the binding registry.

use crate::config::{EngineConfig, SynchronizationPolicy};
use crate::status::{SuspendedFlow, TransactionStatus};
use demarc_context::{dispatch, registry};
use demarc_core::{
    CompletionStatus, Propagation, ResourceManager, Result, TransactionDefinition,
    TransactionError, TransactionSynchronization, TIMEOUT_DEFAULT,
};
use std::rc::Rc;
use tracing::{debug, error, trace, warn};

/// Transaction orchestration engine over a concrete resource manager
pub struct TransactionManager<R: ResourceManager> {
    resource_manager: R,
    config: EngineConfig,
}

impl<R: ResourceManager> TransactionManager<R> {
    /// Create an engine with the default configuration.
    pub fn new(resource_manager: R) -> Self {
        TransactionManager::with_config(resource_manager, EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    ///
    /// The configuration is fixed for the lifetime of the engine.
    pub fn with_config(resource_manager: R, config: EngineConfig) -> Self {
        TransactionManager {
            resource_manager,
            config,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying resource manager.
    pub fn resource_manager(&self) -> &R {
        &self.resource_manager
    }

    // -----------------------------------------------------------------
    // get_transaction
    // -----------------------------------------------------------------

    /// Obtain a transaction scope according to the given definition.
    ///
    /// A missing definition means the defaults: `required` propagation,
    /// resource-default isolation, infrastructure-default timeout,
    /// read-write.
    pub fn get_transaction(
        &self,
        definition: Option<&TransactionDefinition>,
    ) -> Result<TransactionStatus<R>> {
        let definition = definition.cloned().unwrap_or_default();

        if definition.timeout_seconds < TIMEOUT_DEFAULT {
            return Err(TransactionError::invalid_timeout(definition.timeout_seconds));
        }

        let transaction = self.resource_manager.acquire()?;

        if self.resource_manager.is_existing(&transaction) {
            return self.handle_existing_transaction(definition, transaction);
        }

        match definition.propagation {
            Propagation::Mandatory => Err(TransactionError::illegal_state(
                "no existing transaction found for transaction marked with propagation 'mandatory'",
            )),
            Propagation::Required | Propagation::RequiresNew | Propagation::Nested => {
                // Any active synchronization-only scope is displaced so the
                // new transaction starts with a fresh one.
                let suspended = self.suspend(None)?;
                debug!(
                    transaction_name = definition.name.as_deref().unwrap_or(""),
                    propagation = %definition.propagation,
                    "creating new transaction"
                );
                self.start_transaction(&definition, transaction, suspended)
            }
            Propagation::Supports | Propagation::NotSupported | Propagation::Never => {
                // "Empty" scope: no physical transaction, possibly
                // synchronization.
                if definition.isolation.is_some() {
                    warn!(
                        isolation = ?definition.isolation,
                        "isolation level specified but no actual transaction initiated; the level will be ignored"
                    );
                }
                let new_synchronization =
                    self.config.synchronization == SynchronizationPolicy::Always;
                let status =
                    self.new_status(&definition, None, true, new_synchronization, None);
                self.prepare_synchronization(&status, &definition)?;
                Ok(status)
            }
        }
    }

    fn handle_existing_transaction(
        &self,
        definition: TransactionDefinition,
        mut transaction: R::Transaction,
    ) -> Result<TransactionStatus<R>> {
        match definition.propagation {
            Propagation::Never => Err(TransactionError::illegal_state(
                "existing transaction found for transaction marked with propagation 'never'",
            )),
            Propagation::NotSupported => {
                debug!("suspending current transaction");
                let suspended = self.suspend(Some(&mut transaction))?;
                let new_synchronization =
                    self.config.synchronization == SynchronizationPolicy::Always;
                let status =
                    self.new_status(&definition, None, false, new_synchronization, suspended);
                self.prepare_synchronization(&status, &definition)?;
                Ok(status)
            }
            Propagation::RequiresNew => {
                debug!(
                    transaction_name = definition.name.as_deref().unwrap_or(""),
                    "suspending current transaction, creating new transaction"
                );
                let suspended = self.suspend(Some(&mut transaction))?;
                self.start_transaction(&definition, transaction, suspended)
            }
            Propagation::Nested => {
                if !self.config.nested_transaction_allowed {
                    return Err(TransactionError::nested_not_supported(
                        "nested transactions are disabled for this engine; enable 'nested_transaction_allowed'",
                    ));
                }
                debug!(
                    transaction_name = definition.name.as_deref().unwrap_or(""),
                    "creating nested transaction"
                );
                if self.resource_manager.use_savepoint_for_nested() {
                    // Savepoint-scoped nesting inside the existing physical
                    // transaction. The outer scope keeps synchronization.
                    let mut status =
                        self.new_status(&definition, Some(transaction), false, false, None);
                    self.create_and_hold_savepoint(&mut status)?;
                    Ok(status)
                } else {
                    // Native nesting through an actual begin.
                    self.start_transaction(&definition, transaction, None)
                }
            }
            Propagation::Supports | Propagation::Required | Propagation::Mandatory => {
                debug!("participating in existing transaction");
                if self.config.validate_existing_transaction {
                    self.validate_participation(&definition)?;
                }
                let new_synchronization =
                    self.config.synchronization != SynchronizationPolicy::Never;
                let status = self.new_status(
                    &definition,
                    Some(transaction),
                    false,
                    new_synchronization,
                    None,
                );
                self.prepare_synchronization(&status, &definition)?;
                Ok(status)
            }
        }
    }

    fn validate_participation(&self, definition: &TransactionDefinition) -> Result<()> {
        if let Some(requested) = definition.isolation {
            let current = registry::current_isolation();
            if current != Some(requested) {
                return Err(TransactionError::illegal_state(format!(
                    "participating transaction requests isolation level '{requested}' which is \
                     incompatible with the existing transaction ({})",
                    current.map_or_else(|| "unknown level".to_string(), |level| format!("'{level}'")),
                )));
            }
        }
        if !definition.read_only && registry::is_current_read_only() {
            return Err(TransactionError::illegal_state(
                "participating transaction is not marked as read-only but the existing transaction is",
            ));
        }
        Ok(())
    }

    fn start_transaction(
        &self,
        definition: &TransactionDefinition,
        mut transaction: R::Transaction,
        suspended: Option<SuspendedFlow<R::Suspended>>,
    ) -> Result<TransactionStatus<R>> {
        let new_synchronization = self.config.synchronization != SynchronizationPolicy::Never;
        let timeout_seconds = self.resolve_timeout(definition);
        if let Err(begin_error) =
            self.resource_manager
                .begin(&mut transaction, definition, timeout_seconds)
        {
            self.resume_after_begin_error(Some(&mut transaction), suspended, &begin_error)?;
            return Err(begin_error);
        }
        let status = self.new_status(
            definition,
            Some(transaction),
            true,
            new_synchronization,
            suspended,
        );
        self.prepare_synchronization(&status, definition)?;
        Ok(status)
    }

    fn new_status(
        &self,
        definition: &TransactionDefinition,
        transaction: Option<R::Transaction>,
        new_transaction: bool,
        new_synchronization: bool,
        suspended: Option<SuspendedFlow<R::Suspended>>,
    ) -> TransactionStatus<R> {
        // Only the outermost scope initializes synchronization.
        let actual_new_synchronization =
            new_synchronization && !registry::is_synchronization_active();
        TransactionStatus {
            transaction,
            new_transaction,
            new_synchronization: actual_new_synchronization,
            read_only: definition.read_only,
            savepoint: None,
            suspended,
            rollback_only: false,
            completed: false,
        }
    }

    fn prepare_synchronization(
        &self,
        status: &TransactionStatus<R>,
        definition: &TransactionDefinition,
    ) -> Result<()> {
        if status.is_new_synchronization() {
            registry::set_actual_transaction_active(status.has_transaction());
            registry::set_current_isolation(definition.isolation);
            registry::set_current_read_only(definition.read_only);
            registry::set_current_name(definition.name.clone());
            registry::init_synchronization()?;
        }
        Ok(())
    }

    fn resolve_timeout(&self, definition: &TransactionDefinition) -> Option<u32> {
        let seconds = if definition.timeout_seconds != TIMEOUT_DEFAULT {
            definition.timeout_seconds
        } else {
            self.config.default_timeout_seconds
        };
        u32::try_from(seconds).ok()
    }

    // -----------------------------------------------------------------
    // Suspension and resumption
    // -----------------------------------------------------------------

    fn suspend(
        &self,
        transaction: Option<&mut R::Transaction>,
    ) -> Result<Option<SuspendedFlow<R::Suspended>>> {
        if registry::is_synchronization_active() {
            let suspended_synchronizations = self.suspend_synchronizations()?;
            let resources = match transaction {
                Some(transaction) => match self.resource_manager.suspend(transaction) {
                    Ok(resources) => Some(resources),
                    Err(suspend_error) => {
                        // The resource-level suspend failed, so the original
                        // transaction is still active: reinstate the
                        // synchronizations suspended above.
                        if let Err(resume_error) =
                            self.resume_synchronizations(suspended_synchronizations)
                        {
                            error!(
                                error = %resume_error,
                                "failed to reinstate synchronizations after suspend failure"
                            );
                        }
                        return Err(suspend_error);
                    }
                },
                None => None,
            };
            let name = registry::current_name();
            registry::set_current_name(None);
            let read_only = registry::is_current_read_only();
            registry::set_current_read_only(false);
            let isolation = registry::current_isolation();
            registry::set_current_isolation(None);
            let was_active = registry::is_actual_transaction_active();
            registry::set_actual_transaction_active(false);
            Ok(Some(SuspendedFlow {
                resources,
                synchronizations: Some(suspended_synchronizations),
                name,
                read_only,
                isolation,
                was_active,
            }))
        } else if let Some(transaction) = transaction {
            // Transaction active but no synchronization to capture.
            let resources = self.resource_manager.suspend(transaction)?;
            Ok(Some(SuspendedFlow {
                resources: Some(resources),
                synchronizations: None,
                name: None,
                read_only: false,
                isolation: None,
                was_active: false,
            }))
        } else {
            Ok(None)
        }
    }

    fn resume(
        &self,
        transaction: Option<&mut R::Transaction>,
        suspended: Option<SuspendedFlow<R::Suspended>>,
    ) -> Result<()> {
        let Some(holder) = suspended else {
            return Ok(());
        };
        if let Some(resources) = holder.resources {
            self.resource_manager.resume(transaction, resources)?;
        }
        if let Some(synchronizations) = holder.synchronizations {
            registry::set_actual_transaction_active(holder.was_active);
            registry::set_current_isolation(holder.isolation);
            registry::set_current_read_only(holder.read_only);
            registry::set_current_name(holder.name);
            self.resume_synchronizations(synchronizations)?;
        }
        Ok(())
    }

    fn resume_after_begin_error(
        &self,
        transaction: Option<&mut R::Transaction>,
        suspended: Option<SuspendedFlow<R::Suspended>>,
        begin_error: &TransactionError,
    ) -> Result<()> {
        if let Err(resume_error) = self.resume(transaction, suspended) {
            error!(
                error = %begin_error,
                "transaction begin failure overridden by a failure to resume the enclosing transaction"
            );
            return Err(resume_error);
        }
        Ok(())
    }

    fn suspend_synchronizations(&self) -> Result<Vec<Rc<dyn TransactionSynchronization>>> {
        let synchronizations = registry::synchronizations();
        for synchronization in &synchronizations {
            synchronization.suspend()?;
        }
        registry::clear_synchronization();
        Ok(synchronizations)
    }

    fn resume_synchronizations(
        &self,
        synchronizations: Vec<Rc<dyn TransactionSynchronization>>,
    ) -> Result<()> {
        if !registry::is_synchronization_active() {
            registry::init_synchronization()?;
        }
        for synchronization in synchronizations {
            synchronization.resume()?;
            registry::register_synchronization(synchronization)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // commit
    // -----------------------------------------------------------------

    /// Commit the given transaction scope.
    ///
    /// A local rollback-only request diverts to rollback. A global
    /// rollback-only marker diverts to rollback and raises
    /// [`TransactionError::UnexpectedRollback`] once completion callbacks
    /// have run, unless the resource manager opts into committing anyway.
    pub fn commit(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        if status.is_completed() {
            return Err(TransactionError::illegal_state(
                "transaction is already completed: do not call commit or rollback more than once \
                 per transaction",
            ));
        }

        if status.is_local_rollback_only() {
            debug!("transactional code has requested rollback");
            return self.process_rollback(status, false);
        }

        if !self.resource_manager.commit_on_global_rollback_only()
            && self.is_global_rollback_only(status)
        {
            debug!("global transaction is marked as rollback-only but commit was requested");
            return self.process_rollback(status, true);
        }

        self.process_commit(status)
    }

    fn process_commit(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        let result = self.commit_phase(status);
        self.cleanup_after_completion(status);
        result
    }

    fn commit_phase(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        // Preparation and before-commit callbacks. A failure here still has
        // to complete the scope, through the rollback path.
        if let Err(err) = self.prepare_and_notify_before(status) {
            self.trigger_before_completion(status);
            self.rollback_on_commit_error(status, &err)?;
            return Err(err);
        }
        self.trigger_before_completion(status);

        let mut unexpected_rollback = false;
        let physical = if status.has_savepoint() {
            debug!("releasing transaction savepoint");
            unexpected_rollback = self.is_global_rollback_only(status);
            self.release_held_savepoint(status)
        } else if status.is_new_transaction() {
            debug!("initiating transaction commit");
            unexpected_rollback = self.is_global_rollback_only(status);
            self.do_commit(status)
        } else {
            if self.config.fail_early_on_global_rollback_only {
                unexpected_rollback = self.is_global_rollback_only(status);
            }
            Ok(())
        };

        match physical {
            Err(err) if err.is_unexpected_rollback() => {
                self.trigger_after_completion(status, CompletionStatus::RolledBack);
                return Err(err);
            }
            Err(err) => {
                if self.config.rollback_on_commit_failure {
                    self.rollback_on_commit_error(status, &err)?;
                } else {
                    self.trigger_after_completion(status, CompletionStatus::Unknown);
                }
                return Err(err);
            }
            Ok(()) => {}
        }

        if unexpected_rollback {
            self.trigger_after_completion(status, CompletionStatus::RolledBack);
            return Err(TransactionError::unexpected_rollback(
                "transaction silently rolled back because it has been marked as rollback-only",
            ));
        }

        // After-commit failures reach the caller, but the transaction is
        // committed: completion callbacks observe the committed outcome
        // before the failure surfaces.
        let after_commit = self.trigger_after_commit(status);
        self.trigger_after_completion(status, CompletionStatus::Committed);
        after_commit
    }

    fn prepare_and_notify_before(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        if let Some(transaction) = status.transaction.as_mut() {
            self.resource_manager.prepare_for_commit(transaction)?;
        }
        self.trigger_before_commit(status)
    }

    fn rollback_on_commit_error(
        &self,
        status: &mut TransactionStatus<R>,
        commit_error: &TransactionError,
    ) -> Result<()> {
        let rollback_result = if status.is_new_transaction() {
            debug!("initiating transaction rollback after commit failure");
            self.do_rollback(status)
        } else if status.has_transaction()
            && self.config.global_rollback_on_participation_failure
        {
            debug!("marking existing transaction as rollback-only after commit failure");
            self.do_set_rollback_only(status)
        } else {
            Ok(())
        };
        match rollback_result {
            Err(rollback_error) => {
                error!(error = %commit_error, "commit failure overridden by rollback failure");
                self.trigger_after_completion(status, CompletionStatus::Unknown);
                Err(rollback_error)
            }
            Ok(()) => {
                self.trigger_after_completion(status, CompletionStatus::RolledBack);
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------
    // rollback
    // -----------------------------------------------------------------

    /// Roll back the given transaction scope.
    ///
    /// A scope that merely participates in an outer transaction does not roll
    /// the physical transaction back; depending on configuration it marks the
    /// outer transaction rollback-only or leaves the decision to the
    /// originator.
    pub fn rollback(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        if status.is_completed() {
            return Err(TransactionError::illegal_state(
                "transaction is already completed: do not call commit or rollback more than once \
                 per transaction",
            ));
        }
        self.process_rollback(status, false)
    }

    fn process_rollback(&self, status: &mut TransactionStatus<R>, unexpected: bool) -> Result<()> {
        let result = self.rollback_phase(status, unexpected);
        self.cleanup_after_completion(status);
        result
    }

    fn rollback_phase(&self, status: &mut TransactionStatus<R>, unexpected: bool) -> Result<()> {
        let mut unexpected_rollback = unexpected;
        self.trigger_before_completion(status);

        if let Err(err) = self.rollback_physical(status, &mut unexpected_rollback) {
            self.trigger_after_completion(status, CompletionStatus::Unknown);
            return Err(err);
        }

        self.trigger_after_completion(status, CompletionStatus::RolledBack);

        if unexpected_rollback {
            return Err(TransactionError::unexpected_rollback(
                "transaction rolled back because it has been marked as rollback-only",
            ));
        }
        Ok(())
    }

    fn rollback_physical(
        &self,
        status: &mut TransactionStatus<R>,
        unexpected_rollback: &mut bool,
    ) -> Result<()> {
        if status.has_savepoint() {
            debug!("rolling back transaction to savepoint");
            return self.rollback_to_held_savepoint(status);
        }
        if status.is_new_transaction() {
            debug!("initiating transaction rollback");
            return self.do_rollback(status);
        }

        // Participating in a larger transaction.
        if status.has_transaction() {
            if status.is_local_rollback_only()
                || self.config.global_rollback_on_participation_failure
            {
                debug!(
                    "participating transaction failed: marking existing transaction as rollback-only"
                );
                self.do_set_rollback_only(status)?;
            } else {
                debug!(
                    "participating transaction failed: letting the transaction originator decide on rollback"
                );
            }
        } else {
            debug!("should roll back transaction but no transaction is available");
        }
        // The marker surfaces at this inner boundary only when failing early;
        // otherwise the outermost boundary reports it.
        if !self.config.fail_early_on_global_rollback_only {
            *unexpected_rollback = false;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Callback triggers
    // -----------------------------------------------------------------

    fn trigger_before_commit(&self, status: &TransactionStatus<R>) -> Result<()> {
        if status.is_new_synchronization() {
            trace!("triggering before-commit synchronization");
            dispatch::trigger_before_commit(status.is_read_only())?;
        }
        Ok(())
    }

    fn trigger_before_completion(&self, status: &TransactionStatus<R>) {
        if status.is_new_synchronization() {
            trace!("triggering before-completion synchronization");
            dispatch::trigger_before_completion();
        }
    }

    fn trigger_after_commit(&self, status: &TransactionStatus<R>) -> Result<()> {
        if status.is_new_synchronization() {
            trace!("triggering after-commit synchronization");
            dispatch::trigger_after_commit()?;
        }
        Ok(())
    }

    fn trigger_after_completion(
        &self,
        status: &TransactionStatus<R>,
        completion: CompletionStatus,
    ) {
        if status.is_new_synchronization() {
            let synchronizations = registry::synchronizations();
            registry::clear_synchronization();
            if !status.has_transaction() || status.is_new_transaction() {
                trace!("triggering after-completion synchronization");
                dispatch::invoke_after_completion(&synchronizations, completion);
            } else if !synchronizations.is_empty() {
                // The outcome belongs to the outer transaction, which this
                // engine does not control.
                debug!(
                    "after-completion callbacks cannot follow the outer transaction: invoking \
                     immediately with unknown outcome"
                );
                dispatch::invoke_after_completion(&synchronizations, CompletionStatus::Unknown);
            }
        }
    }

    // -----------------------------------------------------------------
    // Completion cleanup
    // -----------------------------------------------------------------

    fn cleanup_after_completion(&self, status: &mut TransactionStatus<R>) {
        status.completed = true;
        if status.is_new_synchronization() {
            registry::clear();
        }
        if status.is_new_transaction() {
            if let Some(transaction) = status.transaction.as_mut() {
                self.resource_manager.cleanup(transaction);
            }
        }
        if status.suspended.is_some() {
            debug!("resuming suspended transaction after completion of inner transaction");
            let suspended = status.suspended.take();
            if let Err(err) = self.resume(status.transaction.as_mut(), suspended) {
                error!(
                    error = %err,
                    "failed to resume suspended transaction; abandoning its resources"
                );
            }
        }
    }

    // -----------------------------------------------------------------
    // Rollback-only and flush surface
    // -----------------------------------------------------------------

    /// Whether the scope is rollback-only, either because the caller marked
    /// the status or because a participant marked the underlying transaction.
    pub fn is_rollback_only(&self, status: &TransactionStatus<R>) -> bool {
        status.is_local_rollback_only() || self.is_global_rollback_only(status)
    }

    fn is_global_rollback_only(&self, status: &TransactionStatus<R>) -> bool {
        status
            .transaction
            .as_ref()
            .map(|transaction| self.resource_manager.is_rollback_only(transaction))
            .unwrap_or(false)
    }

    /// Flush pending changes through the registered synchronizations, when
    /// this scope owns the synchronization.
    pub fn flush(&self, status: &TransactionStatus<R>) -> Result<()> {
        if status.is_new_synchronization() {
            dispatch::trigger_flush()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Savepoints
    // -----------------------------------------------------------------

    /// Create a savepoint on the scope's transaction.
    pub fn create_savepoint(&self, status: &mut TransactionStatus<R>) -> Result<R::Savepoint> {
        match status.transaction.as_mut() {
            Some(transaction) => self.resource_manager.create_savepoint(transaction),
            None => Err(TransactionError::nested_not_supported(
                "transaction scope carries no transaction that could hold savepoints",
            )),
        }
    }

    /// Roll the scope's transaction back to the given savepoint.
    pub fn rollback_to_savepoint(
        &self,
        status: &mut TransactionStatus<R>,
        savepoint: &R::Savepoint,
    ) -> Result<()> {
        match status.transaction.as_mut() {
            Some(transaction) => self
                .resource_manager
                .rollback_to_savepoint(transaction, savepoint),
            None => Err(TransactionError::nested_not_supported(
                "transaction scope carries no transaction that could hold savepoints",
            )),
        }
    }

    /// Release the given savepoint on the scope's transaction.
    pub fn release_savepoint(
        &self,
        status: &mut TransactionStatus<R>,
        savepoint: R::Savepoint,
    ) -> Result<()> {
        match status.transaction.as_mut() {
            Some(transaction) => self
                .resource_manager
                .release_savepoint(transaction, savepoint),
            None => Err(TransactionError::nested_not_supported(
                "transaction scope carries no transaction that could hold savepoints",
            )),
        }
    }

    fn create_and_hold_savepoint(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        let savepoint = self.create_savepoint(status)?;
        status.savepoint = Some(savepoint);
        Ok(())
    }

    fn rollback_to_held_savepoint(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        let savepoint = status.savepoint.take().ok_or_else(|| {
            TransactionError::usage(
                "cannot roll back to savepoint: no savepoint is held for the current transaction",
            )
        })?;
        let transaction = status.transaction.as_mut().ok_or_else(|| {
            TransactionError::usage(
                "cannot roll back to savepoint: the scope carries no transaction",
            )
        })?;
        self.resource_manager
            .rollback_to_savepoint(transaction, &savepoint)?;
        self.resource_manager
            .release_savepoint(transaction, savepoint)?;
        Ok(())
    }

    fn release_held_savepoint(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        let savepoint = status.savepoint.take().ok_or_else(|| {
            TransactionError::usage(
                "cannot release savepoint: no savepoint is held for the current transaction",
            )
        })?;
        let transaction = status.transaction.as_mut().ok_or_else(|| {
            TransactionError::usage("cannot release savepoint: the scope carries no transaction")
        })?;
        self.resource_manager
            .release_savepoint(transaction, savepoint)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Resource-manager delegation
    // -----------------------------------------------------------------

    fn do_commit(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        match status.transaction.as_mut() {
            Some(transaction) => self.resource_manager.commit(transaction),
            None => Err(TransactionError::illegal_state(
                "cannot commit: the scope carries no transaction",
            )),
        }
    }

    fn do_rollback(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        match status.transaction.as_mut() {
            Some(transaction) => self.resource_manager.rollback(transaction),
            None => Err(TransactionError::illegal_state(
                "cannot roll back: the scope carries no transaction",
            )),
        }
    }

    fn do_set_rollback_only(&self, status: &mut TransactionStatus<R>) -> Result<()> {
        match status.transaction.as_mut() {
            Some(transaction) => self.resource_manager.set_rollback_only(transaction),
            None => Err(TransactionError::illegal_state(
                "cannot mark rollback-only: the scope carries no transaction",
            )),
        }
    }
}
