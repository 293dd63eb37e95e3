//! Synchronization callback dispatch
//!
//! Fan-out helpers over the synchronizations registered with the current
//! flow. Two error policies apply, matching what callers can still do about
//! a failure at each point:
//!
//! - `before_commit`, `after_commit` and `flush`: the first error aborts the
//!   phase and propagates.
//! - `before_completion` and `after_completion`: the outcome is already
//!   decided, so an error is logged and the remaining callbacks still run.
//!
//! All phases iterate in registration order.

use crate::registry;
use demarc_core::{CompletionStatus, Result, TransactionSynchronization};
use std::rc::Rc;
use tracing::error;

/// Invoke `flush` on all registered synchronizations.
pub fn trigger_flush() -> Result<()> {
    for synchronization in registry::synchronizations() {
        synchronization.flush()?;
    }
    Ok(())
}

/// Invoke `before_commit` on all registered synchronizations.
///
/// The first error propagates and aborts the commit.
pub fn trigger_before_commit(read_only: bool) -> Result<()> {
    for synchronization in registry::synchronizations() {
        synchronization.before_commit(read_only)?;
    }
    Ok(())
}

/// Invoke `before_completion` on all registered synchronizations, logging
/// failures without interrupting the phase.
pub fn trigger_before_completion() {
    for synchronization in registry::synchronizations() {
        if let Err(err) = synchronization.before_completion() {
            error!(error = %err, "before-completion synchronization callback failed");
        }
    }
}

/// Invoke `after_commit` on all registered synchronizations.
pub fn trigger_after_commit() -> Result<()> {
    invoke_after_commit(&registry::synchronizations())
}

/// Invoke `after_commit` on the given synchronizations.
///
/// The first error propagates; the transaction is still committed.
pub fn invoke_after_commit(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
) -> Result<()> {
    for synchronization in synchronizations {
        synchronization.after_commit()?;
    }
    Ok(())
}

/// Invoke `after_completion` on all registered synchronizations.
pub fn trigger_after_completion(status: CompletionStatus) {
    invoke_after_completion(&registry::synchronizations(), status);
}

/// Invoke `after_completion` on the given synchronizations, logging failures
/// without interrupting the phase.
pub fn invoke_after_completion(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
    status: CompletionStatus,
) {
    for synchronization in synchronizations {
        if let Err(err) = synchronization.after_completion(status) {
            error!(
                error = %err,
                status = %status,
                "after-completion synchronization callback failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demarc_core::TransactionError;
    use std::cell::RefCell;

    struct Scripted {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail_after_completion: bool,
    }

    impl TransactionSynchronization for Scripted {
        fn before_commit(&self, read_only: bool) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:before-commit({read_only})", self.label));
            Ok(())
        }

        fn after_completion(&self, status: CompletionStatus) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:after-completion({status})", self.label));
            if self.fail_after_completion {
                return Err(TransactionError::system("injected after-completion failure"));
            }
            Ok(())
        }
    }

    #[test]
    fn before_commit_runs_in_registration_order() {
        registry::clear();
        registry::init_synchronization().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b", "c"] {
            registry::register_synchronization(Rc::new(Scripted {
                label,
                log: Rc::clone(&log),
                fail_after_completion: false,
            }))
            .unwrap();
        }

        trigger_before_commit(true).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["a:before-commit(true)", "b:before-commit(true)", "c:before-commit(true)"]
        );
        registry::clear();
    }

    #[test]
    fn after_completion_failure_does_not_stop_later_callbacks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let synchronizations: Vec<Rc<dyn TransactionSynchronization>> = vec![
            Rc::new(Scripted {
                label: "first",
                log: Rc::clone(&log),
                fail_after_completion: true,
            }),
            Rc::new(Scripted {
                label: "second",
                log: Rc::clone(&log),
                fail_after_completion: false,
            }),
        ];

        invoke_after_completion(&synchronizations, CompletionStatus::RolledBack);
        assert_eq!(
            *log.borrow(),
            vec![
                "first:after-completion(rolled_back)",
                "second:after-completion(rolled_back)"
            ]
        );
    }
}
