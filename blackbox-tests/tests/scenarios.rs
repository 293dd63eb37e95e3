//! End-to-end transaction scenarios
//!
//! Each test is a complete caller-visible story: scopes obtained through the
//! public API, synchronizations registered through the registry, and the
//! combined trace of resource operations and callbacks asserted in full.

use demarc_context::registry;
use demarc_core::{IsolationLevel, Propagation, ResourceManager, TransactionDefinition};
use demarc_engine::testing::{events, MemoryResourceManager, RecordingSynchronization};
use demarc_engine::{EngineConfig, TransactionManager};
use parking_lot::Mutex;
use std::rc::Rc;
use std::sync::Arc;

fn register(label: &str, log: &Arc<Mutex<Vec<String>>>) {
    registry::register_synchronization(Rc::new(RecordingSynchronization::new(
        label,
        Arc::clone(log),
    )))
    .unwrap();
}

#[test]
fn required_on_top_of_nothing_commits_with_the_full_callback_sequence() {
    let engine = TransactionManager::new(MemoryResourceManager::new());
    let log = engine.resource_manager().log_handle();

    let mut status = engine.get_transaction(None).unwrap();
    assert!(status.is_new_transaction());
    assert!(status.is_new_synchronization());
    assert!(registry::is_actual_transaction_active());

    register("a", &log);
    engine.commit(&mut status).unwrap();

    assert_eq!(
        events(&log),
        vec![
            "begin",
            "prepare",
            "a:before-commit(false)",
            "a:before-completion",
            "commit",
            "a:after-commit",
            "a:after-completion(committed)",
            "cleanup"
        ]
    );
    assert!(!registry::is_synchronization_active());
    assert!(!registry::is_actual_transaction_active());
    assert_eq!(registry::current_name(), None);
}

#[test]
fn requires_new_displaces_the_outer_transaction_and_reinstates_it() {
    let engine = TransactionManager::new(MemoryResourceManager::new());
    let log = engine.resource_manager().log_handle();

    let mut outer = engine.get_transaction(None).unwrap();
    register("a", &log);

    let def = TransactionDefinition::with_propagation(Propagation::RequiresNew);
    let mut inner = engine.get_transaction(Some(&def)).unwrap();
    assert!(inner.is_new_transaction());

    // The outer synchronization was suspended and is invisible while the
    // inner transaction runs.
    assert!(registry::synchronizations().is_empty());
    register("b", &log);

    engine.commit(&mut inner).unwrap();
    engine.commit(&mut outer).unwrap();

    assert_eq!(
        events(&log),
        vec![
            // Outer transaction begins.
            "begin",
            // Inner scope displaces it: synchronizations first, then the
            // resource-level suspend, then the fresh physical begin.
            "a:suspend",
            "suspend",
            "begin",
            // Inner commit: only `b` observes it.
            "prepare",
            "b:before-commit(false)",
            "b:before-completion",
            "commit",
            "b:after-commit",
            "b:after-completion(committed)",
            "cleanup",
            // The outer transaction is reinstated.
            "resume",
            "a:resume",
            // Outer commit: only `a` observes it.
            "prepare",
            "a:before-commit(false)",
            "a:before-completion",
            "commit",
            "a:after-commit",
            "a:after-completion(committed)",
            "cleanup"
        ]
    );
    assert!(registry::synchronizations().is_empty());
    assert!(!registry::is_synchronization_active());
}

#[test]
fn nested_savepoint_scope_rolls_back_without_aborting_the_outer_transaction() {
    let engine = TransactionManager::with_config(
        MemoryResourceManager::new(),
        EngineConfig::default().with_nested_transaction_allowed(true),
    );

    let mut outer = engine.get_transaction(None).unwrap();

    let def = TransactionDefinition::with_propagation(Propagation::Nested);
    let mut inner = engine.get_transaction(Some(&def)).unwrap();
    assert!(inner.has_savepoint());
    assert!(!inner.is_new_transaction());

    inner.set_rollback_only();
    engine.commit(&mut inner).unwrap();
    assert!(inner.is_completed());

    // The outer transaction survived the nested rollback and commits.
    assert!(engine.resource_manager().is_active());
    engine.commit(&mut outer).unwrap();

    assert_eq!(
        engine.resource_manager().events(),
        vec![
            "begin",
            "create-savepoint",
            "rollback-to-savepoint",
            "release-savepoint",
            "prepare",
            "commit",
            "cleanup"
        ]
    );
}

#[test]
fn globally_poisoned_transaction_turns_commit_into_unexpected_rollback() {
    let engine = TransactionManager::new(MemoryResourceManager::new());
    let log = engine.resource_manager().log_handle();

    let mut status = engine.get_transaction(None).unwrap();
    register("a", &log);

    let transaction = status.transaction_mut().unwrap();
    engine
        .resource_manager()
        .set_rollback_only(transaction)
        .unwrap();

    let err = engine.commit(&mut status).unwrap_err();
    assert!(err.is_unexpected_rollback());
    assert!(status.is_completed());

    let trace = events(&log);
    let rollback = trace.iter().position(|e| e == "rollback").unwrap();
    let after = trace
        .iter()
        .position(|e| e == "a:after-completion(rolled_back)")
        .unwrap();
    assert!(rollback < after);
    assert!(!trace.contains(&"commit".to_string()));
}

#[test]
fn participation_with_mismatched_isolation_is_rejected_when_validating() {
    let engine = TransactionManager::with_config(
        MemoryResourceManager::new(),
        EngineConfig::default().with_validate_existing_transaction(true),
    );

    let outer_def = TransactionDefinition::default().isolation(IsolationLevel::ReadCommitted);
    let mut outer = engine.get_transaction(Some(&outer_def)).unwrap();

    let inner_def = TransactionDefinition::default().isolation(IsolationLevel::Serializable);
    let err = engine.get_transaction(Some(&inner_def)).unwrap_err();
    assert!(err.is_illegal_state());

    // The registry still describes the outer transaction.
    assert_eq!(
        registry::current_isolation(),
        Some(IsolationLevel::ReadCommitted)
    );
    assert!(registry::is_actual_transaction_active());

    engine.commit(&mut outer).unwrap();
}

#[test]
fn mandatory_without_a_transaction_is_rejected_and_leaves_no_trace() {
    let engine = TransactionManager::new(MemoryResourceManager::new());

    let def = TransactionDefinition::with_propagation(Propagation::Mandatory);
    let err = engine.get_transaction(Some(&def)).unwrap_err();
    assert!(err.is_illegal_state());

    assert!(engine.resource_manager().events().is_empty());
    assert!(!registry::is_synchronization_active());
    assert!(!registry::is_actual_transaction_active());
    assert_eq!(registry::current_name(), None);
}

#[test]
fn resource_bindings_survive_a_transaction_and_are_owned_by_their_binder() {
    let engine = TransactionManager::new(MemoryResourceManager::new());
    let key = demarc_context::ResourceKey::new();

    // Resource-manager code binds a holder for the duration of its work.
    registry::bind_resource(key, Arc::new("session-handle".to_string())).unwrap();

    let mut status = engine.get_transaction(None).unwrap();
    assert!(registry::has_resource(key));
    engine.commit(&mut status).unwrap();

    // Completion tears down synchronization state but not bindings.
    assert!(registry::has_resource(key));
    let holder = registry::unbind_resource(key).unwrap();
    assert_eq!(*holder.downcast::<String>().unwrap(), "session-handle");
}
