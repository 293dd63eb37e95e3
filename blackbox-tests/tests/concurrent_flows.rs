//! Concurrent flows through one engine instance
//!
//! The engine itself holds only immutable configuration; everything per-flow
//! lives in the thread-local registry. Two flows driving the same engine
//! concurrently must never observe each other's registry contents.

use demarc_context::registry;
use demarc_core::{Propagation, TransactionDefinition};
use demarc_engine::testing::{shared_log, MemoryResourceManager, RecordingSynchronization};
use demarc_engine::TransactionManager;
use std::rc::Rc;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn flows_through_the_same_engine_do_not_share_registry_state() {
    let engine = Arc::new(TransactionManager::new(MemoryResourceManager::new()));
    // Empty scopes keep the shared in-memory resource idle, so the two flows
    // interact with nothing but their own registries.
    let definition = TransactionDefinition::with_propagation(Propagation::Supports);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["flow-a", "flow-b"]
        .into_iter()
        .map(|flow| {
            let engine = Arc::clone(&engine);
            let definition = definition.clone().named(flow);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let log = shared_log();
                let mut status = engine.get_transaction(Some(&definition)).unwrap();
                registry::register_synchronization(Rc::new(RecordingSynchronization::new(
                    flow,
                    Arc::clone(&log),
                )))
                .unwrap();

                // Both flows are mid-transaction at this point.
                barrier.wait();

                assert_eq!(registry::current_name().as_deref(), Some(flow));
                assert_eq!(registry::synchronizations().len(), 1);

                barrier.wait();
                engine.commit(&mut status).unwrap();
                assert!(!registry::is_synchronization_active());

                // Only this flow's synchronization fired, with this flow's
                // label.
                let trace = log.lock().clone();
                assert!(trace
                    .iter()
                    .all(|event| event.starts_with(&format!("{flow}:"))));
                assert!(trace.contains(&format!("{flow}:after-completion(committed)")));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
