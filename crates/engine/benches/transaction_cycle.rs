//! Benchmarks for the hot transaction paths

use criterion::{criterion_group, criterion_main, Criterion};
use demarc_core::{Propagation, TransactionDefinition};
use demarc_engine::testing::MemoryResourceManager;
use demarc_engine::TransactionManager;

fn bench_begin_commit_cycle(c: &mut Criterion) {
    let manager = TransactionManager::new(MemoryResourceManager::new());
    let definition = TransactionDefinition::default();

    c.bench_function("begin_commit_cycle", |b| {
        b.iter(|| {
            let mut status = manager.get_transaction(Some(&definition)).unwrap();
            manager.commit(&mut status).unwrap();
            manager.resource_manager().clear_events();
        })
    });
}

fn bench_participate_commit_cycle(c: &mut Criterion) {
    let manager = TransactionManager::new(MemoryResourceManager::new());
    let definition = TransactionDefinition::default();

    c.bench_function("participate_commit_cycle", |b| {
        b.iter(|| {
            let mut outer = manager.get_transaction(Some(&definition)).unwrap();
            let mut inner = manager.get_transaction(Some(&definition)).unwrap();
            manager.commit(&mut inner).unwrap();
            manager.commit(&mut outer).unwrap();
            manager.resource_manager().clear_events();
        })
    });
}

fn bench_empty_scope(c: &mut Criterion) {
    let manager = TransactionManager::new(MemoryResourceManager::new());
    let definition = TransactionDefinition::with_propagation(Propagation::Supports);

    c.bench_function("empty_scope_cycle", |b| {
        b.iter(|| {
            let mut status = manager.get_transaction(Some(&definition)).unwrap();
            manager.commit(&mut status).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_begin_commit_cycle,
    bench_participate_commit_cycle,
    bench_empty_scope
);
criterion_main!(benches);
