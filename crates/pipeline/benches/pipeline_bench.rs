//! Benchmarks for rowflow-pipeline.
//!
//! Compares refreshing after a single-row transaction against a full run.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowflow_core::{field_id_fn, ChangeSet, Record, RecordRef};
use rowflow_pipeline::stages::{sum_fields, AggregateStage, GroupStage, SortStage};
use rowflow_pipeline::{PipelineOrchestrator, RefreshParams, Step};
use rowflow_sort::{RowComparator, SortOption, SortParams};
use rowflow_store::{NodeManager, Transaction};

fn record(id: i64, v: i64) -> RecordRef {
    Record::new()
        .with("id", id)
        .with("key", format!("k{}", id % 20))
        .with("v", v)
        .into_ref()
}

fn setup(size: i64) -> (NodeManager, PipelineOrchestrator) {
    let mut manager = NodeManager::new().with_id_fn(field_id_fn("id"));
    manager.replace_all((0..size).map(|i| record(i, (i * 7919) % size)).collect());

    let mut params = SortParams::new(RowComparator::new(vec![SortOption::asc("v")]));
    params.delta_sort = true;
    let mut pipeline = PipelineOrchestrator::with_default_stages()
        .with_stage(Box::new(GroupStage::by_fields(vec!["key".into()]).with_default_expanded(-1)))
        .with_stage(Box::new(AggregateStage::new(Some(sum_fields(&["v"])))))
        .with_stage(Box::new(SortStage::new(params)));
    pipeline.refresh_model(manager.tree_mut(), RefreshParams::new(Step::Everything));
    (manager, pipeline)
}

fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/refresh");

    for size in [1000i64, 10000] {
        let (mut manager, mut pipeline) = setup(size);
        group.bench_with_input(BenchmarkId::new("everything", size), &size, |b, _| {
            b.iter(|| {
                pipeline.refresh_model(
                    black_box(manager.tree_mut()),
                    RefreshParams::new(Step::Everything),
                )
            })
        });

        let (mut manager, mut pipeline) = setup(size);
        let mut v = 0i64;
        group.bench_with_input(BenchmarkId::new("single_update", size), &size, |b, _| {
            b.iter(|| {
                v += 1;
                let mut changes = ChangeSet::new();
                let tx = Transaction::new().update([record(size / 2, v % size)]);
                manager.apply_transaction(&tx, &mut changes);
                pipeline.refresh_model(
                    black_box(manager.tree_mut()),
                    RefreshParams::new(Step::Group).with_change_set(changes),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_refresh);
criterion_main!(benches);
