//! Benchmarks for rowflow-sort.
//!
//! Compares a delta sort touching a handful of rows against a full re-sort.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowflow_core::{ChangeSet, ChangedPath, Record, RowEntity, RowHandle, RowTree};
use rowflow_sort::{full_sort, DeltaSortEngine, RowComparator, SortOption, SortParams};
use std::rc::Rc;

fn build(size: usize) -> (RowTree, Vec<RowHandle>, SortParams) {
    let mut tree = RowTree::new();
    let root = tree.root();
    let rows: Vec<RowHandle> = (0..size)
        .map(|i| {
            let v = ((i * 7919) % size) as i64;
            let record = Record::new().with("id", i as i64).with("v", v).into_ref();
            let mut entity = RowEntity::new(i.to_string(), Some(record));
            entity.parent = Some(root);
            tree.insert(entity)
        })
        .collect();
    tree[root].children_after_agg_filter = Rc::new(rows.clone());

    let mut params = SortParams::new(RowComparator::new(vec![SortOption::asc("v")]));
    params.delta_sort = true;
    DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
    (tree, rows, params)
}

fn bench_full_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/full");

    for size in [100, 1000, 10000] {
        let (tree, _, params) = build(size);
        let root = tree.root();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                full_sort(
                    black_box(&tree),
                    &tree[root].children_after_agg_filter,
                    &params.comparator,
                )
            })
        });
    }

    group.finish();
}

fn bench_delta_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/delta");

    for size in [100, 1000, 10000] {
        let (mut tree, rows, params) = build(size);
        let root = tree.root();

        let mut changes = ChangeSet::new();
        for &row in rows.iter().step_by((size / 10).max(1)) {
            let record = Record::new().with("v", -1i64).into_ref();
            tree[row].update_data(record);
            changes.update(row);
        }
        let path = ChangedPath::new(root);

        group.bench_with_input(BenchmarkId::new("ten_touched", size), &size, |b, _| {
            b.iter(|| {
                DeltaSortEngine::sort(black_box(&tree), root, &params, Some(&changes), Some(&path))
            })
        });
    }

    group.finish();
}

fn bench_delta_noop(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/delta_noop");

    for size in [1000, 10000] {
        let (tree, _, params) = build(size);
        let root = tree.root();
        let changes = ChangeSet::new();
        let path = ChangedPath::new(root);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                DeltaSortEngine::sort(black_box(&tree), root, &params, Some(&changes), Some(&path))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_sort, bench_delta_sort, bench_delta_noop);
criterion_main!(benches);
