//! Delta sort engine.
//!
//! Produces a node's `children_after_sort` from its `children_after_agg_filter`.
//! When only a few children changed, only those are sorted and then merged with
//! the untouched children, which keep their previous relative order.

use crate::comparator::RowComparator;
use hashbrown::{HashMap, HashSet};
use rowflow_core::{ChangeSet, ChangedPath, ChildList, RowHandle, RowTree};
use std::cmp::Ordering;
use std::rc::Rc;
use tracing::trace;

/// Inputs of a sort pass.
#[derive(Clone, Default)]
pub struct SortParams {
    pub comparator: RowComparator,
    /// Fields the rows are grouped by.
    pub group_columns: Vec<String>,
    pub maintain_group_order: bool,
    pub pivot_mode: bool,
    pub delta_sort: bool,
}

impl SortParams {
    pub fn new(comparator: RowComparator) -> Self {
        Self {
            comparator,
            ..Self::default()
        }
    }
}

/// How a node's sorted children were produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortPath {
    /// Upstream array reused as is.
    Upstream,
    /// Previous group order kept, new children appended.
    MaintainedOrder,
    /// Every child sorted.
    Full,
    /// Touched children sorted and merged.
    Delta,
}

/// Stateless sorter for a node's children.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeltaSortEngine;

impl DeltaSortEngine {
    /// Computes the sorted children of `node` without touching the tree.
    pub fn sort(
        tree: &RowTree,
        node: RowHandle,
        params: &SortParams,
        changes: Option<&ChangeSet>,
        changed_path: Option<&ChangedPath>,
    ) -> (ChildList, SortPath) {
        let entity = &tree[node];
        let unsorted = &entity.children_after_agg_filter;

        if !params.comparator.is_active() || (params.pivot_mode && entity.leaf_group) {
            return (unsorted.clone(), SortPath::Upstream);
        }

        if params.maintain_group_order
            && entity.group
            && !entity.leaf_group
            && !params.comparator.references_any(&params.group_columns)
        {
            let sorted = maintain_order(unsorted, &entity.children_after_sort);
            return (sorted, SortPath::MaintainedOrder);
        }

        match changes {
            Some(changes) if params.delta_sort && !changes.reordered => {
                let sorted = delta_sort(
                    tree,
                    unsorted,
                    &entity.children_after_sort,
                    &params.comparator,
                    changes,
                    changed_path,
                );
                (sorted, SortPath::Delta)
            }
            _ => (full_sort(tree, unsorted, &params.comparator), SortPath::Full),
        }
    }

    /// Sorts `node`'s children in place and refreshes their child positions.
    pub fn sort_node(
        tree: &mut RowTree,
        node: RowHandle,
        params: &SortParams,
        changes: Option<&ChangeSet>,
        changed_path: Option<&ChangedPath>,
    ) -> SortPath {
        let (sorted, path) = Self::sort(tree, node, params, changes, changed_path);
        trace!(node = ?node, path = ?path, children = sorted.len(), "sorted children");
        update_child_positions(tree, &sorted);
        tree[node].children_after_sort = sorted;
        path
    }
}

/// Sets first/last/index on each child, emitting events only on change.
pub fn update_child_positions(tree: &mut RowTree, children: &[RowHandle]) {
    let last = children.len().saturating_sub(1);
    for (i, &child) in children.iter().enumerate() {
        tree.set_child_position(child, i == 0, i == last, Some(i));
    }
}

/// Stable sort of every child.
pub fn full_sort(tree: &RowTree, unsorted: &[RowHandle], comparator: &RowComparator) -> ChildList {
    let mut rows = unsorted.to_vec();
    rows.sort_by(|a, b| comparator.compare(tree, *a, *b));
    Rc::new(rows)
}

fn delta_sort(
    tree: &RowTree,
    unsorted: &ChildList,
    previous: &ChildList,
    comparator: &RowComparator,
    changes: &ChangeSet,
    changed_path: Option<&ChangedPath>,
) -> ChildList {
    let positions: HashMap<RowHandle, usize> =
        unsorted.iter().enumerate().map(|(i, &h)| (h, i)).collect();
    let compare = |a: &RowHandle, b: &RowHandle| -> Ordering {
        comparator
            .compare(tree, *a, *b)
            .then_with(|| positions[a].cmp(&positions[b]))
    };

    let mut touched = Vec::new();
    let mut untouched_set = HashSet::new();
    for &child in unsorted.iter() {
        let is_touched =
            changes.is_touched(child) || changed_path.is_some_and(|path| !path.can_skip(child));
        if is_touched {
            touched.push(child);
        } else {
            untouched_set.insert(child);
        }
    }

    let mut untouched = Vec::with_capacity(untouched_set.len());
    for &child in previous.iter() {
        if untouched_set.remove(&child) {
            untouched.push(child);
        }
    }
    // Untouched rows missing from the previous order are sorted with the touched ones.
    if !untouched_set.is_empty() {
        touched.extend(untouched_set);
    }

    touched.sort_by(|a, b| compare(a, b));

    let mut merged = Vec::with_capacity(unsorted.len());
    let (mut t, mut u) = (0, 0);
    while t < touched.len() && u < untouched.len() {
        if compare(&touched[t], &untouched[u]) == Ordering::Less {
            merged.push(touched[t]);
            t += 1;
        } else {
            merged.push(untouched[u]);
            u += 1;
        }
    }
    merged.extend_from_slice(&touched[t..]);
    merged.extend_from_slice(&untouched[u..]);

    if merged.as_slice() == previous.as_slice() {
        return previous.clone();
    }
    Rc::new(merged)
}

fn maintain_order(unsorted: &ChildList, previous: &ChildList) -> ChildList {
    let present: HashSet<RowHandle> = unsorted.iter().copied().collect();
    let mut kept: Vec<RowHandle> = previous.iter().copied().filter(|h| present.contains(h)).collect();

    if kept.len() == unsorted.len() {
        if kept.len() == previous.len() {
            return previous.clone();
        }
        return Rc::new(kept);
    }

    let kept_set: HashSet<RowHandle> = kept.iter().copied().collect();
    kept.extend(unsorted.iter().copied().filter(|h| !kept_set.contains(h)));
    Rc::new(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::SortOption;
    use rowflow_core::{Record, RowEntity, RowEventKind, Value};

    fn tree_with(values: &[(&str, i64)]) -> (RowTree, Vec<RowHandle>) {
        let mut tree = RowTree::new();
        let root = tree.root();
        let mut rows = Vec::new();
        for (id, v) in values {
            let record = Record::new().with("id", *id).with("v", *v).into_ref();
            let mut entity = RowEntity::new(*id, Some(record));
            entity.parent = Some(root);
            rows.push(tree.insert(entity));
        }
        tree[root].children_after_agg_filter = Rc::new(rows.clone());
        (tree, rows)
    }

    fn by_v() -> SortParams {
        let mut params = SortParams::new(RowComparator::new(vec![SortOption::asc("v")]));
        params.delta_sort = true;
        params
    }

    fn ids(tree: &RowTree, rows: &[RowHandle]) -> Vec<String> {
        rows.iter().map(|&h| tree[h].id.clone()).collect()
    }

    fn set_v(tree: &mut RowTree, row: RowHandle, v: i64) {
        let id = tree[row].id.clone();
        tree[row].update_data(Record::new().with("id", id).with("v", v).into_ref());
    }

    #[test]
    fn test_no_sort_reuses_upstream() {
        let (tree, _) = tree_with(&[("a", 2), ("b", 1)]);
        let root = tree.root();
        let params = SortParams::default();
        let (sorted, path) = DeltaSortEngine::sort(&tree, root, &params, None, None);
        assert_eq!(path, SortPath::Upstream);
        assert!(Rc::ptr_eq(&sorted, &tree[root].children_after_agg_filter));
    }

    #[test]
    fn test_full_sort_without_change_set() {
        let (tree, _) = tree_with(&[("a", 3), ("b", 1), ("c", 2)]);
        let root = tree.root();
        let (sorted, path) = DeltaSortEngine::sort(&tree, root, &by_v(), None, None);
        assert_eq!(path, SortPath::Full);
        assert_eq!(ids(&tree, &sorted), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_delta_moves_updated_row() {
        // previous order [b, a, c]; a moves above c
        let (mut tree, rows) = tree_with(&[("a", 2), ("b", 1), ("c", 3)]);
        let root = tree.root();
        let params = by_v();
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
        assert_eq!(ids(&tree, &tree[root].children_after_sort), vec!["b", "a", "c"]);

        let a = rows[0];
        set_v(&mut tree, a, 4);
        let mut changes = ChangeSet::new();
        changes.update(a);
        let path = ChangedPath::new(root);

        let (delta, kind) = DeltaSortEngine::sort(&tree, root, &params, Some(&changes), Some(&path));
        assert_eq!(kind, SortPath::Delta);
        assert_eq!(ids(&tree, &delta), vec!["b", "c", "a"]);

        let full = full_sort(&tree, &tree[root].children_after_agg_filter, &params.comparator);
        assert_eq!(delta, full);
    }

    #[test]
    fn test_delta_with_empty_change_returns_same_list() {
        let (mut tree, _) = tree_with(&[("a", 2), ("b", 1), ("c", 3)]);
        let root = tree.root();
        let params = by_v();
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
        let before = tree[root].children_after_sort.clone();

        let changes = ChangeSet::new();
        let path = ChangedPath::new(root);
        let (after, _) = DeltaSortEngine::sort(&tree, root, &params, Some(&changes), Some(&path));
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_delta_handles_added_and_removed() {
        let (mut tree, rows) = tree_with(&[("a", 1), ("b", 3), ("c", 5)]);
        let root = tree.root();
        let params = by_v();
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);

        let record = Record::new().with("id", "d").with("v", 4).into_ref();
        let d = tree.insert(RowEntity::new("d", Some(record)));
        // drop b, add d
        tree[root].children_after_agg_filter = Rc::new(vec![rows[0], rows[2], d]);
        let mut changes = ChangeSet::new();
        changes.add(d);
        changes.remove(rows[1]);

        let (sorted, _) = DeltaSortEngine::sort(&tree, root, &params, Some(&changes), None);
        assert_eq!(ids(&tree, &sorted), vec!["a", "d", "c"]);
    }

    #[test]
    fn test_ties_break_on_unsorted_position() {
        let (mut tree, rows) = tree_with(&[("a", 1), ("b", 1), ("c", 1)]);
        let root = tree.root();
        let params = by_v();
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);

        let mut changes = ChangeSet::new();
        for &row in &rows {
            changes.update(row);
        }
        let (sorted, _) = DeltaSortEngine::sort(&tree, root, &params, Some(&changes), None);
        assert_eq!(ids(&tree, &sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reordered_change_set_falls_back_to_full() {
        let (tree, _) = tree_with(&[("a", 2), ("b", 1)]);
        let root = tree.root();
        let mut changes = ChangeSet::new();
        changes.reordered = true;
        let (_, path) = DeltaSortEngine::sort(&tree, root, &by_v(), Some(&changes), None);
        assert_eq!(path, SortPath::Full);
    }

    #[test]
    fn test_maintain_group_order() {
        let (mut tree, rows) = tree_with(&[("a", 3), ("b", 1), ("c", 2)]);
        let root = tree.root();
        let mut params = by_v();
        params.maintain_group_order = true;
        params.group_columns = vec!["country".to_string()];
        tree[root].children_after_sort = Rc::new(vec![rows[2], rows[0], rows[1]]);

        let before = tree[root].children_after_sort.clone();
        let (same, path) = DeltaSortEngine::sort(&tree, root, &params, None, None);
        assert_eq!(path, SortPath::MaintainedOrder);
        assert!(Rc::ptr_eq(&before, &same));

        let record = Record::new().with("id", "d").with("v", 0).into_ref();
        let d = tree.insert(RowEntity::new("d", Some(record)));
        tree[root].children_after_agg_filter = Rc::new(vec![d, rows[0], rows[2]]);
        let (sorted, _) = DeltaSortEngine::sort(&tree, root, &params, None, None);
        assert_eq!(ids(&tree, &sorted), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_sort_on_group_column_ignores_maintain_order() {
        let (mut tree, _) = tree_with(&[("a", 3), ("b", 1)]);
        let root = tree.root();
        let mut params = by_v();
        params.maintain_group_order = true;
        params.group_columns = vec!["v".to_string()];
        tree[root].children_after_sort = tree[root].children_after_agg_filter.clone();
        let (sorted, path) = DeltaSortEngine::sort(&tree, root, &params, None, None);
        assert_eq!(path, SortPath::Full);
        assert_eq!(ids(&tree, &sorted), vec!["b", "a"]);
    }

    #[test]
    fn test_pivot_leaf_group_not_sorted() {
        let (mut tree, _) = tree_with(&[("a", 3), ("b", 1)]);
        let root = tree.root();
        tree[root].leaf_group = true;
        let mut params = by_v();
        params.pivot_mode = true;
        let (_, path) = DeltaSortEngine::sort(&tree, root, &params, None, None);
        assert_eq!(path, SortPath::Upstream);
    }

    #[test]
    fn test_child_positions_emit_only_changes() {
        let (mut tree, rows) = tree_with(&[("a", 2), ("b", 1)]);
        let root = tree.root();
        let params = by_v();
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
        assert!(tree[rows[1]].first_child);
        assert!(tree[rows[0]].last_child);
        assert_eq!(tree[rows[0]].child_index, Some(1));
        tree.take_events();

        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
        assert!(tree.take_events().is_empty());

        set_v(&mut tree, rows[0], 0);
        DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
        let events = tree.take_events();
        assert!(events
            .iter()
            .any(|e| e.row == rows[0] && e.kind == RowEventKind::FirstChildChanged));
        assert!(events
            .iter()
            .any(|e| e.row == rows[1] && e.kind == RowEventKind::ChildIndexChanged));
        assert_eq!(tree[rows[0]].value_source().and_then(|r| r.get("v")), Some(&Value::from(0)));
    }
}
