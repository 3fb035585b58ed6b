//! Row filtering stage.

use crate::stage::{Stage, StageContext, Step};
use rowflow_core::{ChildList, Record, RowHandle, RowTree};
use std::fmt;
use std::rc::Rc;

/// Predicate over a row's record.
pub type RowPredicate = Rc<dyn Fn(&Record) -> bool>;

/// Builds `children_after_filter` from `children_after_group`.
///
/// Synthetic group rows survive when any child survives. Data rows survive
/// when they pass the predicate or, in tree data, when any descendant does.
#[derive(Clone, Default)]
pub struct FilterStage {
    predicate: Option<RowPredicate>,
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("active", &self.predicate.is_some())
            .finish()
    }
}

impl FilterStage {
    pub fn new(predicate: Option<RowPredicate>) -> Self {
        Self { predicate }
    }

    pub fn is_active(&self) -> bool {
        self.predicate.is_some()
    }

    fn filter_node(&self, tree: &mut RowTree, node: RowHandle) {
        let entity = &tree[node];
        let upstream = entity.children_after_group.clone();
        let filtered = match &self.predicate {
            None => upstream,
            Some(predicate) => {
                let kept: Vec<RowHandle> = upstream
                    .iter()
                    .copied()
                    .filter(|&child| passes(tree, child, predicate))
                    .collect();
                reuse_if_equal(kept, &upstream, &entity.children_after_filter)
            }
        };
        tree[node].children_after_filter = filtered;
    }
}

fn passes(tree: &RowTree, child: RowHandle, predicate: &RowPredicate) -> bool {
    let entity = &tree[child];
    let has_survivors = entity.has_children() && !entity.children_after_filter.is_empty();
    if entity.is_detached() {
        return has_survivors;
    }
    entity.data.as_deref().is_some_and(|record| predicate(record)) || has_survivors
}

/// Returns `upstream` or `previous` when `kept` matches either, so unchanged
/// lists keep their identity.
pub(crate) fn reuse_if_equal(kept: Vec<RowHandle>, upstream: &ChildList, previous: &ChildList) -> ChildList {
    if kept.len() == upstream.len() {
        upstream.clone()
    } else if kept.as_slice() == previous.as_slice() {
        previous.clone()
    } else {
        Rc::new(kept)
    }
}

impl Stage for FilterStage {
    fn step(&self) -> Step {
        Step::Filter
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["filter"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        for node in ctx.changed_nodes() {
            self.filter_node(ctx.tree, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::GroupStage;
    use rowflow_core::{field_id_fn, ChangedPath, Value};
    use rowflow_store::NodeManager;

    fn run(stage: &mut dyn Stage, tree: &mut RowTree) {
        let mut path = ChangedPath::inactive(tree.root());
        let mut rows = Vec::new();
        let mut pending = None;
        let mut ctx = StageContext::new(tree, None, &mut path, &mut rows, &mut pending);
        stage.execute(&mut ctx);
    }

    fn manager() -> NodeManager {
        let mut manager = NodeManager::new().with_id_fn(field_id_fn("id"));
        manager.replace_all(
            [(1, "IE", 10), (2, "FR", 20), (3, "IE", 30)]
                .iter()
                .map(|&(id, c, v)| {
                    Record::new().with("id", id).with("country", c).with("v", v).into_ref()
                })
                .collect(),
        );
        manager
    }

    fn v_at_least(min: i64) -> RowPredicate {
        Rc::new(move |r: &Record| r.get("v").and_then(Value::as_i64).is_some_and(|v| v >= min))
    }

    #[test]
    fn test_no_predicate_shares_group_list() {
        let mut manager = manager();
        let tree = manager.tree_mut();
        run(&mut GroupStage::new(), tree);
        run(&mut FilterStage::new(None), tree);
        let root = tree.root();
        assert!(Rc::ptr_eq(&tree[root].children_after_group, &tree[root].children_after_filter));
    }

    #[test]
    fn test_groups_without_survivors_are_removed() {
        let mut manager = manager();
        let tree = manager.tree_mut();
        run(&mut GroupStage::by_fields(vec!["country".into()]), tree);
        run(&mut FilterStage::new(Some(v_at_least(25))), tree);

        let root = tree.root();
        let groups = tree[root].children_after_filter.clone();
        assert_eq!(groups.len(), 1);
        assert_eq!(tree[groups[0]].id, "row-group-country-IE");
        let kept = tree[groups[0]].children_after_filter.clone();
        assert_eq!(kept.len(), 1);
        assert_eq!(tree[kept[0]].id, "3");
    }

    #[test]
    fn test_tree_data_parent_kept_for_matching_child() {
        let child = Record::new().with("id", 2).with("v", 50).into_ref();
        let parent = Record::new().with("id", 1).with("v", 0).with_children(vec![child]).into_ref();
        let mut manager = NodeManager::new()
            .with_id_fn(field_id_fn("id"))
            .with_nested_children(rowflow_store::record_children_fn());
        manager.replace_all(vec![parent, Record::new().with("id", 3).with("v", 1).into_ref()]);

        let tree = manager.tree_mut();
        run(&mut GroupStage::tree_data(), tree);
        run(&mut FilterStage::new(Some(v_at_least(25))), tree);

        let root = tree.root();
        let top: Vec<String> = tree[root]
            .children_after_filter
            .iter()
            .map(|&h| tree[h].id.clone())
            .collect();
        assert_eq!(top, vec!["1"]);
    }
}
