//! Aggregate filtering stage.

use crate::stage::{Stage, StageContext, Step};
use crate::stages::filter::{reuse_if_equal, RowPredicate};
use rowflow_core::{RowHandle, RowTree};
use std::fmt;

/// Builds `children_after_agg_filter`, dropping groups whose aggregated
/// values fail the predicate. Data rows always pass.
#[derive(Clone, Default)]
pub struct FilterAggregatesStage {
    predicate: Option<RowPredicate>,
}

impl fmt::Debug for FilterAggregatesStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterAggregatesStage")
            .field("active", &self.predicate.is_some())
            .finish()
    }
}

impl FilterAggregatesStage {
    pub fn new(predicate: Option<RowPredicate>) -> Self {
        Self { predicate }
    }

    fn filter_node(&self, tree: &mut RowTree, node: RowHandle) {
        let entity = &tree[node];
        let upstream = entity.children_after_filter.clone();
        let filtered = match &self.predicate {
            None => upstream,
            Some(predicate) => {
                let kept: Vec<RowHandle> = upstream
                    .iter()
                    .copied()
                    .filter(|&child| {
                        let child = &tree[child];
                        !child.group || child.value_source().is_some_and(|r| predicate(r))
                    })
                    .collect();
                reuse_if_equal(kept, &upstream, &entity.children_after_agg_filter)
            }
        };
        tree[node].children_after_agg_filter = filtered;
    }
}

impl Stage for FilterAggregatesStage {
    fn step(&self) -> Step {
        Step::FilterAggregates
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["aggregate_filter"]
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
    use crate::stages::{sum_fields, AggregateStage, FilterStage, GroupStage};
    use rowflow_core::{field_id_fn, ChangedPath, Record, Value};
    use rowflow_store::NodeManager;
    use std::rc::Rc;

    fn run(stage: &mut dyn Stage, tree: &mut RowTree) {
        let mut path = ChangedPath::inactive(tree.root());
        let mut rows = Vec::new();
        let mut pending = None;
        let mut ctx = StageContext::new(tree, None, &mut path, &mut rows, &mut pending);
        stage.execute(&mut ctx);
    }

    #[test]
    fn test_groups_filtered_on_aggregate() {
        let mut manager = NodeManager::new().with_id_fn(field_id_fn("id"));
        manager.replace_all(
            [(1, "IE", 10), (2, "FR", 20), (3, "IE", 30)]
                .iter()
                .map(|&(id, c, v)| {
                    Record::new().with("id", id).with("country", c).with("v", v).into_ref()
                })
                .collect(),
        );
        let tree = manager.tree_mut();
        run(&mut GroupStage::by_fields(vec!["country".into()]), tree);
        run(&mut FilterStage::new(None), tree);
        run(&mut AggregateStage::new(Some(sum_fields(&["v"]))), tree);

        let over_30: RowPredicate =
            Rc::new(|r: &Record| r.get("v").and_then(Value::as_i64).is_some_and(|v| v > 30));
        run(&mut FilterAggregatesStage::new(Some(over_30)), tree);

        let root = tree.root();
        let groups = tree[root].children_after_agg_filter.clone();
        assert_eq!(groups.len(), 1);
        assert_eq!(tree[groups[0]].id, "row-group-country-IE");
        // leaves inside a surviving group are kept
        assert_eq!(tree[groups[0]].children_after_agg_filter.len(), 2);
    }

    #[test]
    fn test_no_predicate_shares_filter_list() {
        let mut tree = RowTree::new();
        run(&mut FilterAggregatesStage::default(), &mut tree);
        let root = tree.root();
        assert!(Rc::ptr_eq(
            &tree[root].children_after_filter,
            &tree[root].children_after_agg_filter
        ));
    }
}
