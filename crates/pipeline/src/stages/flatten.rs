//! Flatten stage.
//!
//! Walks the sorted tree and lists the rows to display: every child of an
//! expanded node, depth first, with optional footers after expanded groups
//! and a grand total footer at the end.

use crate::stage::{Stage, StageContext, Step};
use rowflow_core::{RowEntity, RowHandle, RowTree};
use tracing::trace;

#[derive(Clone, Copy, Debug, Default)]
pub struct FlattenStage {
    group_footers: bool,
    grand_total_footer: bool,
}

impl FlattenStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group_footers(mut self, enabled: bool) -> Self {
        self.group_footers = enabled;
        self
    }

    pub fn with_grand_total_footer(mut self, enabled: bool) -> Self {
        self.grand_total_footer = enabled;
        self
    }

    fn flatten(&self, tree: &mut RowTree, node: RowHandle, rows: &mut Vec<RowHandle>) {
        let children = tree[node].children_after_sort.clone();
        for &child in children.iter() {
            rows.push(child);
            let entity = &tree[child];
            if !entity.has_children() || !entity.expanded {
                continue;
            }
            let synthetic_group = entity.group && entity.is_detached();
            self.flatten(tree, child, rows);
            if self.group_footers && synthetic_group {
                rows.push(ensure_footer(tree, child));
            }
        }
    }
}

/// Returns the group's footer, creating it on first use and refreshing its
/// aggregated values otherwise.
fn ensure_footer(tree: &mut RowTree, group: RowHandle) -> RowHandle {
    if let Some(footer) = tree[group].sibling.filter(|f| tree.contains(*f)) {
        let agg = tree[group].agg_data.clone();
        tree[footer].agg_data = agg;
        return footer;
    }
    let footer = tree.insert(RowEntity::footer_of(&tree[group], group));
    tree[group].sibling = Some(footer);
    trace!(group = %tree[group].id, "created footer row");
    footer
}

impl Stage for FlattenStage {
    fn step(&self) -> Step {
        Step::Map
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["group_footers", "grand_total_footer"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        let tree = &mut *ctx.tree;
        let root = tree.root();
        let mut rows = Vec::with_capacity(ctx.rows_to_display.len());
        self.flatten(tree, root, &mut rows);
        if self.grand_total_footer && !rows.is_empty() {
            rows.push(ensure_footer(tree, root));
        }
        *ctx.rows_to_display = rows;
    }
}
