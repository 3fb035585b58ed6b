//! Sort stage.

use crate::stage::{Stage, StageContext, Step};
use rowflow_sort::{DeltaSortEngine, SortParams, SortPath};
use tracing::debug;

/// Builds `children_after_sort` for every changed node.
///
/// Delta sorting is used only for incremental runs, where the change set
/// and an active changed path describe exactly what moved.
#[derive(Clone, Default)]
pub struct SortStage {
    params: SortParams,
}

impl SortStage {
    pub fn new(params: SortParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SortParams {
        &self.params
    }
}

impl Stage for SortStage {
    fn step(&self) -> Step {
        Step::Sort
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["sort", "maintain_group_order", "delta_sort"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        let changes = if self.params.delta_sort && ctx.is_incremental() {
            ctx.change_set
        } else {
            None
        };
        let nodes = ctx.changed_nodes();
        let mut delta = 0usize;
        for &node in &nodes {
            let path = DeltaSortEngine::sort_node(ctx.tree, node, &self.params, changes, Some(&*ctx.changed_path));
            if path == SortPath::Delta {
                delta += 1;
            }
        }
        debug!(nodes = nodes.len(), delta, "sorted rows");
    }
}
