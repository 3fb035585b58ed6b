//! Stage interface and execution context.

use rowflow_core::{ChangeSet, ChangedPath, RowHandle, RowTree};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline steps, in execution order.
///
/// Requesting a step runs it and every step after it. `Everything` runs the
/// whole chain with every node treated as changed; `Nothing` runs no stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Everything,
    Group,
    Filter,
    Pivot,
    Aggregate,
    FilterAggregates,
    Sort,
    Map,
    Nothing,
}

impl Step {
    /// Stage steps in execution order.
    pub const STAGES: [Step; 7] = [
        Step::Group,
        Step::Filter,
        Step::Pivot,
        Step::Aggregate,
        Step::FilterAggregates,
        Step::Sort,
        Step::Map,
    ];

    /// Returns the earlier of two steps.
    #[inline]
    pub fn earliest(self, other: Step) -> Step {
        self.min(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Everything => "everything",
            Step::Group => "group",
            Step::Filter => "filter",
            Step::Pivot => "pivot",
            Step::Aggregate => "aggregate",
            Step::FilterAggregates => "filter_aggregates",
            Step::Sort => "sort",
            Step::Map => "map",
            Step::Nothing => "nothing",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one pipeline run.
#[derive(Clone, Debug)]
pub struct RefreshParams {
    pub step: Step,
    /// Rows touched by the mutation that triggered the run.
    pub change_set: Option<ChangeSet>,
    pub new_data: bool,
    pub keep_render_rows: bool,
    pub animate: bool,
}

impl RefreshParams {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            change_set: None,
            new_data: false,
            keep_render_rows: false,
            animate: false,
        }
    }

    pub fn with_change_set(mut self, change_set: ChangeSet) -> Self {
        self.change_set = Some(change_set);
        self
    }

    pub fn with_new_data(mut self, new_data: bool) -> Self {
        self.new_data = new_data;
        self
    }

    pub fn with_keep_render_rows(mut self, keep: bool) -> Self {
        self.keep_render_rows = keep;
        self
    }

    pub fn with_animate(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }
}

/// Everything a stage may read or mutate during `execute`.
pub struct StageContext<'a> {
    pub tree: &'a mut RowTree,
    pub change_set: Option<&'a ChangeSet>,
    pub changed_path: &'a mut ChangedPath,
    /// Output of the map stage.
    pub rows_to_display: &'a mut Vec<RowHandle>,
    pub animate: bool,
    pending: &'a mut Option<Step>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        tree: &'a mut RowTree,
        change_set: Option<&'a ChangeSet>,
        changed_path: &'a mut ChangedPath,
        rows_to_display: &'a mut Vec<RowHandle>,
        pending: &'a mut Option<Step>,
    ) -> Self {
        Self {
            tree,
            change_set,
            changed_path,
            rows_to_display,
            animate: false,
            pending,
        }
    }

    /// Asks for another run once the current one completes.
    ///
    /// Requests made while a run is in progress are coalesced into one
    /// follow-up run that starts from `Step::Group`.
    pub fn request_refresh(&mut self, step: Step) {
        *self.pending = Some(match *self.pending {
            Some(pending) => pending.earliest(step),
            None => step,
        });
    }

    /// Returns true if a follow-up run has been requested.
    pub fn refresh_requested(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns true when only changed nodes need processing.
    #[inline]
    pub fn is_incremental(&self) -> bool {
        self.change_set.is_some() && self.changed_path.is_active()
    }

    /// Nodes with children to process, children before parents.
    pub fn changed_nodes(&self) -> Vec<RowHandle> {
        self.changed_path.changed_nodes_depth_first(&*self.tree, false, false)
    }
}

/// One transformation of the row tree.
///
/// A stage reads the child lists written by the stages before it and writes
/// its own. Stages must be idempotent for identical input.
pub trait Stage {
    /// The step this stage implements.
    fn step(&self) -> Step;

    /// Property names whose change requires this stage to run again.
    fn refresh_props(&self) -> &[&'static str] {
        &[]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>);
}
