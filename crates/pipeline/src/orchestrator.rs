//! Pipeline orchestrator.
//!
//! Owns the ordered stage list and runs it from the earliest step a change
//! requires. After every run it republishes display positions: each
//! displayed row gets its index and pixel top, and rows no longer displayed
//! lose theirs.

use crate::stage::{RefreshParams, Stage, StageContext, Step};
use crate::stages::{
    AggregateStage, FilterAggregatesStage, FilterStage, FlattenStage, GroupStage, PivotStage,
    SortStage,
};
use hashbrown::{HashMap, HashSet};
use rowflow_core::{ChangedPath, ModelUpdatedEvent, RowEntity, RowHandle, RowTree};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Default row height in pixels.
pub const DEFAULT_ROW_HEIGHT: u32 = 25;

/// Follow-up runs allowed for one `refresh_model` call.
const MAX_FOLLOW_UP_RUNS: usize = 8;

/// Height of a row, or `None` when not known yet.
pub type RowHeightFn = Rc<dyn Fn(&RowEntity) -> Option<u32>>;

/// Runs stages in step order and tracks the rows to display.
pub struct PipelineOrchestrator {
    stages: Vec<Box<dyn Stage>>,
    /// Property name -> step of the stage that declared it.
    prop_steps: HashMap<&'static str, Step>,
    rows_to_display: Vec<RowHandle>,
    row_height: u32,
    row_height_fn: Option<RowHeightFn>,
    pending: Option<Step>,
    refreshing: bool,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("stages", &self.steps())
            .field("rows", &self.rows_to_display.len())
            .field("row_height", &self.row_height)
            .finish()
    }
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator without stages.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            prop_steps: HashMap::new(),
            rows_to_display: Vec::new(),
            row_height: DEFAULT_ROW_HEIGHT,
            row_height_fn: None,
            pending: None,
            refreshing: false,
        }
    }

    /// Creates an orchestrator with every built-in stage in pass-through
    /// configuration: flat rows, no filter, no aggregation, no sort.
    pub fn with_default_stages() -> Self {
        Self::new()
            .with_stage(Box::new(GroupStage::new()))
            .with_stage(Box::new(FilterStage::default()))
            .with_stage(Box::new(PivotStage::default()))
            .with_stage(Box::new(AggregateStage::default()))
            .with_stage(Box::new(FilterAggregatesStage::default()))
            .with_stage(Box::new(SortStage::default()))
            .with_stage(Box::new(FlattenStage::new()))
    }

    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.set_stage(stage);
        self
    }

    pub fn with_row_height(mut self, height: u32) -> Self {
        self.row_height = height;
        self
    }

    pub fn with_row_height_fn(mut self, height_fn: RowHeightFn) -> Self {
        self.row_height_fn = Some(height_fn);
        self
    }

    /// Installs a stage, replacing the one registered for the same step.
    /// Returns the replaced stage.
    pub fn set_stage(&mut self, stage: Box<dyn Stage>) -> Option<Box<dyn Stage>> {
        let step = stage.step();
        let replaced = match self.stages.iter().position(|s| s.step() >= step) {
            Some(i) if self.stages[i].step() == step => Some(std::mem::replace(&mut self.stages[i], stage)),
            Some(i) => {
                self.stages.insert(i, stage);
                None
            }
            None => {
                self.stages.push(stage);
                None
            }
        };
        self.rebuild_prop_steps();
        replaced
    }

    fn rebuild_prop_steps(&mut self) {
        self.prop_steps.clear();
        for stage in &self.stages {
            for &prop in stage.refresh_props() {
                self.prop_steps.entry(prop).or_insert(stage.step());
            }
        }
    }

    /// Steps of the registered stages, in order.
    pub fn steps(&self) -> Vec<Step> {
        self.stages.iter().map(|s| s.step()).collect()
    }

    /// Returns the earliest step affected by the changed properties, or
    /// `Step::Nothing` when no stage declared any of them.
    pub fn step_for_properties(&self, props: &[&str]) -> Step {
        props
            .iter()
            .filter_map(|p| self.prop_steps.get(*p).copied())
            .min()
            .unwrap_or(Step::Nothing)
    }

    /// Returns true while a run is in progress.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Runs the pipeline from `params.step`.
    ///
    /// Refreshes requested by stages during the run are coalesced and run
    /// afterwards from `Step::Group`. Returns `None` for `Step::Nothing`.
    pub fn refresh_model(&mut self, tree: &mut RowTree, params: RefreshParams) -> Option<ModelUpdatedEvent> {
        if self.refreshing {
            self.pending = Some(self.pending.map_or(params.step, |p| p.earliest(params.step)));
            return None;
        }
        if params.step == Step::Nothing {
            return None;
        }

        self.refreshing = true;
        let mut event = self.run(tree, &params);
        let mut follow_ups = 0;
        while let Some(requested) = self.pending.take() {
            if follow_ups == MAX_FOLLOW_UP_RUNS {
                warn!(requested = %requested, "refresh requested again after too many follow-up runs, dropping it");
                break;
            }
            follow_ups += 1;
            debug!(requested = %requested, "running coalesced refresh");
            let follow_up = RefreshParams::new(Step::Group)
                .with_animate(params.animate)
                .with_keep_render_rows(params.keep_render_rows);
            event = self.run(tree, &follow_up);
            event.new_data |= params.new_data;
        }
        self.refreshing = false;
        Some(event)
    }

    fn run(&mut self, tree: &mut RowTree, params: &RefreshParams) -> ModelUpdatedEvent {
        let root = tree.root();
        let step = params.step;
        let mut changed_path = match &params.change_set {
            Some(_) if step != Step::Everything => ChangedPath::new(root),
            _ => ChangedPath::inactive(root),
        };
        let start = match step {
            Step::Everything => 0,
            step => self
                .stages
                .iter()
                .position(|s| s.step() >= step)
                .unwrap_or(self.stages.len()),
        };
        debug!(
            step = %step,
            stages = self.stages.len() - start,
            incremental = changed_path.is_active(),
            "refreshing model"
        );

        let mut ctx = StageContext::new(
            tree,
            params.change_set.as_ref(),
            &mut changed_path,
            &mut self.rows_to_display,
            &mut self.pending,
        );
        ctx.animate = params.animate;
        for stage in &mut self.stages[start..] {
            trace!(step = %stage.step(), "executing stage");
            stage.execute(&mut ctx);
        }

        self.set_row_tops_and_indexes(tree, params.animate);
        self.clear_stale_positions(tree, &changed_path, params.animate);

        ModelUpdatedEvent {
            animate: params.animate,
            keep_render_rows: params.keep_render_rows,
            new_data: params.new_data,
            row_count: self.rows_to_display.len(),
        }
    }

    fn height_of(&self, entity: &RowEntity) -> (u32, bool) {
        match &self.row_height_fn {
            Some(height_fn) => match height_fn(entity) {
                Some(height) => (height, false),
                None => (self.row_height, true),
            },
            None => (self.row_height, false),
        }
    }

    /// Assigns display index, height and pixel top to every displayed row.
    fn set_row_tops_and_indexes(&self, tree: &mut RowTree, animate: bool) {
        let mut top = 0u32;
        for (index, &row) in self.rows_to_display.iter().enumerate() {
            let Some(entity) = tree.get(row) else {
                continue;
            };
            let (height, estimated) = self.height_of(entity);
            tree.set_row_height(row, height, estimated);
            tree.set_row_top(row, Some(top), animate);
            tree.set_row_index(row, Some(index));
            top = top.saturating_add(height);
        }
    }

    /// Clears positions of rows not displayed anymore.
    ///
    /// With an active changed path, collapsed groups off the path are not
    /// descended into: their children could not have been displayed before
    /// either. A collapsed group on the path may have gained a row that was
    /// displayed elsewhere.
    fn clear_stale_positions(&self, tree: &mut RowTree, changed_path: &ChangedPath, animate: bool) {
        let displayed: HashSet<RowHandle> = self.rows_to_display.iter().copied().collect();
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            let Some(entity) = tree.get(node) else {
                continue;
            };
            let sibling = entity.sibling;
            let prune = changed_path.can_skip(node) && !entity.is_root() && !entity.expanded;
            let descend = entity.has_children() && !prune;
            let children = descend.then(|| entity.children_after_group.clone());

            for row in std::iter::once(node).chain(sibling) {
                if !displayed.contains(&row) {
                    tree.clear_row_top_and_row_index(row, animate);
                }
            }
            if let Some(children) = children {
                stack.extend(children.iter().rev());
            }
        }
    }

    /// Rows to display, in order.
    pub fn rows_to_display(&self) -> &[RowHandle] {
        &self.rows_to_display
    }

    pub fn row_count(&self) -> usize {
        self.rows_to_display.len()
    }

    pub fn row_at(&self, index: usize) -> Option<RowHandle> {
        self.rows_to_display.get(index).copied()
    }

    /// Returns true if `row` is displayed.
    pub fn is_row_displayed(&self, tree: &RowTree, row: RowHandle) -> bool {
        tree.get(row)
            .and_then(|e| e.row_index)
            .is_some_and(|i| self.rows_to_display.get(i) == Some(&row))
    }

    /// Total pixel height of the displayed rows.
    pub fn total_height(&self, tree: &RowTree) -> u32 {
        self.rows_to_display
            .last()
            .and_then(|&row| tree.get(row))
            .map_or(0, |e| e.row_top.unwrap_or(0).saturating_add(e.row_height))
    }

    /// Display index of the row covering pixel `y`, clamped to the
    /// displayed range. `None` when nothing is displayed.
    pub fn display_index_at_pixel(&self, tree: &RowTree, y: u32) -> Option<usize> {
        let last = self.rows_to_display.len().checked_sub(1)?;
        let index = self.rows_to_display.partition_point(|&row| {
            tree.get(row)
                .is_some_and(|e| e.row_top.unwrap_or(0).saturating_add(e.row_height) <= y)
        });
        Some(index.min(last))
    }

    /// Forgets the displayed rows. Used when the tree is rebuilt.
    pub fn clear_rows(&mut self) {
        self.rows_to_display.clear();
    }
}
