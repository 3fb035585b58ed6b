//! Pivot stage hook.
//!
//! Pivoting itself is supplied by the application. Without a hook the stage
//! leaves the tree untouched.

use crate::stage::{Stage, StageContext, Step};
use rowflow_core::{ChangedPath, RowTree};
use std::fmt;
use std::rc::Rc;

/// Application pivot over the grouped tree.
pub type PivotFn = Rc<dyn Fn(&mut RowTree, &ChangedPath)>;

#[derive(Clone, Default)]
pub struct PivotStage {
    hook: Option<PivotFn>,
}

impl fmt::Debug for PivotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PivotStage")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl PivotStage {
    pub fn new(hook: Option<PivotFn>) -> Self {
        Self { hook }
    }
}

impl Stage for PivotStage {
    fn step(&self) -> Step {
        Step::Pivot
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["pivot_mode", "pivot_columns"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        if let Some(hook) = &self.hook {
            hook(ctx.tree, ctx.changed_path);
        }
    }
}
