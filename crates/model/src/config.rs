//! Row model configuration.
//!
//! Everything that can be expressed as plain data lives here and may be
//! loaded from JSON. Closures (id function, comparators, predicates,
//! aggregators) are supplied through `RowModelBuilder`.

use rowflow_core::{Error, Result};
use rowflow_pipeline::DEFAULT_ROW_HEIGHT;
use rowflow_sort::SortOption;
use rowflow_store::ReconcileOrder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait before a batch of transactions is applied.
pub const DEFAULT_BATCH_WAIT_MS: u64 = 50;

/// Plain-data options of a `RowModel`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowModelConfig {
    /// Height of every row without a row height function.
    pub row_height: u32,
    /// Wait before queued transactions are applied.
    pub batch_wait_ms: u64,
    pub reconcile_order: ReconcileOrder,
    /// Renderers may animate row movement after transactions.
    pub animate: bool,
    /// Build the hierarchy from nested children instead of grouping.
    pub tree_data: bool,
    /// Fields to group leaves by, outermost first.
    pub group_by: Vec<String>,
    /// Levels expanded when a group is created: -1 for all, 0 for none.
    pub group_default_expanded: i32,
    pub maintain_group_order: bool,
    pub group_footers: bool,
    pub grand_total_footer: bool,
    pub pivot_mode: bool,
    pub delta_sort: bool,
    pub sort: Vec<SortOption>,
    /// Update-only transactions skip the pipeline; the next refresh then
    /// recomputes everything.
    pub suppress_model_update_after_update_transaction: bool,
}

impl Default for RowModelConfig {
    fn default() -> Self {
        Self {
            row_height: DEFAULT_ROW_HEIGHT,
            batch_wait_ms: DEFAULT_BATCH_WAIT_MS,
            reconcile_order: ReconcileOrder::default(),
            animate: false,
            tree_data: false,
            group_by: Vec::new(),
            group_default_expanded: 0,
            maintain_group_order: false,
            group_footers: false,
            grand_total_footer: false,
            pivot_mode: false,
            delta_sort: true,
            sort: Vec::new(),
            suppress_model_update_after_update_transaction: false,
        }
    }
}

impl RowModelConfig {
    /// Parses a configuration from JSON. Missing members keep their default.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the options can be combined.
    pub fn validate(&self) -> Result<()> {
        if self.tree_data && !self.group_by.is_empty() {
            return Err(Error::invalid_operation(
                "tree_data and group_by cannot be combined",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn batch_wait(&self) -> Duration {
        Duration::from_millis(self.batch_wait_ms)
    }
}
