//! rowflow Pipeline - Stage orchestration over the row tree.
//!
//! This crate provides:
//!
//! - `Stage`: one transformation of the tree, tagged with its `Step`
//! - `PipelineOrchestrator`: runs stages from the earliest affected step and
//!   publishes display positions
//! - `stages`: the built-in group, filter, pivot, aggregate, aggregate
//!   filter, sort and flatten stages
//!
//! # Example
//!
//! ```rust
//! use rowflow_core::{Record, RowEntity, RowTree};
//! use rowflow_pipeline::{PipelineOrchestrator, RefreshParams, Step};
//!
//! let mut tree = RowTree::new();
//! for id in 0..3 {
//!     let record = Record::new().with("id", id).into_ref();
//!     let row = tree.insert(RowEntity::new(id.to_string(), Some(record)));
//!     tree[row].source_row_index = Some(id as usize);
//!     tree.leaves_mut().push(row);
//! }
//!
//! let mut pipeline = PipelineOrchestrator::with_default_stages();
//! let event = pipeline.refresh_model(&mut tree, RefreshParams::new(Step::Everything));
//!
//! assert_eq!(event.map(|e| e.row_count), Some(3));
//! assert_eq!(pipeline.display_index_at_pixel(&tree, 30), Some(1));
//! ```

pub mod orchestrator;
pub mod stage;
pub mod stages;

pub use orchestrator::{PipelineOrchestrator, RowHeightFn, DEFAULT_ROW_HEIGHT};
pub use stage::{RefreshParams, Stage, StageContext, Step};
