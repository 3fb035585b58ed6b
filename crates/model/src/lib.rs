//! rowflow Model - Client-side row model built on the rowflow engine.
//!
//! This crate wires the node manager and the stage pipeline into one
//! object driven by data mutations:
//!
//! - `RowModel`: full, diffed and transactional data updates, sort/filter
//!   changes, expansion, row lookups and node walks
//! - `RowModelConfig`: plain-data options, loadable from JSON
//! - `BatchQueue`: transactions applied together after a wait
//! - `SubscriptionManager`: notifications after each pipeline run
//!
//! # Example
//!
//! ```rust
//! use rowflow_core::{field_id_fn, Record};
//! use rowflow_model::{RowModel, RowModelConfig};
//! use rowflow_sort::SortOption;
//! use rowflow_store::Transaction;
//!
//! let mut model = RowModel::builder(RowModelConfig::default())
//!     .id_fn(field_id_fn("id"))
//!     .build();
//! model.set_full_dataset(vec![
//!     Record::new().with("id", 1).with("price", 30).into_ref(),
//!     Record::new().with("id", 2).with("price", 10).into_ref(),
//! ]);
//! model.set_sort(vec![SortOption::asc("price")]);
//! assert_eq!(model.row_at(0).map(|row| row.id.as_str()), Some("2"));
//!
//! model.apply_transaction(Transaction::new().update([
//!     Record::new().with("id", 2).with("price", 50).into_ref(),
//! ]));
//! assert_eq!(model.row_at(0).map(|row| row.id.as_str()), Some("1"));
//! ```

pub mod batch;
pub mod config;
pub mod model;
pub mod subscription;

pub use batch::{BatchCallback, BatchQueue};
pub use config::{RowModelConfig, DEFAULT_BATCH_WAIT_MS};
pub use model::{RowModel, RowModelBuilder, JSON_CHILDREN_KEY};
pub use subscription::{SubscriptionId, SubscriptionManager, UpdateCallback};
