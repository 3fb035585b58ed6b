//! rowflow Core - Row entities and change tracking for the rowflow engine.
//!
//! This crate provides the substrate every other rowflow crate mutates:
//!
//! - `Record` / `Value`: application payloads and their scalar fields
//! - `RowEntity`: one node of the display tree
//! - `RowTree`: the arena owning every entity, addressed by `RowHandle`
//! - `IdGenerator`: per-manager id sequence
//! - `ChangeSet`: added / updated / removed sets produced by a mutation pass
//! - `ChangedPath`: ancestors of changed rows, used to prune stage work
//! - `Error`: error types for row tree operations
//!
//! # Example
//!
//! ```rust
//! use rowflow_core::{ChangeSet, Record, RowEntity, RowTree};
//!
//! let mut tree = RowTree::new();
//! let record = Record::new().with("id", 1).with("v", "a").into_ref();
//! let row = tree.insert(RowEntity::new("1", Some(record)));
//! tree.leaves_mut().push(row);
//!
//! let mut changes = ChangeSet::new();
//! changes.add(row);
//!
//! assert_eq!(tree.leaves(), &[row]);
//! assert!(changes.is_touched(row));
//! ```

pub mod change_set;
pub mod changed_path;
pub mod entity;
mod error;
pub mod event;
pub mod id;
mod record;
pub mod tree;
mod value;

pub use change_set::ChangeSet;
pub use changed_path::ChangedPath;
pub use entity::{empty_children, ChildList, RowEntity, FOOTER_PREFIX, ROOT_ID};
pub use error::{Error, Result};
pub use event::{ModelUpdatedEvent, RowEvent, RowEventKind};
pub use id::{field_id_fn, IdGenerator, RowIdFn};
pub use record::{Record, RecordRef};
pub use tree::{RowHandle, RowTree};
pub use value::Value;
