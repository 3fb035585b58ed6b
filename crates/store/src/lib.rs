//! rowflow Store - Row identity and lifecycle management.
//!
//! This crate provides the `NodeManager`, which owns the row entity arena and
//! reconciles it against new data in three modes:
//!
//! - `replace_all`: drop every entity and rebuild, optionally discovering
//!   nested children
//! - `reconcile_by_id`: diff the new dataset against existing entities by id
//! - `apply_transaction`: remove, update and add individual records
//!
//! Every mode reports what it touched through a `ChangeSet`.
//!
//! # Example
//!
//! ```rust
//! use rowflow_core::{field_id_fn, ChangeSet, Record};
//! use rowflow_store::{NodeManager, Transaction};
//!
//! let mut manager = NodeManager::new().with_id_fn(field_id_fn("id"));
//! manager.replace_all(vec![
//!     Record::new().with("id", 1).with("v", "a").into_ref(),
//!     Record::new().with("id", 2).with("v", "b").into_ref(),
//! ]);
//!
//! let mut changes = ChangeSet::new();
//! let tx = Transaction::new().remove([Record::new().with("id", 1).into_ref()]);
//! let result = manager.apply_transaction(&tx, &mut changes);
//!
//! assert_eq!(result.remove.len(), 1);
//! assert_eq!(manager.leaf_count(), 1);
//! ```

pub mod node_manager;
pub mod transaction;

pub use node_manager::{record_children_fn, NestedChildrenFn, NodeManager, ReconcileOrder};
pub use transaction::{Transaction, TransactionResult};
