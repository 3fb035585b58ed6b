//! rowflow Sort - Incremental ordering of row children.
//!
//! This crate provides:
//!
//! - `RowComparator`: field-by-field comparison driven by `SortOption`s
//! - `DeltaSortEngine`: produces `children_after_sort`, sorting only the
//!   touched children when a change set is available
//!
//! # Example
//!
//! ```rust
//! use rowflow_core::{ChangeSet, ChangedPath, Record, RowEntity, RowTree};
//! use rowflow_sort::{DeltaSortEngine, RowComparator, SortOption, SortParams};
//! use std::rc::Rc;
//!
//! let mut tree = RowTree::new();
//! let root = tree.root();
//! let rows: Vec<_> = [3, 1, 2]
//!     .iter()
//!     .map(|v| {
//!         let record = Record::new().with("v", *v).into_ref();
//!         tree.insert(RowEntity::new(v.to_string(), Some(record)))
//!     })
//!     .collect();
//! tree[root].children_after_agg_filter = Rc::new(rows);
//!
//! let mut params = SortParams::new(RowComparator::new(vec![SortOption::asc("v")]));
//! params.delta_sort = true;
//! DeltaSortEngine::sort_node(&mut tree, root, &params, None, None);
//!
//! let changes = ChangeSet::new();
//! let path = ChangedPath::new(root);
//! let before = tree[root].children_after_sort.clone();
//! let (after, _) = DeltaSortEngine::sort(&tree, root, &params, Some(&changes), Some(&path));
//! assert!(Rc::ptr_eq(&before, &after));
//! ```

pub mod comparator;
pub mod delta_sort;

pub use comparator::{RowComparator, SortDirection, SortOption, ValueComparatorFn};
pub use delta_sort::{full_sort, update_child_positions, DeltaSortEngine, SortParams, SortPath};
