//! Transaction input and result types.
//!
//! A transaction is applied in three ordered phases: remove, then update,
//! then add. Each phase is optional.

use rowflow_core::{RecordRef, RowHandle};

/// A fine-grained change to the dataset.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    /// Records to insert.
    pub add: Vec<RecordRef>,
    /// Insert position; clamped to `[0, leaf_count]`. Appends when `None`.
    pub add_index: Option<i64>,
    /// Records matched by id whose payload replaces the existing one.
    pub update: Vec<RecordRef>,
    /// Records matched by id, or by object identity without an id function.
    pub remove: Vec<RecordRef>,
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds records to insert.
    pub fn add(mut self, records: impl IntoIterator<Item = RecordRef>) -> Self {
        self.add.extend(records);
        self
    }

    /// Sets the insert position for added records.
    pub fn add_at(mut self, index: i64) -> Self {
        self.add_index = Some(index);
        self
    }

    /// Adds records to update.
    pub fn update(mut self, records: impl IntoIterator<Item = RecordRef>) -> Self {
        self.update.extend(records);
        self
    }

    /// Adds records to remove.
    pub fn remove(mut self, records: impl IntoIterator<Item = RecordRef>) -> Self {
        self.remove.extend(records);
        self
    }

    /// Returns true if no phase has work.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Returns true if the transaction only updates existing rows.
    pub fn is_update_only(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && !self.update.is_empty()
    }
}

/// Entities actually affected by a transaction, in per-phase order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub remove: Vec<RowHandle>,
    pub update: Vec<RowHandle>,
    pub add: Vec<RowHandle>,
}

impl TransactionResult {
    /// Returns true if nothing was affected.
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.update.is_empty() && self.add.is_empty()
    }
}
