//! Change set for tracking row entity changes.
//!
//! A ChangeSet is produced by one mutation pass (or a batch of them) and
//! scopes the work every downstream stage does.

use crate::tree::RowHandle;
use hashbrown::HashSet;

/// Identity sets of the entities a mutation pass touched.
///
/// A node ends up in at most one of `added`, `updated` and `removed`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Entities created by this pass
    pub added: HashSet<RowHandle>,
    /// Existing entities whose payload was replaced
    pub updated: HashSet<RowHandle>,
    /// Entities detached by this pass
    pub removed: HashSet<RowHandle>,
    /// The relative order of untouched siblings changed
    pub reordered: bool,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty() && !self.reordered
    }

    /// Returns the total number of changed entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Records a newly created entity.
    #[inline]
    pub fn add(&mut self, row: RowHandle) {
        self.removed.remove(&row);
        self.updated.remove(&row);
        self.added.insert(row);
    }

    /// Records a payload update. Entities added in this pass stay `added`.
    #[inline]
    pub fn update(&mut self, row: RowHandle) {
        if !self.added.contains(&row) {
            self.updated.insert(row);
        }
    }

    /// Records a removal.
    ///
    /// An entity added earlier in the same pass never existed from the point
    /// of view of downstream stages, so it is dropped from every set.
    pub fn remove(&mut self, row: RowHandle) {
        if self.added.remove(&row) {
            return;
        }
        self.updated.remove(&row);
        self.removed.insert(row);
    }

    /// Returns true if the entity was added or updated.
    #[inline]
    pub fn is_touched(&self, row: RowHandle) -> bool {
        self.added.contains(&row) || self.updated.contains(&row)
    }

    /// Returns true if the entity appears in any set.
    #[inline]
    pub fn contains(&self, row: RowHandle) -> bool {
        self.is_touched(row) || self.removed.contains(&row)
    }

    /// Folds a later change set into this one, in order.
    pub fn merge(&mut self, other: ChangeSet) {
        for row in other.added {
            self.add(row);
        }
        for row in other.updated {
            self.update(row);
        }
        for row in other.removed {
            self.remove(row);
        }
        self.reordered |= other.reordered;
    }

    /// Iterates over every changed entity.
    pub fn iter(&self) -> impl Iterator<Item = RowHandle> + '_ {
        self.added
            .iter()
            .chain(self.updated.iter())
            .chain(self.removed.iter())
            .copied()
    }

    /// Clears all changes.
    pub fn clear(&mut self) {
        self.added.clear();
        self.updated.clear();
        self.removed.clear();
        self.reordered = false;
    }
}
