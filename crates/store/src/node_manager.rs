//! Row identity and lifecycle management.
//!
//! The `NodeManager` owns the `RowTree`, turns application records into row
//! entities and keeps the root leaf array in sync with three mutation modes:
//! full replace, id-diffed replace and explicit transactions.
//!
//! No operation here fails outward. Caller mistakes and lookup failures are
//! logged and the affected item is skipped.

use crate::transaction::{Transaction, TransactionResult};
use hashbrown::{HashMap, HashSet};
use rowflow_core::{
    ChangeSet, Error, IdGenerator, Record, RecordRef, Result, RowEntity, RowEventKind, RowHandle,
    RowIdFn, RowTree,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Collaborator returning the nested children of a record, if any.
pub type NestedChildrenFn = Rc<dyn Fn(&Record) -> Option<Vec<RecordRef>>>;

/// Nested children getter reading `Record::children`.
pub fn record_children_fn() -> NestedChildrenFn {
    Rc::new(|record: &Record| {
        if record.children().is_empty() {
            None
        } else {
            Some(record.children().to_vec())
        }
    })
}

/// How `reconcile_by_id` lays out the leaf array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOrder {
    /// Existing rows keep their relative source order; new rows are appended.
    #[default]
    Preserve,
    /// The leaf array mirrors the order of the new dataset.
    Follow,
}

/// Owner of row entity identity.
pub struct NodeManager {
    tree: RowTree,
    ids: IdGenerator,
    id_fn: Option<RowIdFn>,
    nested_children: Option<NestedChildrenFn>,
    reconcile_order: ReconcileOrder,
    /// Id -> canonical live entity.
    all_nodes: HashMap<String, RowHandle>,
}

impl Default for NodeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeManager {
    /// Creates a manager with an empty tree and generated ids.
    pub fn new() -> Self {
        Self {
            tree: RowTree::new(),
            ids: IdGenerator::new(),
            id_fn: None,
            nested_children: None,
            reconcile_order: ReconcileOrder::default(),
            all_nodes: HashMap::new(),
        }
    }

    /// Uses an application id function instead of the generated sequence.
    pub fn with_id_fn(mut self, id_fn: RowIdFn) -> Self {
        self.id_fn = Some(id_fn);
        self
    }

    /// Enables nested-children discovery on full replace.
    pub fn with_nested_children(mut self, getter: NestedChildrenFn) -> Self {
        self.nested_children = Some(getter);
        self
    }

    /// Sets the leaf layout used by `reconcile_by_id`.
    pub fn with_reconcile_order(mut self, order: ReconcileOrder) -> Self {
        self.reconcile_order = order;
        self
    }

    #[inline]
    pub fn tree(&self) -> &RowTree {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut RowTree {
        &mut self.tree
    }

    #[inline]
    pub fn root(&self) -> RowHandle {
        self.tree.root()
    }

    /// Returns the number of entities in the leaf array.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.tree.leaves().len()
    }

    /// Returns true if an application id function is configured.
    #[inline]
    pub fn has_id_fn(&self) -> bool {
        self.id_fn.is_some()
    }

    /// Returns true if nested-children discovery is enabled.
    #[inline]
    pub fn is_nested(&self) -> bool {
        self.nested_children.is_some()
    }

    #[inline]
    pub fn reconcile_order(&self) -> ReconcileOrder {
        self.reconcile_order
    }

    pub fn set_reconcile_order(&mut self, order: ReconcileOrder) {
        self.reconcile_order = order;
    }

    /// Looks up a live entity by id.
    pub fn row_by_id(&self, id: &str) -> Option<RowHandle> {
        self.all_nodes.get(id).copied()
    }

    /// Clears every entity and builds the tree from `records`.
    pub fn replace_all(&mut self, records: Vec<RecordRef>) {
        self.tree.reset();
        self.all_nodes.clear();
        self.ids.reset();

        let mut leaves = Vec::with_capacity(records.len());
        let mut superseded = HashSet::new();
        match self.nested_children.clone() {
            Some(getter) => {
                let mut seen = HashSet::new();
                for record in records {
                    self.create_nested(record, None, 0, &getter, &mut seen, &mut leaves, &mut superseded);
                }
            }
            None => {
                for record in records {
                    let id = self.assign_id(&record);
                    let (handle, previous) = self.create_entity(record, id, None, 0);
                    superseded.extend(previous);
                    leaves.push(handle);
                }
            }
        }

        if !superseded.is_empty() {
            leaves.retain(|h| !superseded.contains(h));
        }
        for (i, &h) in leaves.iter().enumerate() {
            self.tree[h].source_row_index = Some(i);
        }
        debug!(rows = leaves.len(), "replaced row data");
        *self.tree.leaves_mut() = leaves;
    }

    #[allow(clippy::too_many_arguments)]
    fn create_nested(
        &mut self,
        record: RecordRef,
        tree_parent: Option<RowHandle>,
        level: i32,
        getter: &NestedChildrenFn,
        seen: &mut HashSet<*const Record>,
        leaves: &mut Vec<RowHandle>,
        superseded: &mut HashSet<RowHandle>,
    ) {
        if !seen.insert(Rc::as_ptr(&record)) {
            debug!("skipping record already visited through another parent");
            return;
        }
        let children = getter(&record);
        let id = self.assign_id(&record);
        let (handle, previous) = self.create_entity(record, id, tree_parent, level);
        superseded.extend(previous);
        leaves.push(handle);
        for child in children.into_iter().flatten() {
            self.create_nested(child, Some(handle), level + 1, getter, seen, leaves, superseded);
        }
    }

    /// Reconciles the tree against `records` by id.
    ///
    /// Returns false when no id function is configured; the data is then
    /// loaded with `replace_all` and `changes` is left untouched.
    pub fn reconcile_by_id(&mut self, records: Vec<RecordRef>, changes: &mut ChangeSet) -> bool {
        let Some(id_fn) = self.id_fn.clone() else {
            warn!("diff reload requires an id function, replacing all rows instead");
            self.replace_all(records);
            return false;
        };

        let mut visited = HashSet::with_capacity(records.len());
        let mut order = Vec::with_capacity(records.len());
        let mut added = Vec::new();
        let mut previous_index: Option<usize> = None;
        let mut out_of_order = false;

        for record in records {
            let id = id_fn(&record);
            match self.all_nodes.get(&id).copied() {
                Some(handle) if visited.contains(&handle) => {
                    warn!(%id, "duplicate row id in dataset, keeping the last record");
                    self.replace_payload(handle, record, changes);
                }
                Some(handle) => {
                    visited.insert(handle);
                    order.push(handle);
                    if let Some(index) = self.tree[handle].source_row_index {
                        if previous_index.is_some_and(|p| index < p) {
                            out_of_order = true;
                        }
                        previous_index = Some(index);
                    }
                    self.replace_payload(handle, record, changes);
                }
                None => {
                    let (handle, _) = self.create_entity(record, id, None, 0);
                    changes.add(handle);
                    visited.insert(handle);
                    order.push(handle);
                    added.push(handle);
                }
            }
        }

        let old_leaves = std::mem::take(self.tree.leaves_mut());
        let mut removed = Vec::new();
        for &handle in &old_leaves {
            if !visited.contains(&handle) {
                removed.push(handle);
            }
        }

        let leaves = match self.reconcile_order {
            ReconcileOrder::Follow => {
                changes.reordered |= out_of_order;
                order
            }
            ReconcileOrder::Preserve => old_leaves
                .into_iter()
                .filter(|h| visited.contains(h))
                .chain(added)
                .collect(),
        };
        for (i, &h) in leaves.iter().enumerate() {
            self.tree[h].source_row_index = Some(i);
        }
        *self.tree.leaves_mut() = leaves;

        for handle in removed {
            self.detach(handle);
            changes.remove(handle);
        }
        debug!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            reordered = changes.reordered,
            "reconciled row data by id"
        );
        true
    }

    /// Applies a transaction: remove, then update, then add.
    pub fn apply_transaction(&mut self, tx: &Transaction, changes: &mut ChangeSet) -> TransactionResult {
        let mut result = TransactionResult::default();
        self.execute_remove(tx, changes, &mut result);
        self.execute_update(tx, changes, &mut result);
        self.execute_add(tx, changes, &mut result);
        result
    }

    fn execute_remove(&mut self, tx: &Transaction, changes: &mut ChangeSet, result: &mut TransactionResult) {
        if tx.remove.is_empty() {
            return;
        }
        let mut targets = Vec::with_capacity(tx.remove.len());
        let mut seen = HashSet::with_capacity(tx.remove.len());
        for record in &tx.remove {
            match self.lookup(record) {
                Ok(handle) => {
                    if seen.insert(handle) {
                        targets.push(handle);
                    }
                }
                Err(e) => error!(error = %e, "could not find row to remove"),
            }
        }
        self.remove_handles(&targets);
        for handle in targets {
            changes.remove(handle);
            result.remove.push(handle);
        }
    }

    fn execute_update(&mut self, tx: &Transaction, changes: &mut ChangeSet, result: &mut TransactionResult) {
        let mut seen = HashSet::with_capacity(tx.update.len());
        for record in &tx.update {
            match self.lookup(record) {
                Ok(handle) => {
                    self.tree[handle].update_data(record.clone());
                    self.tree.push_event(handle, RowEventKind::DataChanged);
                    changes.update(handle);
                    if seen.insert(handle) {
                        result.update.push(handle);
                    }
                }
                Err(e) => error!(error = %e, "could not find row to update"),
            }
        }
    }

    fn execute_add(&mut self, tx: &Transaction, changes: &mut ChangeSet, result: &mut TransactionResult) {
        if tx.add.is_empty() {
            return;
        }
        let mut created = Vec::with_capacity(tx.add.len());
        let mut superseded = Vec::new();
        for record in &tx.add {
            let id = self.assign_id(record);
            let (handle, previous) = self.create_entity(record.clone(), id, None, 0);
            if let Some(previous) = previous {
                if let Some(pos) = created.iter().position(|c| *c == previous) {
                    created.remove(pos);
                } else if !self.tree[previous].is_detached() {
                    superseded.push(previous);
                }
            }
            created.push(handle);
        }
        if !superseded.is_empty() {
            self.remove_handles(&superseded);
            for handle in superseded {
                changes.remove(handle);
                result.remove.push(handle);
            }
        }

        let len = self.leaf_count();
        let insert_at = match tx.add_index {
            Some(index) => index.clamp(0, len as i64) as usize,
            None => len,
        };
        if insert_at < len {
            changes.reordered = true;
        }

        let mut leaves = std::mem::take(self.tree.leaves_mut());
        leaves.splice(insert_at..insert_at, created.iter().copied());
        for (i, &h) in leaves.iter().enumerate().skip(insert_at) {
            self.tree[h].source_row_index = Some(i);
        }
        *self.tree.leaves_mut() = leaves;

        for handle in created {
            changes.add(handle);
            result.add.push(handle);
        }
    }

    fn assign_id(&mut self, record: &Record) -> String {
        match &self.id_fn {
            Some(id_fn) => id_fn(record),
            None => self.ids.next_id(),
        }
    }

    /// Creates an entity and registers its id. Returns the entity previously
    /// registered under the same id, if any.
    fn create_entity(
        &mut self,
        record: RecordRef,
        id: String,
        tree_parent: Option<RowHandle>,
        level: i32,
    ) -> (RowHandle, Option<RowHandle>) {
        let mut entity = RowEntity::new(id.clone(), Some(record));
        entity.tree_parent = tree_parent;
        entity.parent = Some(tree_parent.unwrap_or(self.tree.root()));
        entity.level = level;
        let handle = self.tree.insert(entity);

        let previous = self.all_nodes.insert(id, handle);
        if previous.is_some() {
            let error = Error::duplicate_id(self.tree[handle].id.as_str());
            warn!(error = %error, "the most recent row replaces the earlier one");
        }
        (handle, previous)
    }

    fn replace_payload(&mut self, handle: RowHandle, record: RecordRef, changes: &mut ChangeSet) {
        if self.tree[handle].holds(&record) {
            return;
        }
        self.tree[handle].update_data(record);
        self.tree.push_event(handle, RowEventKind::DataChanged);
        changes.update(handle);
    }

    /// Finds the live entity for a record, by id or by object identity.
    pub fn lookup(&self, record: &RecordRef) -> Result<RowHandle> {
        match &self.id_fn {
            Some(id_fn) => {
                let id = id_fn(record);
                self.all_nodes
                    .get(&id)
                    .copied()
                    .filter(|h| !self.tree[*h].is_detached())
                    .ok_or_else(|| Error::row_not_found(id))
            }
            None => {
                let leaves = self.tree.leaves();
                leaves
                    .iter()
                    .copied()
                    .find(|&h| self.tree[h].holds(record))
                    .ok_or_else(|| Error::record_not_found(leaves.len()))
            }
        }
    }

    /// Removes entities from the leaf array in one compaction pass starting at
    /// the lowest affected index, then detaches them.
    fn remove_handles(&mut self, handles: &[RowHandle]) {
        let targets: HashSet<RowHandle> = handles.iter().copied().collect();
        let first = handles
            .iter()
            .filter_map(|h| self.tree[*h].source_row_index)
            .min();
        if let Some(first) = first {
            let mut leaves = std::mem::take(self.tree.leaves_mut());
            let tail: Vec<RowHandle> = leaves
                .drain(first..)
                .filter(|h| !targets.contains(h))
                .collect();
            leaves.extend(tail);
            for (i, &h) in leaves.iter().enumerate().skip(first) {
                self.tree[h].source_row_index = Some(i);
            }
            *self.tree.leaves_mut() = leaves;
        }
        for &handle in handles {
            self.detach(handle);
        }
    }

    fn detach(&mut self, handle: RowHandle) {
        let entity = &mut self.tree[handle];
        entity.source_row_index = None;
        if self.all_nodes.get(&entity.id) == Some(&handle) {
            self.all_nodes.remove(&entity.id);
        }
        self.tree.clear_row_top_and_row_index(handle, false);
    }
}
