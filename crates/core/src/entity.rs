//! Row entities.
//!
//! A `RowEntity` is one node of the display tree: a source record, a group
//! created by a grouping stage, or a synthetic footer. Entities live in a
//! `RowTree` arena and refer to each other through `RowHandle`s.

use crate::record::RecordRef;
use crate::tree::RowHandle;
use std::rc::Rc;

/// A per-stage child list. Shared so a stage can hand its input through
/// unchanged and callers can detect that with `Rc::ptr_eq`.
pub type ChildList = Rc<Vec<RowHandle>>;

/// Id of the root entity.
pub const ROOT_ID: &str = "ROOT_NODE_ID";

/// Prefix of footer entity ids.
pub const FOOTER_PREFIX: &str = "rowGroupFooter_";

/// Returns a fresh empty child list.
#[inline]
pub fn empty_children() -> ChildList {
    Rc::new(Vec::new())
}

/// One node in the display tree.
#[derive(Clone, Debug)]
pub struct RowEntity {
    /// Stable id, unique within the owning manager.
    pub id: String,
    /// Application payload. `None` for the root and fabricated groups.
    pub data: Option<RecordRef>,
    /// Aggregated values computed for groups.
    pub agg_data: Option<RecordRef>,
    /// Owning parent after grouping.
    pub parent: Option<RowHandle>,
    /// Shadow entity sharing display semantics (group footer).
    pub sibling: Option<RowHandle>,
    /// Parent discovered through nested children data.
    pub tree_parent: Option<RowHandle>,
    /// Flat leaf array. Only populated on the root.
    pub all_leaf_children: Vec<RowHandle>,
    pub children_after_group: ChildList,
    pub children_after_filter: ChildList,
    pub children_after_agg_filter: ChildList,
    pub children_after_sort: ChildList,
    /// Index into the root leaf array, `None` when detached.
    pub source_row_index: Option<usize>,
    pub row_index: Option<usize>,
    pub row_top: Option<u32>,
    /// Last published top, kept when animating so renderers can slide rows.
    pub old_row_top: Option<u32>,
    pub row_height: u32,
    pub row_height_estimated: bool,
    /// Tree depth; the root is -1.
    pub level: i32,
    pub group: bool,
    /// Group whose children are leaves.
    pub leaf_group: bool,
    pub footer: bool,
    pub expanded: bool,
    pub first_child: bool,
    pub last_child: bool,
    pub child_index: Option<usize>,
}

impl RowEntity {
    /// Creates a detached entity for a record.
    pub fn new(id: impl Into<String>, data: Option<RecordRef>) -> Self {
        Self {
            id: id.into(),
            data,
            agg_data: None,
            parent: None,
            sibling: None,
            tree_parent: None,
            all_leaf_children: Vec::new(),
            children_after_group: empty_children(),
            children_after_filter: empty_children(),
            children_after_agg_filter: empty_children(),
            children_after_sort: empty_children(),
            source_row_index: None,
            row_index: None,
            row_top: None,
            old_row_top: None,
            row_height: 0,
            row_height_estimated: false,
            level: 0,
            group: false,
            leaf_group: false,
            footer: false,
            expanded: false,
            first_child: false,
            last_child: false,
            child_index: None,
        }
    }

    /// Creates the root entity.
    pub fn root() -> Self {
        let mut root = Self::new(ROOT_ID, None);
        root.level = -1;
        root.group = true;
        root.expanded = true;
        root
    }

    /// Creates the footer shadow of a group.
    pub fn footer_of(group: &RowEntity, group_handle: RowHandle) -> Self {
        let mut footer = Self::new(format!("{}{}", FOOTER_PREFIX, group.id), group.data.clone());
        footer.footer = true;
        footer.group = group.group;
        footer.level = group.level + 1;
        footer.agg_data = group.agg_data.clone();
        footer.sibling = Some(group_handle);
        // the grand total footer hangs below the root itself
        footer.parent = group.parent.or(Some(group_handle));
        footer
    }

    /// Returns true for the root entity.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.level == -1
    }

    /// Returns true if grouping gave this entity children.
    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children_after_group.is_empty()
    }

    /// Returns true if the entity is not in the leaf array.
    #[inline]
    pub fn is_detached(&self) -> bool {
        self.source_row_index.is_none()
    }

    /// Replaces the payload keeping identity. Returns the previous payload.
    pub fn update_data(&mut self, data: RecordRef) -> Option<RecordRef> {
        self.data.replace(data)
    }

    /// Returns true if `record` is the very object this entity carries.
    pub fn holds(&self, record: &RecordRef) -> bool {
        self.data.as_ref().is_some_and(|d| Rc::ptr_eq(d, record))
    }

    /// Returns the record used for value lookups: aggregated data for groups
    /// when present, else the payload.
    pub fn value_source(&self) -> Option<&RecordRef> {
        if self.group {
            self.agg_data.as_ref().or(self.data.as_ref())
        } else {
            self.data.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_entity_new_detached() {
        let e = RowEntity::new("1", Some(Record::new().with("v", 1).into_ref()));
        assert!(e.is_detached());
        assert!(!e.has_children());
        assert!(!e.is_root());
        assert_eq!(e.level, 0);
    }

    #[test]
    fn test_root_entity() {
        let root = RowEntity::root();
        assert!(root.is_root());
        assert!(root.group);
        assert!(root.expanded);
        assert_eq!(root.id, ROOT_ID);
    }

    #[test]
    fn test_update_data_keeps_identity() {
        let first = Record::new().with("v", 1).into_ref();
        let second = Record::new().with("v", 2).into_ref();
        let mut e = RowEntity::new("a", Some(first.clone()));
        assert!(e.holds(&first));

        let previous = e.update_data(second.clone());
        assert!(previous.is_some_and(|p| Rc::ptr_eq(&p, &first)));
        assert!(e.holds(&second));
        assert_eq!(e.id, "a");
    }

    #[test]
    fn test_value_source_prefers_agg_data_for_groups() {
        let data = Record::new().with("v", 1).into_ref();
        let agg = Record::new().with("v", 10).into_ref();
        let mut e = RowEntity::new("g", Some(data.clone()));
        e.agg_data = Some(agg.clone());
        assert!(Rc::ptr_eq(e.value_source().unwrap(), &data));
        e.group = true;
        assert!(Rc::ptr_eq(e.value_source().unwrap(), &agg));
    }
}
