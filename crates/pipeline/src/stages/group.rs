//! Grouping stage.
//!
//! Builds `children_after_group` for every node in one of three modes:
//!
//! - flat: every leaf is a child of the root
//! - tree data: leaves hang below their `tree_parent`
//! - grouped: synthetic group rows are created per distinct value of each
//!   group field, nested in field order
//!
//! Group rows are cached by id so they keep their identity and expanded
//! state across runs. Parents of touched rows are marked on the changed path.

use crate::stage::{Stage, StageContext, Step};
use hashbrown::{HashMap, HashSet};
use rowflow_core::{empty_children, ChildList, Record, RowEntity, RowHandle, RowTree, Value};
use tracing::{debug, trace};

const GROUP_ID_PREFIX: &str = "row-group-";

/// Grouping configuration and the group rows it created.
#[derive(Debug, Default)]
pub struct GroupStage {
    group_by: Vec<String>,
    tree_data: bool,
    /// Levels expanded when a group is first created: -1 for all, 0 for none.
    default_expanded: i32,
    groups: HashMap<String, RowHandle>,
    generation: u32,
}

impl GroupStage {
    /// Flat grouping: every leaf below the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups leaves by the values of `fields`, outermost first.
    pub fn by_fields(fields: Vec<String>) -> Self {
        Self {
            group_by: fields,
            ..Self::default()
        }
    }

    /// Hierarchy from the nested-children links built by the node manager.
    pub fn tree_data() -> Self {
        Self {
            tree_data: true,
            ..Self::default()
        }
    }

    pub fn with_default_expanded(mut self, levels: i32) -> Self {
        self.default_expanded = levels;
        self
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn is_tree_data(&self) -> bool {
        self.tree_data
    }

    /// Number of live group rows.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn expanded_by_default(&self, level: i32) -> bool {
        self.default_expanded == -1 || level < self.default_expanded
    }

    fn group_flat(&mut self, ctx: &mut StageContext<'_>) {
        let tree = &mut *ctx.tree;
        let root = tree.root();
        let leaves = tree.leaves().to_vec();
        for &leaf in &leaves {
            let entity = &mut tree[leaf];
            entity.parent = Some(root);
            entity.level = 0;
            clear_own_children(entity);
        }
        assign_children(tree, root, leaves);
        self.drop_groups(tree, &HashSet::new(), ctx.animate);
    }

    fn group_tree_data(&mut self, ctx: &mut StageContext<'_>) {
        let tree = &mut *ctx.tree;
        let root = tree.root();
        let leaves = tree.leaves().to_vec();

        let mut old_parents = Vec::new();
        let mut children: HashMap<RowHandle, Vec<RowHandle>> = HashMap::new();
        for &leaf in &leaves {
            let parent = tree[leaf]
                .tree_parent
                .filter(|p| tree.get(*p).is_some_and(|e| !e.is_detached()))
                .unwrap_or(root);
            let entity = &mut tree[leaf];
            if entity.parent != Some(parent) {
                old_parents.extend(entity.parent);
                entity.parent = Some(parent);
            }
            children.entry(parent).or_default().push(leaf);
        }

        for &leaf in &leaves {
            let level = tree.ancestors(leaf).count() as i32 - 1;
            let has_children = children.contains_key(&leaf);
            let default_expanded = self.expanded_by_default(level);
            let entity = &mut tree[leaf];
            entity.level = level;
            if has_children && !entity.group {
                entity.expanded = default_expanded;
            }
            entity.group = has_children;
            if !has_children && entity.has_children() {
                entity.children_after_group = empty_children();
                old_parents.push(leaf);
            }
        }

        assign_children(tree, root, children.remove(&root).unwrap_or_default());
        for (parent, list) in children {
            assign_children(tree, parent, list);
        }
        mark_moved(ctx, &old_parents);
    }

    fn group_by_fields(&mut self, ctx: &mut StageContext<'_>) {
        let animate = ctx.animate;
        let tree = &mut *ctx.tree;
        if self.generation != tree.generation() {
            self.groups.clear();
            self.generation = tree.generation();
        }
        let root = tree.root();
        let leaves = tree.leaves().to_vec();
        let depth = self.group_by.len();

        let mut children: HashMap<RowHandle, Vec<RowHandle>> = HashMap::new();
        let mut seen: HashSet<RowHandle> = HashSet::new();
        let mut old_parents = Vec::new();
        let mut created = Vec::new();

        for &leaf in &leaves {
            let mut parent = root;
            let mut path_id = String::from(GROUP_ID_PREFIX);
            for level in 0..depth {
                let field = self.group_by[level].as_str();
                let key = tree[leaf]
                    .data
                    .as_ref()
                    .and_then(|d| d.get(field))
                    .cloned()
                    .unwrap_or(Value::Null);
                if level > 0 {
                    path_id.push('-');
                }
                path_id.push_str(field);
                path_id.push('-');
                path_id.push_str(&key.to_string());

                let existing = self.groups.get(&path_id).copied().filter(|h| tree.contains(*h));
                let group = match existing {
                    Some(handle) => handle,
                    None => {
                        let handle = self.create_group(tree, &path_id, level, key, parent);
                        created.push(handle);
                        handle
                    }
                };
                if seen.insert(group) {
                    children.entry(parent).or_default().push(group);
                }
                parent = group;
            }

            let entity = &mut tree[leaf];
            if entity.parent != Some(parent) {
                old_parents.extend(entity.parent);
                entity.parent = Some(parent);
            }
            entity.level = depth as i32;
            clear_own_children(entity);
            children.entry(parent).or_default().push(leaf);
        }

        assign_children(tree, root, children.remove(&root).unwrap_or_default());
        for (parent, list) in children {
            assign_children(tree, parent, list);
        }
        let dropped = self.drop_groups(tree, &seen, animate);
        if !created.is_empty() || !dropped.is_empty() {
            debug!(created = created.len(), dropped = dropped.len(), "regrouped rows");
        }

        for group in created {
            if let Some(parent) = ctx.tree[group].parent {
                ctx.changed_path.add_parent_node(ctx.tree, parent);
            }
        }
        old_parents.extend(dropped);
        mark_moved(ctx, &old_parents);
    }

    fn create_group(
        &mut self,
        tree: &mut RowTree,
        id: &str,
        level: usize,
        key: Value,
        parent: RowHandle,
    ) -> RowHandle {
        let record = Record::new().with(self.group_by[level].as_str(), key).into_ref();
        let mut entity = RowEntity::new(id, Some(record));
        entity.group = true;
        entity.level = level as i32;
        entity.leaf_group = level + 1 == self.group_by.len();
        entity.expanded = self.expanded_by_default(level as i32);
        entity.parent = Some(parent);
        let handle = tree.insert(entity);
        trace!(id, "created group row");
        self.groups.insert(id.to_string(), handle);
        handle
    }

    /// Forgets groups not in `keep`, returning the parents they hung below.
    fn drop_groups(&mut self, tree: &mut RowTree, keep: &HashSet<RowHandle>, animate: bool) -> Vec<RowHandle> {
        let mut parents = Vec::new();
        self.groups.retain(|_, handle| {
            if keep.contains(handle) {
                return true;
            }
            if tree.contains(*handle) {
                let sibling = tree[*handle].sibling;
                parents.extend(tree[*handle].parent.filter(|p| keep.contains(p) || *p == tree.root()));
                tree[*handle].parent = None;
                tree.clear_row_top_and_row_index(*handle, animate);
                if let Some(footer) = sibling {
                    tree.clear_row_top_and_row_index(footer, animate);
                }
            }
            false
        });
        parents
    }
}

/// Sets a node's children, keeping the previous list when membership and
/// order are unchanged.
fn assign_children(tree: &mut RowTree, node: RowHandle, list: Vec<RowHandle>) {
    let entity = &mut tree[node];
    if entity.children_after_group.as_slice() != list.as_slice() {
        entity.children_after_group = ChildList::new(list);
    }
}

/// Drops a leaf's stale child list left over from another grouping mode.
fn clear_own_children(entity: &mut RowEntity) {
    entity.group = false;
    if entity.has_children() {
        entity.children_after_group = empty_children();
    }
}

/// Marks parents of touched rows, and the former parents of moved rows.
fn mark_moved(ctx: &mut StageContext<'_>, old_parents: &[RowHandle]) {
    if !ctx.changed_path.is_active() {
        return;
    }
    for &parent in old_parents {
        if ctx.tree.get(parent).is_some() {
            ctx.changed_path.add_parent_node(ctx.tree, parent);
        }
    }
    let Some(changes) = ctx.change_set else {
        return;
    };
    for row in changes.iter() {
        if let Some(parent) = ctx.tree.get(row).and_then(|e| e.parent) {
            ctx.changed_path.add_parent_node(ctx.tree, parent);
        }
    }
}

impl Stage for GroupStage {
    fn step(&self) -> Step {
        Step::Group
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["group_by", "tree_data", "group_default_expanded"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        if self.tree_data {
            self.group_tree_data(ctx);
        } else if self.group_by.is_empty() {
            self.group_flat(ctx);
        } else {
            self.group_by_fields(ctx);
        }
    }
}
