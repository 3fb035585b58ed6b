//! Changed-path tracking.
//!
//! Records which parent nodes have at least one changed descendant so that
//! stages can skip untouched subtrees. An inactive path means "everything
//! changed" and every query answers accordingly.

use crate::tree::{RowHandle, RowTree};
use hashbrown::HashMap;

/// Tracker of ancestors of changed rows.
#[derive(Clone, Debug)]
pub struct ChangedPath {
    active: bool,
    root: RowHandle,
    /// Node on the path -> its children that are also on the path.
    items: HashMap<RowHandle, Vec<RowHandle>>,
}

impl ChangedPath {
    /// Creates an active path containing only the root.
    pub fn new(root: RowHandle) -> Self {
        let mut items = HashMap::new();
        items.insert(root, Vec::new());
        Self {
            active: true,
            root,
            items,
        }
    }

    /// Creates a path that reports every node as changed.
    pub fn inactive(root: RowHandle) -> Self {
        let mut path = Self::new(root);
        path.active = false;
        path
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_inactive(&mut self) {
        self.active = false;
    }

    #[inline]
    pub fn root(&self) -> RowHandle {
        self.root
    }

    /// Marks `node` and each of its ancestors as changed.
    pub fn add_parent_node(&mut self, tree: &RowTree, node: RowHandle) {
        let mut current = Some(node);
        let mut pending: Option<RowHandle> = None;
        while let Some(handle) = current {
            if self.items.contains_key(&handle) {
                break;
            }
            let mut children = Vec::new();
            if let Some(child) = pending {
                children.push(child);
            }
            self.items.insert(handle, children);
            pending = Some(handle);
            current = tree.get(handle).and_then(|e| e.parent);
        }
        let (Some(child), Some(parent)) = (pending, current) else {
            // Chain ended without reaching the path: a detached node.
            return;
        };
        if let Some(children) = self.items.get_mut(&parent) {
            children.push(child);
        }
    }

    /// Returns true when the node is known to be untouched.
    #[inline]
    pub fn can_skip(&self, node: RowHandle) -> bool {
        self.active && !self.items.contains_key(&node)
    }

    /// Returns true if the node was marked.
    #[inline]
    pub fn contains(&self, node: RowHandle) -> bool {
        self.items.contains_key(&node)
    }

    /// Lists nodes to process, children before parents.
    ///
    /// With an active path only marked nodes are listed. Otherwise every node
    /// with children is listed, plus leaves when `traverse_leaf_nodes` is set.
    pub fn changed_nodes_depth_first(
        &self,
        tree: &RowTree,
        traverse_leaf_nodes: bool,
        include_unchanged: bool,
    ) -> Vec<RowHandle> {
        let mut out = Vec::new();
        if self.active && !include_unchanged {
            self.walk_path(self.root, &mut out);
        } else {
            walk_everything(tree, self.root, traverse_leaf_nodes, &mut out);
        }
        out
    }

    fn walk_path(&self, node: RowHandle, out: &mut Vec<RowHandle>) {
        if let Some(children) = self.items.get(&node) {
            for &child in children {
                self.walk_path(child, out);
            }
        }
        out.push(node);
    }
}

fn walk_everything(tree: &RowTree, node: RowHandle, traverse_leaf_nodes: bool, out: &mut Vec<RowHandle>) {
    let Some(entity) = tree.get(node) else {
        return;
    };
    for &child in entity.children_after_group.iter() {
        if tree.get(child).is_some_and(|c| c.has_children()) {
            walk_everything(tree, child, traverse_leaf_nodes, out);
        } else if traverse_leaf_nodes {
            out.push(child);
        }
    }
    out.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RowEntity;
    use std::rc::Rc;

    /// root -> g1 -> (a, b), root -> g2 -> (c)
    fn sample() -> (RowTree, [RowHandle; 5]) {
        let mut tree = RowTree::new();
        let root = tree.root();
        let mk = |tree: &mut RowTree, id: &str, parent: RowHandle| {
            let mut e = RowEntity::new(id, None);
            e.parent = Some(parent);
            tree.insert(e)
        };
        let g1 = mk(&mut tree, "g1", root);
        let g2 = mk(&mut tree, "g2", root);
        let a = mk(&mut tree, "a", g1);
        let b = mk(&mut tree, "b", g1);
        let c = mk(&mut tree, "c", g2);
        tree[root].children_after_group = Rc::new(vec![g1, g2]);
        tree[g1].children_after_group = Rc::new(vec![a, b]);
        tree[g2].children_after_group = Rc::new(vec![c]);
        (tree, [g1, g2, a, b, c])
    }

    #[test]
    fn test_active_path_only_lists_marked() {
        let (tree, [g1, g2, a, _, _]) = sample();
        let mut path = ChangedPath::new(tree.root());
        path.add_parent_node(&tree, tree[a].parent.unwrap());

        assert!(!path.can_skip(g1));
        assert!(path.can_skip(g2));
        assert!(!path.can_skip(tree.root()));
        assert_eq!(
            path.changed_nodes_depth_first(&tree, false, false),
            vec![g1, tree.root()]
        );
    }

    #[test]
    fn test_inactive_path_lists_everything() {
        let (tree, [g1, g2, a, b, c]) = sample();
        let path = ChangedPath::inactive(tree.root());
        assert!(!path.can_skip(g2));
        assert_eq!(
            path.changed_nodes_depth_first(&tree, false, false),
            vec![g1, g2, tree.root()]
        );
        assert_eq!(
            path.changed_nodes_depth_first(&tree, true, false),
            vec![a, b, g1, c, g2, tree.root()]
        );
    }

    #[test]
    fn test_marking_twice_is_idempotent() {
        let (tree, [g1, _, _, _, _]) = sample();
        let mut path = ChangedPath::new(tree.root());
        path.add_parent_node(&tree, g1);
        path.add_parent_node(&tree, g1);
        assert_eq!(
            path.changed_nodes_depth_first(&tree, false, false),
            vec![g1, tree.root()]
        );
    }
}
