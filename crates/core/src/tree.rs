//! Arena holding every row entity.
//!
//! Entities refer to each other through `RowHandle` (slot index plus arena
//! generation). A full data replace bumps the generation, so handles taken
//! before the replace stop resolving instead of aliasing new rows.

use crate::entity::RowEntity;
use crate::event::{RowEvent, RowEventKind};
use core::fmt;
use core::ops::{Index, IndexMut};

/// Handle to an entity in a `RowTree`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowHandle {
    index: u32,
    generation: u32,
}

impl RowHandle {
    /// Returns the arena slot.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the arena generation this handle was issued in.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Arena of row entities rooted at a single root entity.
pub struct RowTree {
    entities: Vec<RowEntity>,
    generation: u32,
    events: Vec<RowEvent>,
}

impl Default for RowTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RowTree {
    /// Creates a tree containing only the root.
    pub fn new() -> Self {
        Self {
            entities: vec![RowEntity::root()],
            generation: 0,
            events: Vec::new(),
        }
    }

    /// Drops every entity and starts a new generation with a fresh root.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.entities.clear();
        self.entities.push(RowEntity::root());
        self.events.clear();
    }

    /// Returns the root handle.
    #[inline]
    pub fn root(&self) -> RowHandle {
        RowHandle {
            index: 0,
            generation: self.generation,
        }
    }

    /// Returns the current generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Adds an entity and returns its handle.
    pub fn insert(&mut self, entity: RowEntity) -> RowHandle {
        let index = self.entities.len() as u32;
        self.entities.push(entity);
        RowHandle {
            index,
            generation: self.generation,
        }
    }

    /// Returns true if the handle resolves in this generation.
    #[inline]
    pub fn contains(&self, handle: RowHandle) -> bool {
        handle.generation == self.generation && handle.index() < self.entities.len()
    }

    /// Gets an entity.
    pub fn get(&self, handle: RowHandle) -> Option<&RowEntity> {
        if handle.generation != self.generation {
            return None;
        }
        self.entities.get(handle.index())
    }

    /// Gets a mutable entity.
    pub fn get_mut(&mut self, handle: RowHandle) -> Option<&mut RowEntity> {
        if handle.generation != self.generation {
            return None;
        }
        self.entities.get_mut(handle.index())
    }

    /// Returns the number of entities including the root.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if only the root exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.len() <= 1
    }

    /// Iterates over every entity with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (RowHandle, &RowEntity)> {
        let generation = self.generation;
        self.entities.iter().enumerate().map(move |(i, e)| {
            (
                RowHandle {
                    index: i as u32,
                    generation,
                },
                e,
            )
        })
    }

    /// Returns the root leaf array.
    #[inline]
    pub fn leaves(&self) -> &[RowHandle] {
        &self.entities[0].all_leaf_children
    }

    /// Returns the root leaf array for mutation.
    #[inline]
    pub fn leaves_mut(&mut self) -> &mut Vec<RowHandle> {
        &mut self.entities[0].all_leaf_children
    }

    /// Iterates from `handle`'s parent up to the root.
    pub fn ancestors(&self, handle: RowHandle) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(handle).and_then(|e| e.parent),
        }
    }

    /// Records a row event.
    #[inline]
    pub fn push_event(&mut self, row: RowHandle, kind: RowEventKind) {
        self.events.push(RowEvent::new(row, kind));
    }

    /// Takes all recorded row events.
    pub fn take_events(&mut self) -> Vec<RowEvent> {
        std::mem::take(&mut self.events)
    }

    /// Returns the recorded row events without draining them.
    #[inline]
    pub fn events(&self) -> &[RowEvent] {
        &self.events
    }

    /// Sets first/last/index-within-parent, recording an event per changed field.
    pub fn set_child_position(
        &mut self,
        handle: RowHandle,
        first: bool,
        last: bool,
        index: Option<usize>,
    ) {
        let Some(e) = self.get_mut(handle) else {
            return;
        };
        let mut changed = [None; 3];
        if e.first_child != first {
            e.first_child = first;
            changed[0] = Some(RowEventKind::FirstChildChanged);
        }
        if e.last_child != last {
            e.last_child = last;
            changed[1] = Some(RowEventKind::LastChildChanged);
        }
        if e.child_index != index {
            e.child_index = index;
            changed[2] = Some(RowEventKind::ChildIndexChanged);
        }
        for kind in changed.into_iter().flatten() {
            self.push_event(handle, kind);
        }
    }

    /// Sets the display index, recording an event if it changed.
    pub fn set_row_index(&mut self, handle: RowHandle, row_index: Option<usize>) {
        let changed = match self.get_mut(handle) {
            Some(e) if e.row_index != row_index => {
                e.row_index = row_index;
                true
            }
            _ => false,
        };
        if changed {
            self.push_event(handle, RowEventKind::RowIndexChanged);
        }
    }

    /// Sets the pixel top, recording an event if it changed.
    ///
    /// With `animate`, the previous top is kept in `old_row_top`.
    pub fn set_row_top(&mut self, handle: RowHandle, row_top: Option<u32>, animate: bool) {
        let changed = match self.get_mut(handle) {
            Some(e) if e.row_top != row_top => {
                e.old_row_top = if animate { e.row_top } else { None };
                e.row_top = row_top;
                true
            }
            _ => false,
        };
        if changed {
            self.push_event(handle, RowEventKind::TopChanged);
        }
    }

    /// Sets the row height, recording an event if it changed.
    pub fn set_row_height(&mut self, handle: RowHandle, height: u32, estimated: bool) {
        let changed = match self.get_mut(handle) {
            Some(e) => {
                e.row_height_estimated = estimated;
                if e.row_height != height {
                    e.row_height = height;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if changed {
            self.push_event(handle, RowEventKind::HeightChanged);
        }
    }

    /// Sets the expanded flag, recording an event if it changed.
    pub fn set_expanded(&mut self, handle: RowHandle, expanded: bool) -> bool {
        let changed = match self.get_mut(handle) {
            Some(e) if e.expanded != expanded => {
                e.expanded = expanded;
                true
            }
            _ => false,
        };
        if changed {
            self.push_event(handle, RowEventKind::ExpandedChanged);
        }
        changed
    }

    /// Clears display position of a row no longer displayed.
    pub fn clear_row_top_and_row_index(&mut self, handle: RowHandle, animate: bool) {
        self.set_row_top(handle, None, animate);
        self.set_row_index(handle, None);
    }
}

impl Index<RowHandle> for RowTree {
    type Output = RowEntity;

    /// # Panics
    ///
    /// Panics if the handle is from another generation.
    fn index(&self, handle: RowHandle) -> &RowEntity {
        assert_eq!(handle.generation, self.generation, "stale row handle {:?}", handle);
        &self.entities[handle.index()]
    }
}

impl IndexMut<RowHandle> for RowTree {
    fn index_mut(&mut self, handle: RowHandle) -> &mut RowEntity {
        assert_eq!(handle.generation, self.generation, "stale row handle {:?}", handle);
        &mut self.entities[handle.index()]
    }
}

/// Iterator over the parent chain of an entity.
pub struct Ancestors<'a> {
    tree: &'a RowTree,
    next: Option<RowHandle>,
}

impl Iterator for Ancestors<'_> {
    type Item = RowHandle;

    fn next(&mut self) -> Option<RowHandle> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(|e| e.parent);
        Some(current)
    }
}
