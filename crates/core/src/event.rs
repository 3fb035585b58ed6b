//! Row and model events.
//!
//! Positional setters on `RowTree` record a `RowEvent` only when the stored
//! value actually changes, so renderers receive the minimal diff.

use crate::tree::RowHandle;

/// Which positional property of a row changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowEventKind {
    FirstChildChanged,
    LastChildChanged,
    ChildIndexChanged,
    RowIndexChanged,
    TopChanged,
    HeightChanged,
    ExpandedChanged,
    DataChanged,
}

/// A structural change notification for one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowEvent {
    pub row: RowHandle,
    pub kind: RowEventKind,
}

impl RowEvent {
    #[inline]
    pub fn new(row: RowHandle, kind: RowEventKind) -> Self {
        Self { row, kind }
    }
}

/// Published once per completed pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelUpdatedEvent {
    /// Renderers may animate row movement.
    pub animate: bool,
    /// Renderers may reuse existing row components.
    pub keep_render_rows: bool,
    /// The dataset was replaced wholesale.
    pub new_data: bool,
    /// Number of rows displayed after the run.
    pub row_count: usize,
}
