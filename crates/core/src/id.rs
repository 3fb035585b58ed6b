//! Row id assignment.
//!
//! Each node manager owns its own `IdGenerator`, so independent managers never
//! share a counter.

use crate::record::Record;
use std::rc::Rc;

/// Application-supplied id function.
pub type RowIdFn = Rc<dyn Fn(&Record) -> String>;

/// Monotonic sequence for rows without an application id.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// Creates a generator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn next_id(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        id.to_string()
    }

    /// Resets the sequence to zero.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Builds an id function reading a single field of the record.
///
/// Records missing the field map to an empty id, which the node manager
/// reports as a lookup failure.
pub fn field_id_fn(field: &str) -> RowIdFn {
    let field = field.to_string();
    Rc::new(move |record: &Record| {
        record
            .get(&field)
            .map(|v| v.to_string())
            .unwrap_or_default()
    })
}
