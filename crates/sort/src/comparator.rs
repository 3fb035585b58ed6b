//! Row comparator.
//!
//! Compares two row entities field by field according to the active sort
//! options. Groups are compared on their aggregated values when present.

use hashbrown::HashMap;
use rowflow_core::{RowEntity, RowHandle, RowTree, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::rc::Rc;

/// Sort order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One active sort on a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortOption {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Custom comparison for one field's values.
pub type ValueComparatorFn = Rc<dyn Fn(&Value, &Value) -> Ordering>;

static NULL: Value = Value::Null;

/// Compares rows by a list of sort options.
#[derive(Clone, Default)]
pub struct RowComparator {
    options: Vec<SortOption>,
    comparators: HashMap<String, ValueComparatorFn>,
}

impl RowComparator {
    /// Creates a comparator for the given sort options.
    pub fn new(options: Vec<SortOption>) -> Self {
        Self {
            options,
            comparators: HashMap::new(),
        }
    }

    /// Uses a custom comparison for `field` instead of `Value`'s ordering.
    pub fn with_comparator(mut self, field: impl Into<String>, compare: ValueComparatorFn) -> Self {
        self.comparators.insert(field.into(), compare);
        self
    }

    /// Returns true if at least one sort option is set.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.options.is_empty()
    }

    #[inline]
    pub fn options(&self) -> &[SortOption] {
        &self.options
    }

    /// Replaces the sort options, keeping custom comparators.
    pub fn set_options(&mut self, options: Vec<SortOption>) {
        self.options = options;
    }

    /// Returns true if any option sorts on one of `fields`.
    pub fn references_any(&self, fields: &[String]) -> bool {
        self.options.iter().any(|o| fields.contains(&o.field))
    }

    /// Compares two rows on the sort fields only.
    pub fn compare(&self, tree: &RowTree, a: RowHandle, b: RowHandle) -> Ordering {
        self.compare_entities(&tree[a], &tree[b])
    }

    /// Compares two entities on the sort fields only.
    pub fn compare_entities(&self, a: &RowEntity, b: &RowEntity) -> Ordering {
        for option in &self.options {
            let a_val = field_value(a, &option.field);
            let b_val = field_value(b, &option.field);

            let cmp = match self.comparators.get(&option.field) {
                Some(compare) => compare(a_val, b_val),
                None => a_val.cmp(b_val),
            };

            if cmp != Ordering::Equal {
                return match option.direction {
                    SortDirection::Asc => cmp,
                    SortDirection::Desc => cmp.reverse(),
                };
            }
        }
        Ordering::Equal
    }
}

fn field_value<'a>(entity: &'a RowEntity, field: &str) -> &'a Value {
    entity
        .value_source()
        .and_then(|record| record.get(field))
        .unwrap_or(&NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowflow_core::Record;

    fn row(tree: &mut RowTree, fields: &[(&str, Value)]) -> RowHandle {
        let record = Record::from_fields(fields.iter().cloned());
        tree.insert(RowEntity::new("x", Some(record.into_ref())))
    }

    #[test]
    fn test_compare_asc_desc() {
        let mut tree = RowTree::new();
        let a = row(&mut tree, &[("v", Value::from(1))]);
        let b = row(&mut tree, &[("v", Value::from(2))]);

        let asc = RowComparator::new(vec![SortOption::asc("v")]);
        assert_eq!(asc.compare(&tree, a, b), Ordering::Less);

        let desc = RowComparator::new(vec![SortOption::desc("v")]);
        assert_eq!(desc.compare(&tree, a, b), Ordering::Greater);
    }

    #[test]
    fn test_compare_multi_field_and_missing() {
        let mut tree = RowTree::new();
        let a = row(&mut tree, &[("k", Value::from(1)), ("n", Value::from("b"))]);
        let b = row(&mut tree, &[("k", Value::from(1)), ("n", Value::from("a"))]);
        let c = row(&mut tree, &[("n", Value::from("a"))]);

        let cmp = RowComparator::new(vec![SortOption::asc("k"), SortOption::asc("n")]);
        assert_eq!(cmp.compare(&tree, a, b), Ordering::Greater);
        // missing field sorts as null, first
        assert_eq!(cmp.compare(&tree, c, b), Ordering::Less);
    }

    #[test]
    fn test_custom_comparator() {
        let mut tree = RowTree::new();
        let a = row(&mut tree, &[("s", Value::from("B"))]);
        let b = row(&mut tree, &[("s", Value::from("a"))]);

        let plain = RowComparator::new(vec![SortOption::asc("s")]);
        assert_eq!(plain.compare(&tree, a, b), Ordering::Less);

        let ci = plain.with_comparator(
            "s",
            Rc::new(|x: &Value, y: &Value| {
                let x = x.as_str().unwrap_or_default().to_lowercase();
                let y = y.as_str().unwrap_or_default().to_lowercase();
                x.cmp(&y)
            }),
        );
        assert_eq!(ci.compare(&tree, a, b), Ordering::Greater);
    }

    #[test]
    fn test_references_any() {
        let cmp = RowComparator::new(vec![SortOption::asc("country")]);
        assert!(cmp.references_any(&["country".to_string()]));
        assert!(!cmp.references_any(&["year".to_string()]));
        assert!(!RowComparator::default().is_active());
    }
}
