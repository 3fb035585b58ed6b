//! Application records.
//!
//! A `Record` is the opaque payload a row entity carries. Records are shared
//! through `RecordRef` so that the same object can be recognised by pointer
//! identity when no id function is configured.

use crate::value::Value;
use hashbrown::HashMap;
use std::rc::Rc;

/// Shared handle to an application record.
pub type RecordRef = Rc<Record>;

/// A named-field record, optionally with nested child records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: HashMap<String, Value>,
    children: Vec<RecordRef>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(name, value)` pairs.
    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            children: Vec::new(),
        }
    }

    /// Sets a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Attaches nested child records, builder style.
    pub fn with_children(mut self, children: Vec<RecordRef>) -> Self {
        self.children = children;
        self
    }

    /// Wraps the record into a shared handle.
    #[inline]
    pub fn into_ref(self) -> RecordRef {
        Rc::new(self)
    }

    /// Gets a field value.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Returns the nested child records.
    #[inline]
    pub fn children(&self) -> &[RecordRef] {
        &self.children
    }

    /// Returns the number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in arbitrary order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts a JSON object into a record.
    ///
    /// Scalar members become fields. An array stored under `children_key` is
    /// converted recursively into nested children; any other array or object
    /// member is skipped. Returns `None` if `json` is not an object.
    pub fn from_json(json: &serde_json::Value, children_key: Option<&str>) -> Option<Self> {
        let object = json.as_object()?;
        let mut record = Record::new();
        for (key, member) in object {
            if Some(key.as_str()) == children_key {
                if let Some(items) = member.as_array() {
                    record.children = items
                        .iter()
                        .filter_map(|item| Record::from_json(item, children_key))
                        .map(Record::into_ref)
                        .collect();
                }
                continue;
            }
            if let Some(value) = Value::from_json(member) {
                record.fields.insert(key.clone(), value);
            }
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields() {
        let mut record = Record::from_fields([("id", Value::from(1)), ("v", Value::from("a"))]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("v"), Some(&Value::from("a")));
        assert_eq!(record.set("v", "b"), Some(Value::from("a")));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_record_identity() {
        let a = Record::new().with("id", 1).into_ref();
        let b = Record::new().with("id", 1).into_ref();
        assert_eq!(*a, *b);
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_record_from_json_nested() {
        let json = serde_json::json!({
            "id": "root",
            "tags": ["x"],
            "children": [{"id": "c1"}, {"id": "c2", "children": [{"id": "g"}]}]
        });
        let record = Record::from_json(&json, Some("children")).unwrap();
        assert_eq!(record.get("id"), Some(&Value::from("root")));
        assert!(record.get("tags").is_none());
        assert_eq!(record.children().len(), 2);
        assert_eq!(record.children()[1].children().len(), 1);

        assert!(Record::from_json(&serde_json::json!(3), None).is_none());
    }
}
