//! Raw row data captured alongside a freshly read entity.

use crate::descriptor::FieldDescriptor;
use crate::value::Value;
use std::collections::HashMap;

/// Flat column values of a just-read row.
///
/// Keys are stored lower-cased so lookups by field name or column name are
/// case-insensitive. The lazy layer only reads it to find the raw foreign key
/// of an owned single-valued relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    values: HashMap<String, Value>,
}

impl RowData {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value (builder style).
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value under the lower-cased key.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    /// Get a non-null value by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values
            .get(&key.to_lowercase())
            .filter(|value| !value.is_null())
    }

    /// Number of stored columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Find the raw id of an owned single-valued relation.
    ///
    /// Tries the field name first, then the column name with underscores
    /// removed (`manager_id` is read back as `managerid`).
    pub fn relation_id(&self, field: &FieldDescriptor) -> Option<&Value> {
        self.get(field.name())
            .or_else(|| self.get(&field.column_name().replace('_', "")))
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for RowData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RowData::new();
        for (key, value) in iter {
            row.insert(key.as_ref(), value);
        }
        row
    }
}
