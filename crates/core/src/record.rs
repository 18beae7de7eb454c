use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::field_value::FieldValue;

/// Stable, immutable identifier of a record (the part number on the catalog pages).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Result<Self, CoreError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of one row as read from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: RecordKey,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create a record whose key is also visible as the `key_field` column.
    pub fn new(key_field: &str, key: RecordKey) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(key_field.to_string(), FieldValue::Text(key.as_str().to_string()));
        Self { key, fields }
    }

    pub fn with_field(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Missing fields read as `Null`.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&FieldValue::Null)
    }

    /// Replace a field value, returning what was there before.
    pub fn set(&mut self, field: &str, value: FieldValue) -> FieldValue {
        self.fields
            .insert(field.to_string(), value)
            .unwrap_or(FieldValue::Null)
    }
}
