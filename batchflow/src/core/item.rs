//! Input item type: one row of the source dataset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A map of named JSON fields, used for rows, metrics and aggregates.
pub type Fields = HashMap<String, serde_json::Value>;

/// One row of the source dataset.
///
/// Items are immutable once read. An optional caller-configured identifier
/// field is used for checkpointing; items without that field are never
/// filtered by the checkpoint store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The row's fields.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    /// Creates a new item from a field map.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self { fields }
    }

    /// Creates an item from a JSON object value.
    ///
    /// Non-object values produce an empty item.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self {
                fields: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Extracts the checkpoint identifier from the configured field.
    ///
    /// String values are used as-is; other scalar values are rendered to
    /// their JSON text. Missing or null fields yield `None`.
    #[must_use]
    pub fn identifier(&self, key_field: &str) -> Option<String> {
        match self.fields.get(key_field) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}
