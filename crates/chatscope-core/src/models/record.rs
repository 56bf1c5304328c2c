use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{aliases, UNKNOWN_SENDER};

/// Records are shared between the engine's row set, the visualization and
/// the selection; identity is the `Arc` pointer.
pub type RecordRef = Arc<Record>;

/// One message row with whatever columns the snapshot carried.
///
/// Snapshots drift between versions, so semantic fields are resolved through
/// alias families (see [`crate::constants::aliases`]) instead of fixed names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON object; any other JSON value is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// First non-null value among `family`, in family order.
    /// Exact key matches win over case-insensitive ones.
    pub fn get_alias(&self, family: &[&str]) -> Option<&Value> {
        family.iter().find_map(|alias| {
            let value = self.fields.get(*alias).or_else(|| {
                self.fields
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(alias))
                    .map(|(_, value)| value)
            })?;
            (!value.is_null()).then_some(value)
        })
    }

    pub fn timestamp_value(&self) -> Option<&Value> {
        self.get_alias(aliases::TIMESTAMP)
    }

    pub fn sender(&self) -> Option<String> {
        self.get_alias(aliases::SENDER).and_then(value_to_label)
    }

    /// Category label used for coloring
    pub fn sender_or_unknown(&self) -> String {
        self.sender().unwrap_or_else(|| UNKNOWN_SENDER.to_string())
    }

    pub fn text(&self) -> Option<String> {
        self.get_alias(aliases::TEXT).and_then(value_to_label)
    }

    pub fn chat(&self) -> Option<String> {
        self.get_alias(aliases::CHAT).and_then(value_to_label)
    }
}

/// Render a scalar JSON value as a display label. Empty strings count as absent.
pub fn value_to_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_alias_resolution_prefers_family_order() {
        let r = record(json!({"sender": "bob", "from": "alice"}));
        assert_eq!(r.sender().as_deref(), Some("alice"));
    }

    #[test]
    fn test_alias_resolution_is_case_insensitive() {
        let r = record(json!({"Sender_Name": "carol", "DATE": "2024-01-01"}));
        assert_eq!(r.sender().as_deref(), Some("carol"));
        assert_eq!(r.timestamp_value(), Some(&json!("2024-01-01")));
    }

    #[test]
    fn test_null_alias_falls_through() {
        let r = record(json!({"from": null, "sender": "dave"}));
        assert_eq!(r.sender().as_deref(), Some("dave"));
    }

    #[test]
    fn test_missing_sender_is_unknown() {
        let r = record(json!({"text": "hi"}));
        assert_eq!(r.sender_or_unknown(), "unknown");
        assert_eq!(r.text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_numeric_chat_id_is_label() {
        let r = record(json!({"group_chat_id": 42}));
        assert_eq!(r.chat().as_deref(), Some("42"));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
    }
}
