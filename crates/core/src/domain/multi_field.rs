use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::wire::{coerce_id, coerce_text, id_to_wire, EntityId, WireRecord};

/// One entry of a multi-valued wire attribute such as `EMAIL` or `PHONE`.
///
/// Wire shape: `{"ID": "123", "VALUE_TYPE": "WORK", "VALUE": "a@b.c", "TYPE_ID": "EMAIL"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiValueField {
    pub value: String,
    pub value_type: String,
    pub type_id: String,
    pub id: Option<EntityId>,
}

impl MultiValueField {
    pub fn new(
        value: impl Into<String>,
        value_type: impl Into<String>,
        type_id: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            value_type: value_type.into(),
            type_id: type_id.into(),
            id: None,
        }
    }

    pub fn from_wire(record: &WireRecord) -> Self {
        let text = |key: &str| record.get(key).and_then(coerce_text).unwrap_or_default();
        Self {
            value: text("VALUE"),
            value_type: text("VALUE_TYPE"),
            type_id: text("TYPE_ID"),
            id: record.get("ID").and_then(coerce_id),
        }
    }

    pub fn to_wire(&self) -> WireRecord {
        let mut record = WireRecord::new();
        record.insert("VALUE".to_string(), Value::String(self.value.clone()));
        record.insert("VALUE_TYPE".to_string(), Value::String(self.value_type.clone()));
        record.insert("TYPE_ID".to_string(), Value::String(self.type_id.clone()));
        if let Some(id) = self.id {
            record.insert("ID".to_string(), id_to_wire(id));
        }
        record
    }

    /// Parses a wire list of multi-value records, skipping entries that are
    /// not objects.
    pub fn list_from_wire(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_object).map(Self::from_wire).collect())
            .unwrap_or_default()
    }

    pub fn list_to_wire(fields: &[Self]) -> Value {
        Value::Array(fields.iter().map(|field| Value::Object(field.to_wire())).collect())
    }

    pub fn is_type(&self, value_type: &str) -> bool {
        self.value_type.eq_ignore_ascii_case(value_type)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::MultiValueField;

    #[test]
    fn reads_wire_record_with_string_id() {
        let raw = json!({
            "ID": "123",
            "VALUE_TYPE": "WORK",
            "VALUE": "ops@example.com",
            "TYPE_ID": "EMAIL"
        });
        let field = MultiValueField::from_wire(raw.as_object().expect("object"));

        assert_eq!(field.id, Some(123));
        assert_eq!(field.value, "ops@example.com");
        assert!(field.is_type("work"));
    }

    #[test]
    fn new_entries_omit_id_on_the_wire() {
        let field = MultiValueField::new("+100200300", "MOBILE", "PHONE");
        let wire = field.to_wire();

        assert!(!wire.contains_key("ID"));
        assert_eq!(wire.get("VALUE_TYPE"), Some(&json!("MOBILE")));
    }

    #[test]
    fn list_parsing_skips_non_objects() {
        let raw = json!([{"VALUE": "a@b.c", "VALUE_TYPE": "HOME", "TYPE_ID": "EMAIL"}, "junk", 3]);
        let fields = MultiValueField::list_from_wire(&raw);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value_type, "HOME");
        assert_eq!(fields[0].id, None);
    }
}
