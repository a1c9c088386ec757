//! The common entity shape and the reader/writer pair that every concrete
//! entity uses to move between wire records and typed attributes.

use std::fmt::Debug;

use serde::Serialize;
use serde_json::Value;

use crate::domain::mapping::FieldMapping;
use crate::domain::multi_field::MultiValueField;
use crate::domain::wire::{
    amount_to_wire, coerce_amount, coerce_id, coerce_id_list, coerce_text, id_list_to_wire,
    id_to_wire, EntityId, WireRecord,
};
use crate::errors::DomainError;

/// A domain object deserialized from a remote record.
///
/// `from_wire` never fails: missing or malformed optional attributes fall
/// back to their defaults, and every wire key without a mapping entry is
/// preserved in `additional_fields`.
pub trait Entity: Clone + Debug + Serialize + Send + Sync + 'static {
    /// Human-readable name used in log events.
    const NAME: &'static str;
    const FIELD_MAPPING: FieldMapping;

    fn from_wire(record: &WireRecord) -> Self;
    fn to_wire(&self) -> WireRecord;
    fn id(&self) -> Option<EntityId>;
    fn additional_fields(&self) -> &WireRecord;
}

/// Translates a partial update keyed by entity attribute names into wire
/// keys, rejecting attributes the entity does not map.
pub fn attributes_to_wire<E, I, K>(attributes: I) -> Result<WireRecord, DomainError>
where
    E: Entity,
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut record = WireRecord::new();
    for (attribute, value) in attributes {
        let attribute = attribute.as_ref();
        let wire_key = E::FIELD_MAPPING.wire_key_for(attribute).ok_or_else(|| {
            DomainError::UnknownAttribute { entity: E::NAME, attribute: attribute.to_string() }
        })?;
        record.insert(wire_key.to_string(), value);
    }
    Ok(record)
}

pub struct WireReader<'a> {
    record: &'a WireRecord,
    mapping: FieldMapping,
}

impl<'a> WireReader<'a> {
    pub fn new(record: &'a WireRecord, mapping: FieldMapping) -> Self {
        Self { record, mapping }
    }

    fn raw(&self, attribute: &str) -> Option<&'a Value> {
        let wire_key = self.mapping.wire_key_for(attribute);
        debug_assert!(wire_key.is_some(), "attribute `{attribute}` missing from field mapping");
        self.record.get(wire_key?).filter(|value| !value.is_null())
    }

    pub fn text(&self, attribute: &str) -> Option<String> {
        self.raw(attribute).and_then(coerce_text)
    }

    pub fn id(&self, attribute: &str) -> Option<EntityId> {
        self.raw(attribute).and_then(coerce_id)
    }

    pub fn amount(&self, attribute: &str) -> Option<f64> {
        self.raw(attribute).and_then(coerce_amount)
    }

    pub fn id_list(&self, attribute: &str) -> Vec<EntityId> {
        self.raw(attribute).map(coerce_id_list).unwrap_or_default()
    }

    pub fn multi_values(&self, attribute: &str) -> Vec<MultiValueField> {
        self.raw(attribute).map(MultiValueField::list_from_wire).unwrap_or_default()
    }

    /// Every wire key that has no mapping entry, copied verbatim.
    pub fn additional_fields(&self) -> WireRecord {
        self.record
            .iter()
            .filter(|(key, _)| !self.mapping.is_mapped(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

pub struct WireWriter {
    mapping: FieldMapping,
    record: WireRecord,
}

impl WireWriter {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping, record: WireRecord::new() }
    }

    fn put(&mut self, attribute: &str, value: Value) {
        let wire_key = self.mapping.wire_key_for(attribute);
        debug_assert!(wire_key.is_some(), "attribute `{attribute}` missing from field mapping");
        if let Some(wire_key) = wire_key {
            self.record.insert(wire_key.to_string(), value);
        }
    }

    pub fn text(&mut self, attribute: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.put(attribute, Value::String(value.to_string()));
        }
        self
    }

    pub fn id(&mut self, attribute: &str, value: Option<EntityId>) -> &mut Self {
        if let Some(value) = value {
            self.put(attribute, id_to_wire(value));
        }
        self
    }

    pub fn amount(&mut self, attribute: &str, value: Option<f64>) -> &mut Self {
        if let Some(value) = value {
            self.put(attribute, amount_to_wire(value));
        }
        self
    }

    pub fn id_list(&mut self, attribute: &str, ids: &[EntityId]) -> &mut Self {
        if !ids.is_empty() {
            self.put(attribute, id_list_to_wire(ids));
        }
        self
    }

    pub fn multi_values(&mut self, attribute: &str, fields: &[MultiValueField]) -> &mut Self {
        if !fields.is_empty() {
            self.put(attribute, MultiValueField::list_to_wire(fields));
        }
        self
    }

    /// Merges the additional fields last so they override mapped values on
    /// key collision.
    pub fn finish(self, additional_fields: &WireRecord) -> WireRecord {
        let mut record = self.record;
        for (key, value) in additional_fields {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}
