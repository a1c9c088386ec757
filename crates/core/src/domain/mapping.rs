use std::collections::HashSet;

use crate::errors::DomainError;

/// Bidirectional table between wire keys and entity attribute names for one
/// entity type.
#[derive(Clone, Copy, Debug)]
pub struct FieldMapping {
    entries: &'static [(&'static str, &'static str)],
}

impl FieldMapping {
    /// Entries are `(wire_key, attribute)` pairs.
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }

    pub fn attribute_for(&self, wire_key: &str) -> Option<&'static str> {
        self.entries.iter().find(|(wire, _)| *wire == wire_key).map(|(_, attribute)| *attribute)
    }

    pub fn wire_key_for(&self, attribute: &str) -> Option<&'static str> {
        self.entries.iter().find(|(_, attr)| *attr == attribute).map(|(wire, _)| *wire)
    }

    pub fn is_mapped(&self, wire_key: &str) -> bool {
        self.attribute_for(wire_key).is_some()
    }

    /// Checks that no two wire keys map to the same attribute and no wire key
    /// appears twice.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut wire_keys = HashSet::new();
        let mut attributes = HashSet::new();
        for (wire, attribute) in self.entries {
            if !wire_keys.insert(*wire) {
                return Err(DomainError::DuplicateWireKey { wire_key: (*wire).to_string() });
            }
            if !attributes.insert(*attribute) {
                return Err(DomainError::NonInjectiveMapping {
                    attribute: (*attribute).to_string(),
                    wire_key: (*wire).to_string(),
                });
            }
        }
        Ok(())
    }
}
