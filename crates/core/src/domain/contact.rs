use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, WireReader, WireWriter};
use crate::domain::mapping::FieldMapping;
use crate::domain::multi_field::MultiValueField;
use crate::domain::wire::{parse_wire_datetime, EntityId, WireRecord};

const UNKNOWN_CONTACT: &str = "Unknown contact";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub second_name: Option<String>,
    pub email: Vec<MultiValueField>,
    pub phone: Vec<MultiValueField>,
    pub company_id: Option<EntityId>,
    pub assigned_by_id: Option<EntityId>,
    pub created_by_id: Option<EntityId>,
    pub modified_by_id: Option<EntityId>,
    pub date_create: Option<String>,
    pub date_modify: Option<String>,
    pub additional_fields: WireRecord,
}

impl Contact {
    /// First `WORK` address, otherwise the first address on file.
    pub fn primary_email(&self) -> Option<&str> {
        self.email
            .iter()
            .find(|email| email.is_type("WORK"))
            .or_else(|| self.email.first())
            .map(|email| email.value.as_str())
    }

    /// First `WORK` number, then the first `MOBILE`, otherwise the first on file.
    pub fn primary_phone(&self) -> Option<&str> {
        self.phone
            .iter()
            .find(|phone| phone.is_type("WORK"))
            .or_else(|| self.phone.iter().find(|phone| phone.is_type("MOBILE")))
            .or_else(|| self.phone.first())
            .map(|phone| phone.value.as_str())
    }

    /// Last name, first name and middle name joined by spaces.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [&self.last_name, &self.name, &self.second_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            UNKNOWN_CONTACT.to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date_create.as_deref().and_then(parse_wire_datetime)
    }

    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date_modify.as_deref().and_then(parse_wire_datetime)
    }
}

impl Entity for Contact {
    const NAME: &'static str = "Contact";
    const FIELD_MAPPING: FieldMapping = FieldMapping::new(&[
        ("ID", "id"),
        ("NAME", "name"),
        ("LAST_NAME", "last_name"),
        ("SECOND_NAME", "second_name"),
        ("EMAIL", "email"),
        ("PHONE", "phone"),
        ("COMPANY_ID", "company_id"),
        ("ASSIGNED_BY_ID", "assigned_by_id"),
        ("CREATED_BY_ID", "created_by_id"),
        ("MODIFY_BY_ID", "modified_by_id"),
        ("DATE_CREATE", "date_create"),
        ("DATE_MODIFY", "date_modify"),
    ]);

    fn from_wire(record: &WireRecord) -> Self {
        let reader = WireReader::new(record, Self::FIELD_MAPPING);
        Self {
            id: reader.id("id"),
            name: reader.text("name"),
            last_name: reader.text("last_name"),
            second_name: reader.text("second_name"),
            email: reader.multi_values("email"),
            phone: reader.multi_values("phone"),
            company_id: reader.id("company_id"),
            assigned_by_id: reader.id("assigned_by_id"),
            created_by_id: reader.id("created_by_id"),
            modified_by_id: reader.id("modified_by_id"),
            date_create: reader.text("date_create"),
            date_modify: reader.text("date_modify"),
            additional_fields: reader.additional_fields(),
        }
    }

    fn to_wire(&self) -> WireRecord {
        let mut writer = WireWriter::new(Self::FIELD_MAPPING);
        writer
            .id("id", self.id)
            .text("name", self.name.as_deref())
            .text("last_name", self.last_name.as_deref())
            .text("second_name", self.second_name.as_deref())
            .multi_values("email", &self.email)
            .multi_values("phone", &self.phone)
            .id("company_id", self.company_id)
            .id("assigned_by_id", self.assigned_by_id)
            .id("created_by_id", self.created_by_id)
            .id("modified_by_id", self.modified_by_id)
            .text("date_create", self.date_create.as_deref())
            .text("date_modify", self.date_modify.as_deref());
        writer.finish(&self.additional_fields)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn additional_fields(&self) -> &WireRecord {
        &self.additional_fields
    }
}
