use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, WireReader, WireWriter};
use crate::domain::mapping::FieldMapping;
use crate::domain::wire::{parse_wire_datetime, EntityId, WireRecord};

const FINAL_STAGE_SUFFIXES: [&str; 2] = ["WON", "LOSE"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Option<EntityId>,
    pub title: Option<String>,
    pub stage_id: Option<String>,
    pub company_id: Option<EntityId>,
    pub opportunity: Option<f64>,
    pub currency_id: Option<String>,
    pub assigned_by_id: Option<EntityId>,
    pub created_by_id: Option<EntityId>,
    pub modified_by_id: Option<EntityId>,
    pub date_create: Option<String>,
    pub date_modify: Option<String>,
    pub contact_ids: Vec<EntityId>,
    pub category_id: Option<EntityId>,
    pub additional_fields: WireRecord,
}

impl Deal {
    /// A deal is active until it reaches a won or lost stage. Stage ids are
    /// either bare (`WON`) or prefixed with a pipeline (`C14:WON`).
    pub fn is_active(&self) -> bool {
        let Some(stage) = self.stage_id.as_deref() else {
            return true;
        };
        let status = stage.rsplit(':').next().unwrap_or(stage);
        !FINAL_STAGE_SUFFIXES.contains(&status)
    }

    pub fn amount(&self) -> f64 {
        self.opportunity.unwrap_or(0.0)
    }

    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date_create.as_deref().and_then(parse_wire_datetime)
    }

    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date_modify.as_deref().and_then(parse_wire_datetime)
    }
}

impl Entity for Deal {
    const NAME: &'static str = "Deal";
    const FIELD_MAPPING: FieldMapping = FieldMapping::new(&[
        ("ID", "id"),
        ("TITLE", "title"),
        ("STAGE_ID", "stage_id"),
        ("COMPANY_ID", "company_id"),
        ("OPPORTUNITY", "opportunity"),
        ("CURRENCY_ID", "currency_id"),
        ("ASSIGNED_BY_ID", "assigned_by_id"),
        ("CREATED_BY_ID", "created_by_id"),
        ("MODIFY_BY_ID", "modified_by_id"),
        ("DATE_CREATE", "date_create"),
        ("DATE_MODIFY", "date_modify"),
        ("CONTACT_IDS", "contact_ids"),
        ("CATEGORY_ID", "category_id"),
    ]);

    fn from_wire(record: &WireRecord) -> Self {
        let reader = WireReader::new(record, Self::FIELD_MAPPING);
        Self {
            id: reader.id("id"),
            title: reader.text("title"),
            stage_id: reader.text("stage_id"),
            company_id: reader.id("company_id"),
            opportunity: reader.amount("opportunity"),
            currency_id: reader.text("currency_id"),
            assigned_by_id: reader.id("assigned_by_id"),
            created_by_id: reader.id("created_by_id"),
            modified_by_id: reader.id("modified_by_id"),
            date_create: reader.text("date_create"),
            date_modify: reader.text("date_modify"),
            contact_ids: reader.id_list("contact_ids"),
            category_id: reader.id("category_id"),
            additional_fields: reader.additional_fields(),
        }
    }

    fn to_wire(&self) -> WireRecord {
        let mut writer = WireWriter::new(Self::FIELD_MAPPING);
        writer
            .id("id", self.id)
            .text("title", self.title.as_deref())
            .text("stage_id", self.stage_id.as_deref())
            .id("company_id", self.company_id)
            .amount("opportunity", self.opportunity)
            .text("currency_id", self.currency_id.as_deref())
            .id("assigned_by_id", self.assigned_by_id)
            .id("created_by_id", self.created_by_id)
            .id("modified_by_id", self.modified_by_id)
            .text("date_create", self.date_create.as_deref())
            .text("date_modify", self.date_modify.as_deref())
            .id_list("contact_ids", &self.contact_ids)
            .id("category_id", self.category_id);
        writer.finish(&self.additional_fields)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn additional_fields(&self) -> &WireRecord {
        &self.additional_fields
    }
}
