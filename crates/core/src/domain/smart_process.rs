use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, WireReader, WireWriter};
use crate::domain::mapping::FieldMapping;
use crate::domain::wire::{EntityId, WireRecord};

/// An item of a user-defined CRM process ("smart process"). Its wire keys
/// are the camelCase ones of the universal `crm.item.*` endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartProcess {
    pub id: Option<EntityId>,
    pub type_id: Option<EntityId>,
    pub title: Option<String>,
    pub stage_id: Option<String>,
    pub company_id: Option<EntityId>,
    pub assigned_by_id: Option<EntityId>,
    pub created_by_id: Option<EntityId>,
    pub modified_by_id: Option<EntityId>,
    pub date_create: Option<String>,
    pub date_modify: Option<String>,
    pub contact_ids: Vec<EntityId>,
    pub additional_fields: WireRecord,
}

impl SmartProcess {
    pub fn is_active(&self) -> bool {
        true
    }

    /// Element type tag used by cross-entity calls, e.g. `DYNAMIC_128`.
    pub fn element_type(&self) -> String {
        format!("DYNAMIC_{}", self.type_id.unwrap_or_default())
    }
}

impl Entity for SmartProcess {
    const NAME: &'static str = "SmartProcess";
    const FIELD_MAPPING: FieldMapping = FieldMapping::new(&[
        ("id", "id"),
        ("entityTypeId", "type_id"),
        ("title", "title"),
        ("stageId", "stage_id"),
        ("companyId", "company_id"),
        ("assignedById", "assigned_by_id"),
        ("createdBy", "created_by_id"),
        ("updatedBy", "modified_by_id"),
        ("createdTime", "date_create"),
        ("updatedTime", "date_modify"),
        ("contactIds", "contact_ids"),
    ]);

    fn from_wire(record: &WireRecord) -> Self {
        let reader = WireReader::new(record, Self::FIELD_MAPPING);
        Self {
            id: reader.id("id"),
            type_id: reader.id("type_id"),
            title: reader.text("title"),
            stage_id: reader.text("stage_id"),
            company_id: reader.id("company_id"),
            assigned_by_id: reader.id("assigned_by_id"),
            created_by_id: reader.id("created_by_id"),
            modified_by_id: reader.id("modified_by_id"),
            date_create: reader.text("date_create"),
            date_modify: reader.text("date_modify"),
            contact_ids: reader.id_list("contact_ids"),
            additional_fields: reader.additional_fields(),
        }
    }

    fn to_wire(&self) -> WireRecord {
        let mut writer = WireWriter::new(Self::FIELD_MAPPING);
        writer
            .id("id", self.id)
            .id("type_id", self.type_id)
            .text("title", self.title.as_deref())
            .text("stage_id", self.stage_id.as_deref())
            .id("company_id", self.company_id)
            .id("assigned_by_id", self.assigned_by_id)
            .id("created_by_id", self.created_by_id)
            .id("modified_by_id", self.modified_by_id)
            .text("date_create", self.date_create.as_deref())
            .text("date_modify", self.date_modify.as_deref())
            .id_list("contact_ids", &self.contact_ids);
        writer.finish(&self.additional_fields)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn additional_fields(&self) -> &WireRecord {
        &self.additional_fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::entity::Entity;

    use super::SmartProcess;

    #[test]
    fn element_type_uses_numeric_type_id() {
        let raw = json!({"id": 3, "entityTypeId": 128, "contactIds": [4, 5]});
        let item = SmartProcess::from_wire(raw.as_object().expect("object"));

        assert_eq!(item.type_id, Some(128));
        assert_eq!(item.contact_ids, vec![4, 5]);
        assert_eq!(item.element_type(), "DYNAMIC_128");
        assert!(item.is_active());
    }

    #[test]
    fn item_payload_fills_typed_attributes() {
        let raw = json!({
            "id": 7,
            "title": "Audit",
            "stageId": "DT128_1:NEW",
            "assignedById": 1,
            "updatedBy": "2",
            "ufCrm5Priority": "high"
        });
        let item = SmartProcess::from_wire(raw.as_object().expect("object"));

        assert_eq!(item.id, Some(7));
        assert_eq!(item.title.as_deref(), Some("Audit"));
        assert_eq!(item.stage_id.as_deref(), Some("DT128_1:NEW"));
        assert_eq!(item.assigned_by_id, Some(1));
        assert_eq!(item.modified_by_id, Some(2));
        assert_eq!(item.additional_fields.keys().collect::<Vec<_>>(), vec!["ufCrm5Priority"]);

        let wire = item.to_wire();
        assert_eq!(wire["stageId"], json!("DT128_1:NEW"));
        assert_eq!(wire["ufCrm5Priority"], json!("high"));
        assert!(!wire.contains_key("STAGE_ID"));
    }

    #[test]
    fn mapping_is_injective() {
        SmartProcess::FIELD_MAPPING.validate().expect("smart process mapping must be injective");
    }
}
