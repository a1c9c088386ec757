use std::sync::Arc;

use crmbridge_core::domain::wire::is_truthy;
use crmbridge_core::EntityId;
use serde_json::{json, Value};

use super::{report_failure, result_of};
use crate::client::BitrixClient;
use crate::errors::RepositoryError;

/// Link calls between an entity and related records, such as the contacts
/// of a deal.
#[derive(Clone)]
pub struct Relationships {
    client: Arc<dyn BitrixClient>,
    entity: &'static str,
}

impl Relationships {
    /// `entity` labels log events.
    pub fn new(client: Arc<dyn BitrixClient>, entity: &'static str) -> Self {
        Self { client, entity }
    }

    pub async fn try_add_relationship(
        &self,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        field_name: &str,
    ) -> Result<bool, RepositoryError> {
        self.link(method, entity_id, related_id, field_name).await
    }

    pub async fn add_relationship(
        &self,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        field_name: &str,
    ) -> bool {
        let outcome = self.try_add_relationship(method, entity_id, related_id, field_name).await;
        self.absorb("bitrix.relationship.add.failed", method, entity_id, related_id, outcome)
    }

    pub async fn try_remove_relationship(
        &self,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        field_name: &str,
    ) -> Result<bool, RepositoryError> {
        self.link(method, entity_id, related_id, field_name).await
    }

    pub async fn remove_relationship(
        &self,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        field_name: &str,
    ) -> bool {
        let outcome = self.try_remove_relationship(method, entity_id, related_id, field_name).await;
        self.absorb("bitrix.relationship.remove.failed", method, entity_id, related_id, outcome)
    }

    /// Raw link records of `entity_id`, e.g. `[{"CONTACT_ID": 3, ...}]`.
    pub async fn try_get_related_items(
        &self,
        method: &str,
        entity_id: EntityId,
    ) -> Result<Vec<Value>, RepositoryError> {
        let envelope = self.client.call(method, json!({ "ID": entity_id })).await?;
        match result_of(envelope, method)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            _ => Err(RepositoryError::WrongType { method: method.to_string(), expected: "array" }),
        }
    }

    pub async fn get_related_items(&self, method: &str, entity_id: EntityId) -> Vec<Value> {
        self.try_get_related_items(method, entity_id).await.unwrap_or_else(|error| {
            let subject = format!("{method} {entity_id}");
            report_failure("bitrix.relationship.items.failed", self.entity, &subject, &error);
            Vec::new()
        })
    }

    async fn link(
        &self,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        field_name: &str,
    ) -> Result<bool, RepositoryError> {
        let params = json!({ "ID": entity_id, "fields": { field_name: related_id } });
        let result = result_of(self.client.call(method, params).await?, method)?;
        Ok(is_truthy(&result))
    }

    fn absorb(
        &self,
        event_name: &'static str,
        method: &str,
        entity_id: EntityId,
        related_id: EntityId,
        outcome: Result<bool, RepositoryError>,
    ) -> bool {
        outcome.unwrap_or_else(|error| {
            let subject = format!("{method} {entity_id} -> {related_id}");
            report_failure(event_name, self.entity, &subject, &error);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::Relationships;
    use crate::client::ClientError;
    use crate::errors::RepositoryError;
    use crate::testing::FakeBitrixClient;

    fn links(client: &Arc<FakeBitrixClient>) -> Relationships {
        Relationships::new(client.clone(), "Deal")
    }

    #[tokio::test]
    async fn add_sends_link_field_triple() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!(true));

        assert!(links(&client).add_relationship("crm.deal.contact.add", 10, 3, "CONTACT_ID").await);
        let call = client.last_call().expect("recorded");
        assert_eq!(call.method, "crm.deal.contact.add");
        assert_eq!(call.params, json!({"ID": 10, "fields": {"CONTACT_ID": 3}}));
    }

    #[tokio::test]
    async fn remove_is_false_on_failure_or_falsy_result() {
        let client = Arc::new(FakeBitrixClient::new());
        client
            .push_result(json!(false))
            .push_error(ClientError::Connection("down".to_string()))
            .push_envelope(json!({"time": {}}));
        let links = links(&client);

        for _ in 0..3 {
            let removed =
                links.remove_relationship("crm.deal.contact.delete", 1, 2, "CONTACT_ID").await;
            assert!(!removed);
        }
    }

    #[tokio::test]
    async fn related_items_are_returned_raw() {
        let client = Arc::new(FakeBitrixClient::new());
        client
            .push_result(json!([{"CONTACT_ID": "3", "IS_PRIMARY": "Y"}, {"CONTACT_ID": "4"}]))
            .push_result(json!({"unexpected": true}));
        let links = links(&client);

        let items = links.get_related_items("crm.deal.contact.items.get", 10).await;
        assert_eq!(items.len(), 2);
        assert_eq!(client.calls()[0].params, json!({"ID": 10}));

        let error = links
            .try_get_related_items("crm.deal.contact.items.get", 10)
            .await
            .expect_err("object result");
        assert!(matches!(error, RepositoryError::WrongType { .. }));
    }
}
