use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use crmbridge_core::{Contact, Deal, Entity, EntityId, WireRecord};
use serde_json::{json, Value};

use super::contact::linked_ids;
use super::{BitrixRepository, ContactRepository, EntityRepository};
use crate::capabilities::{report_failure, result_of, EntityMethods, ListQuery};
use crate::client::BitrixClient;
use crate::errors::RepositoryError;

pub const DEAL_TAG: &str = "deal";

const CONTACT_ADD_METHOD: &str = "crm.deal.contact.add";
const CONTACT_DELETE_METHOD: &str = "crm.deal.contact.delete";
const CONTACT_ITEMS_METHOD: &str = "crm.deal.contact.items.get";
const CATEGORY_LIST_METHOD: &str = "crm.dealcategory.list";
const CATEGORY_STAGE_LIST_METHOD: &str = "crm.dealcategory.stage.list";
const CONTACT_LINK_FIELD: &str = "CONTACT_ID";

/// Deals over `crm.deal.*`. Fetched deals carry their linked contact ids,
/// which the remote does not return with the deal itself.
pub struct DealRepository {
    inner: BitrixRepository<Deal>,
    client: Arc<dyn BitrixClient>,
    contacts: Arc<ContactRepository>,
}

impl DealRepository {
    pub fn new(client: Arc<dyn BitrixClient>, contacts: Arc<ContactRepository>) -> Self {
        Self {
            inner: BitrixRepository::new(client.clone(), DEAL_TAG, EntityMethods::crm(DEAL_TAG)),
            client,
            contacts,
        }
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        Self { inner: self.inner.with_page_size(page_size), ..self }
    }

    pub fn contacts(&self) -> &Arc<ContactRepository> {
        &self.contacts
    }

    /// The deal with `contact_ids` filled from its link records.
    pub async fn get_by_id(&self, id: EntityId) -> Option<Deal> {
        let mut deal = self.inner.get_by_id(id).await?;
        deal.contact_ids = self.contact_ids(id).await;
        Some(deal)
    }

    pub async fn try_get_by_id(&self, id: EntityId) -> Result<Deal, RepositoryError> {
        let mut deal = self.inner.try_get_by_id(id).await?;
        let links =
            self.inner.relationships().try_get_related_items(CONTACT_ITEMS_METHOD, id).await?;
        deal.contact_ids = linked_ids(&links, CONTACT_LINK_FIELD);
        Ok(deal)
    }

    /// One page of deals; the contact links of the whole page are fetched
    /// in a single batch.
    pub async fn list_entities(&self, query: &ListQuery) -> Vec<Deal> {
        let mut deals = self.inner.list_entities(query).await;
        let ids: Vec<EntityId> = deals.iter().filter_map(|deal| deal.id).collect();
        let mut links = self
            .inner
            .batcher()
            .batch_get_by_ids(CONTACT_ITEMS_METHOD, &ids, |raw| match raw {
                Value::Array(links) => Some(linked_ids(&links, CONTACT_LINK_FIELD)),
                _ => None,
            })
            .await;

        for deal in &mut deals {
            if let Some(contact_ids) = deal.id.and_then(|id| links.remove(&id)) {
                deal.contact_ids = contact_ids;
            }
        }
        deals
    }

    pub async fn update_stage(&self, deal_id: EntityId, stage_id: &str) -> bool {
        let mut fields = WireRecord::new();
        fields.insert("STAGE_ID".to_string(), json!(stage_id));
        self.inner.update_fields(deal_id, fields).await
    }

    pub async fn add_contact(&self, deal_id: EntityId, contact_id: EntityId) -> bool {
        self.inner
            .relationships()
            .add_relationship(CONTACT_ADD_METHOD, deal_id, contact_id, CONTACT_LINK_FIELD)
            .await
    }

    pub async fn remove_contact(&self, deal_id: EntityId, contact_id: EntityId) -> bool {
        self.inner
            .relationships()
            .remove_relationship(CONTACT_DELETE_METHOD, deal_id, contact_id, CONTACT_LINK_FIELD)
            .await
    }

    /// Contacts linked to the deal, fully loaded.
    pub async fn get_contacts(&self, deal_id: EntityId) -> Vec<Contact> {
        self.contacts.get_deal_contacts(deal_id).await
    }

    /// Deal categories (pipelines) as returned by the remote.
    pub async fn get_categories(&self) -> Value {
        self.lookup(CATEGORY_LIST_METHOD, json!({}), "categories").await
    }

    /// Stages of one category; `0` is the default pipeline.
    pub async fn get_stages(&self, category_id: EntityId) -> Value {
        self.lookup(CATEGORY_STAGE_LIST_METHOD, json!({ "ID": category_id }), "stages").await
    }

    async fn contact_ids(&self, deal_id: EntityId) -> Vec<EntityId> {
        let links =
            self.inner.relationships().get_related_items(CONTACT_ITEMS_METHOD, deal_id).await;
        linked_ids(&links, CONTACT_LINK_FIELD)
    }

    async fn lookup(&self, method: &str, params: Value, subject: &str) -> Value {
        let outcome = match self.client.call(method, params).await {
            Ok(envelope) => result_of(envelope, method),
            Err(error) => Err(error.into()),
        };
        outcome.unwrap_or_else(|error| {
            report_failure("bitrix.deal.lookup.failed", Deal::NAME, subject, &error);
            Value::Object(WireRecord::new())
        })
    }
}

impl Deref for DealRepository {
    type Target = BitrixRepository<Deal>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl EntityRepository for DealRepository {
    type Entity = Deal;

    fn entity_type(&self) -> &'static str {
        DEAL_TAG
    }

    async fn get_by_id(&self, id: EntityId) -> Option<Deal> {
        DealRepository::get_by_id(self, id).await
    }

    async fn list_entities(&self, query: &ListQuery) -> Vec<Deal> {
        DealRepository::list_entities(self, query).await
    }

    async fn get_fields(&self) -> WireRecord {
        self.inner.get_fields().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::DealRepository;
    use crate::capabilities::ListQuery;
    use crate::client::ClientError;
    use crate::repositories::ContactRepository;
    use crate::testing::FakeBitrixClient;

    fn deals(client: &Arc<FakeBitrixClient>) -> DealRepository {
        DealRepository::new(client.clone(), Arc::new(ContactRepository::new(client.clone())))
    }

    #[tokio::test]
    async fn get_by_id_fills_contact_ids_from_links() {
        let client = Arc::new(FakeBitrixClient::new());
        client
            .push_result(json!({"ID": "10", "TITLE": "Renewal", "STAGE_ID": "NEW"}))
            .push_result(json!([{"CONTACT_ID": "3"}, {"CONTACT_ID": "8"}]));

        let deal = deals(&client).get_by_id(10).await.expect("deal");

        assert_eq!(deal.contact_ids, vec![3, 8]);
        assert_eq!(client.methods(), vec!["crm.deal.get", "crm.deal.contact.items.get"]);
    }

    #[tokio::test]
    async fn missing_deal_skips_link_lookup() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!([]));

        assert!(deals(&client).get_by_id(10).await.is_none());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_link_lookup_leaves_deal_without_contacts() {
        let client = Arc::new(FakeBitrixClient::new());
        client
            .push_result(json!({"ID": "10"}))
            .push_error(ClientError::Timeout("slow".to_string()))
            .push_result(json!({"ID": "10"}))
            .push_error(ClientError::Timeout("slow".to_string()));
        let deals = deals(&client);

        let deal = deals.get_by_id(10).await.expect("deal");
        assert!(deal.contact_ids.is_empty());

        let error = deals.try_get_by_id(10).await.expect_err("links failed");
        assert_eq!(error.kind(), "timeout");
    }

    #[tokio::test]
    async fn list_hydrates_the_page_in_one_batch() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!([{"ID": "1"}, {"ID": "2"}, {"ID": "3"}]));
        client.push_batch_results(json!({
            "cmd0": [{"CONTACT_ID": "5"}],
            "cmd2": [{"CONTACT_ID": "6"}, {"CONTACT_ID": "7"}]
        }));

        let listed = deals(&client).list_entities(&ListQuery::new()).await;

        let contact_ids: Vec<_> = listed.iter().map(|deal| deal.contact_ids.clone()).collect();
        assert_eq!(contact_ids, vec![vec![5], vec![], vec![6, 7]]);
        assert_eq!(client.methods(), vec!["crm.deal.list", "batch"]);
        assert_eq!(
            client.calls()[1].params["cmd1"],
            json!({"method": "crm.deal.contact.items.get", "params": {"ID": 2}})
        );
    }

    #[tokio::test]
    async fn empty_page_needs_no_batch() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!([]));

        assert!(deals(&client).list_entities(&ListQuery::new()).await.is_empty());
        assert_eq!(client.methods(), vec!["crm.deal.list"]);
    }

    #[tokio::test]
    async fn stage_update_sends_only_the_stage() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!(true));

        assert!(deals(&client).update_stage(4, "C1:WON").await);
        assert_eq!(
            client.calls()[0].params,
            json!({"ID": 4, "fields": {"STAGE_ID": "C1:WON"}})
        );
    }

    #[tokio::test]
    async fn contact_links_use_the_deal_contact_methods() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!(true)).push_result(json!(true));
        let deals = deals(&client);

        assert!(deals.add_contact(4, 9).await);
        assert!(deals.remove_contact(4, 9).await);
        assert_eq!(client.methods(), vec!["crm.deal.contact.add", "crm.deal.contact.delete"]);
        assert_eq!(client.calls()[1].params, json!({"ID": 4, "fields": {"CONTACT_ID": 9}}));
    }

    #[tokio::test]
    async fn stages_and_categories_fall_back_to_empty() {
        let client = Arc::new(FakeBitrixClient::new());
        client
            .push_result(json!([{"STATUS_ID": "NEW", "NAME": "New"}]))
            .push_error(ClientError::Connection("down".to_string()));
        let deals = deals(&client);

        let stages = deals.get_stages(0).await;
        assert_eq!(stages[0]["STATUS_ID"], json!("NEW"));
        assert_eq!(client.calls()[0].params, json!({"ID": 0}));

        assert_eq!(deals.get_categories().await, json!({}));
    }
}
