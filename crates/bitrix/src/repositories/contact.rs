use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use crmbridge_core::domain::wire::coerce_id;
use crmbridge_core::{Contact, EntityId, WireRecord};
use serde_json::{json, Value};

use super::{BitrixRepository, EntityRepository};
use crate::capabilities::{add_in_filter, add_search_filter, EntityMethods, ListQuery};
use crate::client::BitrixClient;

pub const CONTACT_TAG: &str = "contact";

/// Result limit callers use for interactive searches.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

const DEAL_CONTACT_ITEMS_METHOD: &str = "crm.deal.contact.items.get";
const CONTACT_COMPANY_ITEMS_METHOD: &str = "crm.contact.company.items.get";

/// Contacts over `crm.contact.*`. Generic operations are reachable through
/// `Deref` to [`BitrixRepository`].
pub struct ContactRepository {
    inner: BitrixRepository<Contact>,
}

impl ContactRepository {
    pub fn new(client: Arc<dyn BitrixClient>) -> Self {
        Self { inner: BitrixRepository::new(client, CONTACT_TAG, EntityMethods::crm(CONTACT_TAG)) }
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        Self { inner: self.inner.with_page_size(page_size) }
    }

    /// Substring match on the first name.
    pub async fn search_by_name(&self, name: &str, limit: usize) -> Vec<Contact> {
        self.search(add_search_filter("NAME", name, false), limit).await
    }

    pub async fn search_by_phone(&self, phone: &str, limit: usize) -> Vec<Contact> {
        self.search(add_search_filter("PHONE", phone, true), limit).await
    }

    pub async fn search_by_email(&self, email: &str, limit: usize) -> Vec<Contact> {
        self.search(add_search_filter("EMAIL", email, true), limit).await
    }

    /// Contacts linked to a deal: one call for the link records, one for the
    /// contacts themselves.
    pub async fn get_deal_contacts(&self, deal_id: EntityId) -> Vec<Contact> {
        let links =
            self.inner.relationships().get_related_items(DEAL_CONTACT_ITEMS_METHOD, deal_id).await;
        self.load_by_ids(&linked_ids(&links, "CONTACT_ID")).await
    }

    /// Contacts with the given ids, in remote order. The ids are split into
    /// groups of one page size with one list call per group, since a single
    /// call never returns more than a page. Unknown ids, and the ids of a
    /// group whose call failed, are skipped.
    pub async fn load_by_ids(&self, ids: &[EntityId]) -> Vec<Contact> {
        let mut contacts = Vec::with_capacity(ids.len());
        for group in ids.chunks(self.inner.paginator().page_size()) {
            let mut filter = add_in_filter("ID", group.iter().copied(), false);
            filter.insert("CHECK_PERMISSIONS".to_string(), json!("N"));
            let query = ListQuery::new().filter(filter).limit(group.len());
            contacts.extend(self.inner.list_entities(&query).await);
        }
        contacts
    }

    /// Raw company link records of a contact.
    pub async fn get_contact_companies(&self, contact_id: EntityId) -> Vec<Value> {
        self.inner.relationships().get_related_items(CONTACT_COMPANY_ITEMS_METHOD, contact_id).await
    }

    async fn search(&self, mut filter: WireRecord, limit: usize) -> Vec<Contact> {
        filter.insert("CHECK_PERMISSIONS".to_string(), json!("N"));
        self.inner.list_entities(&ListQuery::new().filter(filter).limit(limit)).await
    }
}

/// Ids under `field` in link records; records without a usable id are
/// skipped.
pub(crate) fn linked_ids(links: &[Value], field: &str) -> Vec<EntityId> {
    links.iter().filter_map(|link| link.get(field).and_then(coerce_id)).collect()
}

impl Deref for ContactRepository {
    type Target = BitrixRepository<Contact>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl EntityRepository for ContactRepository {
    type Entity = Contact;

    fn entity_type(&self) -> &'static str {
        CONTACT_TAG
    }

    async fn get_by_id(&self, id: EntityId) -> Option<Contact> {
        self.inner.get_by_id(id).await
    }

    async fn list_entities(&self, query: &ListQuery) -> Vec<Contact> {
        self.inner.list_entities(query).await
    }

    async fn get_fields(&self) -> WireRecord {
        self.inner.get_fields().await
    }
}
