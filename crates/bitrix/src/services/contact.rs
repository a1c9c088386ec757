use std::sync::Arc;

use crmbridge_core::{attributes_to_wire, Contact, DomainError, EntityId};
use serde_json::{json, Value};

use crate::capabilities::ListQuery;
use crate::errors::RegistryError;
use crate::registry::RepositoryRegistry;
use crate::repositories::contact::CONTACT_TAG;
use crate::repositories::ContactRepository;

/// Which contact attribute a search query is matched against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContactSearch {
    #[default]
    Name,
    Phone,
    Email,
}

impl std::str::FromStr for ContactSearch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            other => Err(format!("unsupported contact search `{other}`")),
        }
    }
}

pub struct ContactService {
    contacts: Arc<ContactRepository>,
}

impl ContactService {
    pub fn new(contacts: Arc<ContactRepository>) -> Self {
        Self { contacts }
    }

    pub fn from_registry(registry: &RepositoryRegistry) -> Result<Self, RegistryError> {
        Ok(Self::new(registry.get::<ContactRepository>(CONTACT_TAG)?))
    }

    pub async fn get_contact(&self, contact_id: EntityId) -> Option<Contact> {
        self.contacts.get_by_id(contact_id).await
    }

    pub async fn search_contacts(
        &self,
        query: &str,
        search: ContactSearch,
        limit: usize,
    ) -> Vec<Contact> {
        match search {
            ContactSearch::Name => self.contacts.search_by_name(query, limit).await,
            ContactSearch::Phone => self.contacts.search_by_phone(query, limit).await,
            ContactSearch::Email => self.contacts.search_by_email(query, limit).await,
        }
    }

    /// Newest contacts first, optionally restricted to one company.
    pub async fn list_contacts(&self, limit: usize, company_id: Option<EntityId>) -> Vec<Contact> {
        let mut query = ListQuery::new().limit(limit);
        if let Some(company_id) = company_id {
            query.filter.insert("COMPANY_ID".to_string(), json!(company_id));
        }
        self.contacts.list_entities(&query).await
    }

    pub async fn get_deal_contacts(&self, deal_id: EntityId) -> Vec<Contact> {
        self.contacts.get_deal_contacts(deal_id).await
    }

    pub async fn create_contact(&self, contact: &Contact) -> Option<EntityId> {
        self.contacts.create(contact).await
    }

    pub async fn update_contact(&self, contact_id: EntityId, contact: &Contact) -> bool {
        self.contacts.update(contact_id, contact).await
    }

    /// Partial update keyed by attribute name (`name`, `company_id`, ...).
    /// Unknown attributes are rejected before anything is sent.
    pub async fn update_contact_fields<I, K>(
        &self,
        contact_id: EntityId,
        attributes: I,
    ) -> Result<bool, DomainError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let fields = attributes_to_wire::<Contact, _, _>(attributes)?;
        Ok(self.contacts.update_fields(contact_id, fields).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crmbridge_core::DomainError;
    use serde_json::json;

    use super::{ContactSearch, ContactService};
    use crate::registry::RepositoryRegistry;
    use crate::testing::FakeBitrixClient;

    fn service(client: &Arc<FakeBitrixClient>) -> ContactService {
        ContactService::from_registry(&RepositoryRegistry::bitrix(client.clone()))
            .expect("contact repository registered")
    }

    #[test]
    fn search_kind_parses_case_insensitively() {
        assert_eq!("Phone".parse::<ContactSearch>(), Ok(ContactSearch::Phone));
        assert_eq!(" email ".parse::<ContactSearch>(), Ok(ContactSearch::Email));
        assert!("fax".parse::<ContactSearch>().is_err());
    }

    #[test]
    fn empty_registry_cannot_build_service() {
        assert!(ContactService::from_registry(&RepositoryRegistry::new()).is_err());
    }

    #[tokio::test]
    async fn search_dispatches_on_kind() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!([
            {"ID": "2", "EMAIL": [{"VALUE": "a@b.c", "VALUE_TYPE": "WORK"}]}
        ]));
        let service = service(&client);

        let found = service.search_contacts("a@b.c", ContactSearch::Email, 5).await;

        assert_eq!(found[0].primary_email(), Some("a@b.c"));
        assert_eq!(client.calls()[0].params["filter"]["EMAIL"], json!("a@b.c"));
    }

    #[tokio::test]
    async fn list_filters_by_company_when_given() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!([])).push_result(json!([]));
        let service = service(&client);

        service.list_contacts(20, Some(7)).await;
        service.list_contacts(20, None).await;

        let calls = client.calls();
        assert_eq!(calls[0].params["filter"], json!({"COMPANY_ID": 7}));
        assert!(calls[1].params.get("filter").is_none());
    }

    #[tokio::test]
    async fn field_update_translates_attribute_names() {
        let client = Arc::new(FakeBitrixClient::new());
        client.push_result(json!(true));
        let service = service(&client);

        let updated = service
            .update_contact_fields(3, [("last_name", json!("Petrova"))])
            .await
            .expect("known attribute");

        assert!(updated);
        assert_eq!(client.calls()[0].params, json!({"ID": 3, "fields": {"LAST_NAME": "Petrova"}}));
    }

    #[tokio::test]
    async fn field_update_rejects_unknown_attributes_without_calling() {
        let client = Arc::new(FakeBitrixClient::new());
        let service = service(&client);

        let error = service
            .update_contact_fields(3, [("nickname", json!("Pet"))])
            .await
            .expect_err("unknown attribute");

        assert!(matches!(error, DomainError::UnknownAttribute { .. }));
        assert_eq!(client.call_count(), 0);
    }
}
