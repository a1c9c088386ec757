use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use crmbridge_core::BitrixConfig;
use tracing::{debug, info};

use crate::capabilities::DEFAULT_PAGE_SIZE;
use crate::client::BitrixClient;
use crate::errors::RegistryError;
use crate::repositories::{ContactRepository, CrmRepository, DealRepository};

/// Repositories by entity type tag. Tags match case-insensitively; when two
/// repositories claim the same tag, the first registration wins.
#[derive(Clone, Default)]
pub struct RepositoryRegistry {
    repositories: HashMap<String, Arc<dyn CrmRepository>>,
    order: Vec<String>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default registry: contacts and deals sharing one client.
    pub fn bitrix(client: Arc<dyn BitrixClient>) -> Self {
        Self::contacts_and_deals(client, DEFAULT_PAGE_SIZE)
    }

    /// [`Self::bitrix`] with the page size taken from `config`.
    pub fn from_config(client: Arc<dyn BitrixClient>, config: &BitrixConfig) -> Self {
        Self::contacts_and_deals(client, config.page_size as usize)
    }

    fn contacts_and_deals(client: Arc<dyn BitrixClient>, page_size: usize) -> Self {
        let contacts =
            Arc::new(ContactRepository::new(client.clone()).with_page_size(page_size));
        let deals =
            Arc::new(DealRepository::new(client, contacts.clone()).with_page_size(page_size));
        let registry = Self::new().with(contacts).with(deals);
        info!(
            event_name = "bitrix.registry.initialized",
            entity_types = ?registry.entity_types(),
            page_size,
            "repository registry initialized"
        );
        registry
    }

    /// Returns `false` when the tag was already taken.
    pub fn register(&mut self, repository: Arc<dyn CrmRepository>) -> bool {
        let tag = repository.tag().to_ascii_lowercase();
        if self.repositories.contains_key(&tag) {
            debug!(
                event_name = "bitrix.registry.duplicate_ignored",
                entity_type = %tag,
                "repository already registered for entity type"
            );
            return false;
        }
        self.order.push(tag.clone());
        self.repositories.insert(tag, repository);
        true
    }

    pub fn with(mut self, repository: Arc<dyn CrmRepository>) -> Self {
        self.register(repository);
        self
    }

    pub fn get_repository(
        &self,
        entity_type: &str,
    ) -> Result<Arc<dyn CrmRepository>, RegistryError> {
        self.repositories
            .get(&entity_type.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEntityType(entity_type.to_string()))
    }

    /// Typed lookup, e.g. `registry.get::<DealRepository>("deal")`.
    pub fn get<R: CrmRepository>(&self, entity_type: &str) -> Result<Arc<R>, RegistryError> {
        self.get_repository(entity_type)?.into_any().downcast::<R>().map_err(|_| {
            RegistryError::TypeMismatch {
                entity_type: entity_type.to_string(),
                expected: type_name::<R>(),
            }
        })
    }

    /// Registered tags in registration order.
    pub fn entity_types(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
