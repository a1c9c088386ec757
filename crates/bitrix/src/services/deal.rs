use std::sync::Arc;

use crmbridge_core::{Deal, EntityId};
use serde_json::{json, Value};

use crate::capabilities::{ListQuery, DEFAULT_PAGE_SIZE};
use crate::errors::RegistryError;
use crate::registry::RepositoryRegistry;
use crate::repositories::deal::DEAL_TAG;
use crate::repositories::DealRepository;

/// Stage semantic of deals still in progress (neither won nor lost).
const IN_PROGRESS_SEMANTIC: &str = "P";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DealListOptions {
    pub active_only: bool,
    pub contact_id: Option<EntityId>,
    pub company_id: Option<EntityId>,
    pub limit: usize,
}

impl Default for DealListOptions {
    fn default() -> Self {
        Self { active_only: false, contact_id: None, company_id: None, limit: DEFAULT_PAGE_SIZE }
    }
}

impl DealListOptions {
    fn to_query(&self) -> ListQuery {
        let mut query = ListQuery::new().order("DATE_CREATE", "DESC").limit(self.limit);
        if self.active_only {
            query.filter.insert("STAGE_SEMANTIC_ID".to_string(), json!(IN_PROGRESS_SEMANTIC));
        }
        if let Some(contact_id) = self.contact_id {
            query.filter.insert("CONTACT_ID".to_string(), json!(contact_id));
        }
        if let Some(company_id) = self.company_id {
            query.filter.insert("COMPANY_ID".to_string(), json!(company_id));
        }
        query
    }
}

pub struct DealService {
    deals: Arc<DealRepository>,
}

impl DealService {
    pub fn new(deals: Arc<DealRepository>) -> Self {
        Self { deals }
    }

    pub fn from_registry(registry: &RepositoryRegistry) -> Result<Self, RegistryError> {
        Ok(Self::new(registry.get::<DealRepository>(DEAL_TAG)?))
    }

    pub async fn get_deal(&self, deal_id: EntityId) -> Option<Deal> {
        self.deals.get_by_id(deal_id).await
    }

    pub async fn list_deals(&self, options: &DealListOptions) -> Vec<Deal> {
        self.deals.list_entities(&options.to_query()).await
    }

    pub async fn update_deal_stage(&self, deal_id: EntityId, stage_id: &str) -> bool {
        self.deals.update_stage(deal_id, stage_id).await
    }

    pub async fn add_contact_to_deal(&self, deal_id: EntityId, contact_id: EntityId) -> bool {
        self.deals.add_contact(deal_id, contact_id).await
    }

    pub async fn remove_contact_from_deal(&self, deal_id: EntityId, contact_id: EntityId) -> bool {
        self.deals.remove_contact(deal_id, contact_id).await
    }

    pub async fn create_deal(&self, deal: &Deal) -> Option<EntityId> {
        self.deals.create(deal).await
    }

    pub async fn update_deal(&self, deal_id: EntityId, deal: &Deal) -> bool {
        self.deals.update(deal_id, deal).await
    }

    pub async fn get_deal_stages(&self, category_id: EntityId) -> Value {
        self.deals.get_stages(category_id).await
    }
}
