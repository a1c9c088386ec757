use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use crmbridge_core::{EntityId, SmartProcess, WireRecord};

use super::{BitrixRepository, EntityRepository};
use crate::capabilities::{EntityMethods, ListQuery};
use crate::client::BitrixClient;

pub const SMART_PROCESS_TAG: &str = "smart_process";

/// Items of one smart process type over the universal `crm.item.*`
/// endpoints.
pub struct SmartProcessRepository {
    inner: BitrixRepository<SmartProcess>,
    entity_type_id: EntityId,
}

impl SmartProcessRepository {
    pub fn new(client: Arc<dyn BitrixClient>, entity_type_id: EntityId) -> Self {
        let methods = EntityMethods::crm_item(entity_type_id);
        Self { inner: BitrixRepository::new(client, SMART_PROCESS_TAG, methods), entity_type_id }
    }

    pub fn entity_type_id(&self) -> EntityId {
        self.entity_type_id
    }
}

impl Deref for SmartProcessRepository {
    type Target = BitrixRepository<SmartProcess>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl EntityRepository for SmartProcessRepository {
    type Entity = SmartProcess;

    fn entity_type(&self) -> &'static str {
        SMART_PROCESS_TAG
    }

    async fn get_by_id(&self, id: EntityId) -> Option<SmartProcess> {
        self.inner.get_by_id(id).await
    }

    async fn list_entities(&self, query: &ListQuery) -> Vec<SmartProcess> {
        self.inner.list_entities(query).await
    }

    async fn get_fields(&self) -> WireRecord {
        self.inner.get_fields().await
    }
}
