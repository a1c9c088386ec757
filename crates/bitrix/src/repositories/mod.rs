use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use crmbridge_core::{Entity, EntityId, WireRecord};

use crate::capabilities::ListQuery;

pub mod contact;
pub mod deal;
pub mod generic;
pub mod smart_process;

pub use contact::ContactRepository;
pub use deal::DealRepository;
pub use generic::BitrixRepository;
pub use smart_process::SmartProcessRepository;

/// Typed repository for one entity type. Every method follows the soft
/// failure contract: failures come back as `None`, `[]` or `{}`.
#[async_trait]
pub trait EntityRepository: Send + Sync + 'static {
    type Entity: Entity;

    /// Registry tag, e.g. `deal`.
    fn entity_type(&self) -> &'static str;

    fn supports_entity_type(&self, entity_type: &str) -> bool {
        self.entity_type().eq_ignore_ascii_case(entity_type)
    }

    async fn get_by_id(&self, id: EntityId) -> Option<Self::Entity>;

    async fn list_entities(&self, query: &ListQuery) -> Vec<Self::Entity>;

    async fn get_fields(&self) -> WireRecord;
}

/// Type-erased view of an [`EntityRepository`], so repositories for
/// different entities can share one registry. Records come back in wire
/// form; [`CrmRepository::into_any`] recovers the concrete repository.
#[async_trait]
pub trait CrmRepository: Send + Sync + 'static {
    fn tag(&self) -> &'static str;

    fn entity_name(&self) -> &'static str;

    fn supports(&self, entity_type: &str) -> bool;

    async fn get_record(&self, id: EntityId) -> Option<WireRecord>;

    async fn list_records(&self, query: &ListQuery) -> Vec<WireRecord>;

    async fn describe_fields(&self) -> WireRecord;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<R: EntityRepository> CrmRepository for R {
    fn tag(&self) -> &'static str {
        self.entity_type()
    }

    fn entity_name(&self) -> &'static str {
        <R::Entity as Entity>::NAME
    }

    fn supports(&self, entity_type: &str) -> bool {
        self.supports_entity_type(entity_type)
    }

    async fn get_record(&self, id: EntityId) -> Option<WireRecord> {
        self.get_by_id(id).await.map(|entity| entity.to_wire())
    }

    async fn list_records(&self, query: &ListQuery) -> Vec<WireRecord> {
        self.list_entities(query).await.iter().map(Entity::to_wire).collect()
    }

    async fn describe_fields(&self) -> WireRecord {
        self.get_fields().await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
