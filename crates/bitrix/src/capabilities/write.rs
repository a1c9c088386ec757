use std::marker::PhantomData;
use std::sync::Arc;

use crmbridge_core::domain::wire::{coerce_id, is_truthy};
use crmbridge_core::{Entity, EntityId, WireRecord};
use serde_json::{json, Value};

use super::{report_failure, result_of, EntityMethods};
use crate::client::BitrixClient;
use crate::errors::RepositoryError;

/// Extracts a created identifier from an add result: a bare id (`"15"` or
/// `15`), or an item-style `{"item": {"id": 15}}`.
pub fn created_id(result: &Value) -> Option<EntityId> {
    coerce_id(result).or_else(|| {
        let item = result.get("item")?;
        item.get("id").or_else(|| item.get("ID")).and_then(coerce_id)
    })
}

/// Create, update and delete for one entity type.
pub struct Writer<E> {
    client: Arc<dyn BitrixClient>,
    methods: Arc<EntityMethods>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Writer<E> {
    pub fn new(client: Arc<dyn BitrixClient>, methods: Arc<EntityMethods>) -> Self {
        Self { client, methods, entity: PhantomData }
    }

    pub async fn try_create(&self, entity: &E) -> Result<EntityId, RepositoryError> {
        let method = &self.methods.add;
        let params = self.methods.params([("fields", Value::Object(entity.to_wire()))]);
        let result = result_of(self.client.call(method, params).await?, method)?;
        created_id(&result).ok_or_else(|| RepositoryError::InvalidValue {
            method: method.clone(),
            detail: format!("`{result}` is not an identifier"),
        })
    }

    /// New identifier, or `None` when the response is malformed or the id
    /// cannot be coerced.
    pub async fn create(&self, entity: &E) -> Option<EntityId> {
        match self.try_create(entity).await {
            Ok(id) => Some(id),
            Err(error) => {
                report_failure("bitrix.write.create.failed", E::NAME, &self.methods.add, &error);
                None
            }
        }
    }

    pub async fn try_update(&self, id: EntityId, entity: &E) -> Result<bool, RepositoryError> {
        self.try_update_fields(id, entity.to_wire()).await
    }

    pub async fn update(&self, id: EntityId, entity: &E) -> bool {
        self.absorb("bitrix.write.update.failed", id, self.try_update(id, entity).await)
    }

    /// Sends only `fields`, keyed by wire name.
    pub async fn try_update_fields(
        &self,
        id: EntityId,
        fields: WireRecord,
    ) -> Result<bool, RepositoryError> {
        let method = &self.methods.update;
        let params = self.methods.params([
            (self.methods.id_param.as_str(), json!(id)),
            ("fields", Value::Object(fields)),
        ]);
        let result = result_of(self.client.call(method, params).await?, method)?;
        Ok(is_truthy(&result))
    }

    pub async fn update_fields(&self, id: EntityId, fields: WireRecord) -> bool {
        self.absorb("bitrix.write.update.failed", id, self.try_update_fields(id, fields).await)
    }

    pub async fn try_delete(&self, id: EntityId) -> Result<bool, RepositoryError> {
        let method = &self.methods.delete;
        let envelope = self.client.call(method, self.methods.id_params(id)).await?;
        let result = result_of(envelope, method)?;
        Ok(is_truthy(&result))
    }

    pub async fn delete(&self, id: EntityId) -> bool {
        self.absorb("bitrix.write.delete.failed", id, self.try_delete(id).await)
    }

    fn absorb(
        &self,
        event_name: &'static str,
        id: EntityId,
        outcome: Result<bool, RepositoryError>,
    ) -> bool {
        outcome.unwrap_or_else(|error| {
            report_failure(event_name, E::NAME, &id.to_string(), &error);
            false
        })
    }
}
