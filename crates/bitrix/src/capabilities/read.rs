use std::marker::PhantomData;
use std::sync::Arc;

use crmbridge_core::domain::wire::is_truthy;
use crmbridge_core::{Entity, EntityId, WireRecord};
use serde_json::Value;
use tracing::warn;

use super::{report_failure, result_of, unwrap_key, EntityMethods, ListQuery};
use crate::client::BitrixClient;
use crate::errors::RepositoryError;

/// Fetch-by-id, filtered listing and schema introspection for one entity
/// type.
pub struct Reader<E> {
    client: Arc<dyn BitrixClient>,
    methods: Arc<EntityMethods>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Reader<E> {
    pub fn new(client: Arc<dyn BitrixClient>, methods: Arc<EntityMethods>) -> Self {
        Self { client, methods, entity: PhantomData }
    }

    pub async fn try_get_by_id(&self, id: EntityId) -> Result<E, RepositoryError> {
        let method = &self.methods.get;
        let envelope = match self.client.call(method, self.methods.id_params(id)).await {
            Ok(envelope) => envelope,
            Err(error) if error.is_remote_not_found() => {
                return Err(RepositoryError::NotFound { entity: E::NAME, id })
            }
            Err(error) => return Err(error.into()),
        };

        let result = unwrap_key(result_of(envelope, method)?, self.methods.item_key.as_deref());
        match result {
            Value::Object(record) if !record.is_empty() => Ok(E::from_wire(&record)),
            value if !is_truthy(&value) => Err(RepositoryError::NotFound { entity: E::NAME, id }),
            _ => Err(RepositoryError::WrongType { method: method.clone(), expected: "object" }),
        }
    }

    /// `None` when the entity is absent or the call failed.
    pub async fn get_by_id(&self, id: EntityId) -> Option<E> {
        match self.try_get_by_id(id).await {
            Ok(entity) => Some(entity),
            Err(error) => {
                report_failure("bitrix.read.get_by_id.failed", E::NAME, &id.to_string(), &error);
                None
            }
        }
    }

    /// One raw page of records starting at `start`, not truncated.
    pub async fn try_list_page(
        &self,
        query: &ListQuery,
        start: usize,
    ) -> Result<Vec<Value>, RepositoryError> {
        let method = &self.methods.list;
        let envelope = self.client.call(method, query.to_params(&self.methods, start)).await?;
        let result = unwrap_key(result_of(envelope, method)?, self.methods.list_key.as_deref());
        match result {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            _ => Err(RepositoryError::WrongType { method: method.clone(), expected: "array" }),
        }
    }

    pub async fn try_list_entities(&self, query: &ListQuery) -> Result<Vec<E>, RepositoryError> {
        let mut records = self.try_list_page(query, query.start).await?;
        records.truncate(query.limit);
        Ok(self.from_records(records))
    }

    /// Empty on any failure. The remote may return more than `limit` records
    /// in one page; the surplus is dropped.
    pub async fn list_entities(&self, query: &ListQuery) -> Vec<E> {
        match self.try_list_entities(query).await {
            Ok(entities) => entities,
            Err(error) => {
                report_failure("bitrix.read.list.failed", E::NAME, &self.methods.list, &error);
                Vec::new()
            }
        }
    }

    pub async fn try_get_fields(&self) -> Result<WireRecord, RepositoryError> {
        let method = &self.methods.fields;
        let envelope = self.client.call(method, self.methods.params([])).await?;
        match unwrap_key(result_of(envelope, method)?, self.methods.fields_key.as_deref()) {
            Value::Object(fields) => Ok(fields),
            _ => Err(RepositoryError::WrongType { method: method.clone(), expected: "object" }),
        }
    }

    /// Remote field schema (name to metadata); empty on failure.
    pub async fn get_fields(&self) -> WireRecord {
        match self.try_get_fields().await {
            Ok(fields) => fields,
            Err(error) => {
                report_failure("bitrix.read.fields.failed", E::NAME, &self.methods.fields, &error);
                WireRecord::new()
            }
        }
    }

    /// Builds entities from raw records, skipping anything that is not an
    /// object.
    pub fn from_records(&self, records: Vec<Value>) -> Vec<E> {
        records
            .into_iter()
            .filter_map(|record| match record {
                Value::Object(record) => Some(E::from_wire(&record)),
                other => {
                    warn!(
                        event_name = "bitrix.read.record_skipped",
                        entity = E::NAME,
                        record = %other,
                        "skipping non-object record"
                    );
                    None
                }
            })
            .collect()
    }
}
