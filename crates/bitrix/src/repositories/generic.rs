use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use crmbridge_core::{Entity, EntityId, WireRecord};
use serde_json::Value;

use super::EntityRepository;
use crate::capabilities::{
    unwrap_key, Batcher, EntityMethods, ListQuery, Paged, Paginator, Reader, Relationships,
    Writer, DEFAULT_PAGE_SIZE,
};
use crate::client::BitrixClient;
use crate::errors::RepositoryError;

/// Repository for any entity reachable through an [`EntityMethods`] table.
/// Each capability is a separate component; the repository delegates.
pub struct BitrixRepository<E> {
    entity_type: &'static str,
    methods: Arc<EntityMethods>,
    reader: Reader<E>,
    writer: Writer<E>,
    paginator: Paginator,
    batcher: Batcher,
    relationships: Relationships,
}

impl<E: Entity> BitrixRepository<E> {
    pub fn new(
        client: Arc<dyn BitrixClient>,
        entity_type: &'static str,
        methods: EntityMethods,
    ) -> Self {
        let methods = Arc::new(methods);
        Self {
            entity_type,
            reader: Reader::new(client.clone(), methods.clone()),
            writer: Writer::new(client.clone(), methods.clone()),
            paginator: Paginator::new(DEFAULT_PAGE_SIZE),
            batcher: Batcher::new(client.clone(), E::NAME),
            relationships: Relationships::new(client, E::NAME),
            methods,
        }
    }

    /// Page size used by [`Self::list_all`]; must match what the remote
    /// returns per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.paginator = Paginator::new(page_size);
        self
    }

    pub fn methods(&self) -> &EntityMethods {
        &self.methods
    }

    pub fn reader(&self) -> &Reader<E> {
        &self.reader
    }

    pub fn writer(&self) -> &Writer<E> {
        &self.writer
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub async fn get_by_id(&self, id: EntityId) -> Option<E> {
        self.reader.get_by_id(id).await
    }

    pub async fn try_get_by_id(&self, id: EntityId) -> Result<E, RepositoryError> {
        self.reader.try_get_by_id(id).await
    }

    pub async fn list_entities(&self, query: &ListQuery) -> Vec<E> {
        self.reader.list_entities(query).await
    }

    pub async fn try_list_entities(&self, query: &ListQuery) -> Result<Vec<E>, RepositoryError> {
        self.reader.try_list_entities(query).await
    }

    pub async fn get_fields(&self) -> WireRecord {
        self.reader.get_fields().await
    }

    /// Walks every page of `query` from `query.start`; `query.limit` is
    /// ignored in favour of `max_items`.
    pub async fn list_all(&self, query: &ListQuery, max_items: Option<usize>) -> Vec<E> {
        self.paginator
            .paginate(
                E::NAME,
                query.start,
                max_items,
                |start| self.reader.try_list_page(query, start),
                |page| self.reader.from_records(page),
            )
            .await
    }

    /// [`Self::list_all`] that also reports why a walk ended early.
    pub async fn try_list_all(&self, query: &ListQuery, max_items: Option<usize>) -> Paged<E> {
        self.paginator
            .try_paginate(
                query.start,
                max_items,
                |start| self.reader.try_list_page(query, start),
                |page| self.reader.from_records(page),
            )
            .await
    }

    /// Fetches `ids` in one batch. Ids that fail or come back empty are
    /// absent from the result.
    pub async fn get_many(&self, ids: &[EntityId]) -> BTreeMap<EntityId, E> {
        let item_key = self.methods.item_key.as_deref();
        self.batcher
            .batch_get_with(
                &self.methods.get,
                ids,
                |id| self.methods.id_params(id),
                |raw| match unwrap_key(raw, item_key) {
                    Value::Object(record) if !record.is_empty() => Some(E::from_wire(&record)),
                    _ => None,
                },
            )
            .await
    }

    /// Creates `entities` in one batch; the ids line up with the input.
    pub async fn create_many(&self, entities: &[E]) -> Vec<Option<EntityId>> {
        let items = entities
            .iter()
            .map(|entity| self.methods.params([("fields", Value::Object(entity.to_wire()))]))
            .collect();
        self.batcher.batch_create(&self.methods.add, items).await
    }

    pub async fn create(&self, entity: &E) -> Option<EntityId> {
        self.writer.create(entity).await
    }

    pub async fn try_create(&self, entity: &E) -> Result<EntityId, RepositoryError> {
        self.writer.try_create(entity).await
    }

    pub async fn update(&self, id: EntityId, entity: &E) -> bool {
        self.writer.update(id, entity).await
    }

    pub async fn update_fields(&self, id: EntityId, fields: WireRecord) -> bool {
        self.writer.update_fields(id, fields).await
    }

    pub async fn try_update_fields(
        &self,
        id: EntityId,
        fields: WireRecord,
    ) -> Result<bool, RepositoryError> {
        self.writer.try_update_fields(id, fields).await
    }

    pub async fn delete(&self, id: EntityId) -> bool {
        self.writer.delete(id).await
    }
}

#[async_trait]
impl<E: Entity> EntityRepository for BitrixRepository<E> {
    type Entity = E;

    fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    async fn get_by_id(&self, id: EntityId) -> Option<E> {
        self.reader.get_by_id(id).await
    }

    async fn list_entities(&self, query: &ListQuery) -> Vec<E> {
        self.reader.list_entities(query).await
    }

    async fn get_fields(&self) -> WireRecord {
        self.reader.get_fields().await
    }
}
