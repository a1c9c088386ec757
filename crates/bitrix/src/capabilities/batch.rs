use std::collections::BTreeMap;
use std::sync::Arc;

use crmbridge_core::domain::wire::is_truthy;
use crmbridge_core::{EntityId, WireRecord};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::write::created_id;
use super::{report_failure, result_of};
use crate::client::{BatchCommand, BatchCommands, BitrixClient};
use crate::errors::RepositoryError;

/// Correlation key of the command at `index`.
pub fn command_key(index: usize) -> String {
    format!("cmd{index}")
}

/// What one correlation key produced within a successful batch.
#[derive(Debug, PartialEq)]
enum CommandOutcome {
    Produced(Value),
    /// An empty array or object: a valid "nothing here" answer, such as the
    /// contact links of a deal without contacts.
    Empty,
    Failed,
}

fn command_outcome(raw: Option<Value>) -> CommandOutcome {
    match raw {
        Some(raw) if is_truthy(&raw) => CommandOutcome::Produced(raw),
        Some(Value::Array(_) | Value::Object(_)) => CommandOutcome::Empty,
        _ => CommandOutcome::Failed,
    }
}

/// Multiplexed remote calls. Within one batch every correlation key stands
/// alone: a key missing from the result is that command's failure only.
#[derive(Clone)]
pub struct Batcher {
    client: Arc<dyn BitrixClient>,
    entity: &'static str,
}

impl Batcher {
    /// `entity` labels log events.
    pub fn new(client: Arc<dyn BitrixClient>, entity: &'static str) -> Self {
        Self { client, entity }
    }

    pub async fn try_execute_batch(
        &self,
        commands: BatchCommands,
    ) -> Result<WireRecord, RepositoryError> {
        if commands.is_empty() {
            return Ok(WireRecord::new());
        }
        match result_of(self.client.call_batch(commands).await?, "batch")? {
            Value::Object(results) => Ok(results),
            Value::Null => Ok(WireRecord::new()),
            _ => Err(RepositoryError::WrongType {
                method: "batch".to_string(),
                expected: "object",
            }),
        }
    }

    /// Correlation key to raw result; empty when the batch as a whole failed.
    pub async fn execute_batch(&self, commands: BatchCommands) -> WireRecord {
        let size = commands.len();
        self.try_execute_batch(commands).await.unwrap_or_else(|error| {
            let subject = format!("{size} commands");
            report_failure("bitrix.batch.execute.failed", self.entity, &subject, &error);
            WireRecord::new()
        })
    }

    /// Complete result set of `method`; the remote side pages internally.
    pub async fn try_batch_list(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Vec<Value>, RepositoryError> {
        Ok(self.client.get_all(method, params).await?)
    }

    pub async fn batch_list(&self, method: &str, params: Value) -> Vec<Value> {
        self.try_batch_list(method, params).await.unwrap_or_else(|error| {
            report_failure("bitrix.batch.list.failed", self.entity, method, &error);
            Vec::new()
        })
    }

    /// One `method` command per id, parameters built by `params_for`. Ids
    /// whose command failed, returned an empty collection, or whose raw
    /// result `processor` rejected are absent from the map.
    pub async fn try_batch_get<T, F, P>(
        &self,
        method: &str,
        ids: &[EntityId],
        params_for: F,
        mut processor: P,
    ) -> Result<BTreeMap<EntityId, T>, RepositoryError>
    where
        F: Fn(EntityId) -> Value,
        P: FnMut(Value) -> Option<T>,
    {
        let commands: BatchCommands = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (command_key(index), BatchCommand::new(method, params_for(*id))))
            .collect();
        let mut results = self.try_execute_batch(commands).await?;

        let mut entities = BTreeMap::new();
        for (index, id) in ids.iter().enumerate() {
            let key = command_key(index);
            match command_outcome(results.remove(&key)) {
                CommandOutcome::Produced(raw) => {
                    if let Some(entity) = processor(raw) {
                        entities.insert(*id, entity);
                    }
                }
                CommandOutcome::Empty => debug!(
                    event_name = "bitrix.batch.command.empty",
                    entity = self.entity,
                    method,
                    key = %key,
                    "batched command returned no records"
                ),
                CommandOutcome::Failed => self.item_failed(method, &key),
            }
        }
        Ok(entities)
    }

    /// Batched `method` with `{"ID": id}` per command.
    pub async fn batch_get_by_ids<T, P>(
        &self,
        method: &str,
        ids: &[EntityId],
        processor: P,
    ) -> BTreeMap<EntityId, T>
    where
        P: FnMut(Value) -> Option<T>,
    {
        self.batch_get_with(method, ids, |id| json!({ "ID": id }), processor).await
    }

    /// [`Self::batch_get_by_ids`] with caller-built parameters per id.
    pub async fn batch_get_with<T, F, P>(
        &self,
        method: &str,
        ids: &[EntityId],
        params_for: F,
        processor: P,
    ) -> BTreeMap<EntityId, T>
    where
        F: Fn(EntityId) -> Value,
        P: FnMut(Value) -> Option<T>,
    {
        if ids.is_empty() {
            return BTreeMap::new();
        }
        self.try_batch_get(method, ids, params_for, processor).await.unwrap_or_else(|error| {
            report_failure("bitrix.batch.get.failed", self.entity, method, &error);
            BTreeMap::new()
        })
    }

    /// One `method` command per item, the item being the command's params.
    /// The output is positionally aligned with `items`.
    pub async fn try_batch_create(
        &self,
        method: &str,
        items: Vec<Value>,
    ) -> Result<Vec<Option<EntityId>>, RepositoryError> {
        let count = items.len();
        let commands: BatchCommands = items
            .into_iter()
            .enumerate()
            .map(|(index, params)| (command_key(index), BatchCommand::new(method, params)))
            .collect();
        let results = self.try_execute_batch(commands).await?;

        Ok((0..count)
            .map(|index| {
                let key = command_key(index);
                let id = results.get(&key).filter(|raw| is_truthy(raw)).and_then(created_id);
                if id.is_none() {
                    self.item_failed(method, &key);
                }
                id
            })
            .collect())
    }

    /// A failed batch yields `None` in every slot.
    pub async fn batch_create(&self, method: &str, items: Vec<Value>) -> Vec<Option<EntityId>> {
        let count = items.len();
        if count == 0 {
            return Vec::new();
        }
        self.try_batch_create(method, items).await.unwrap_or_else(|error| {
            report_failure("bitrix.batch.create.failed", self.entity, method, &error);
            vec![None; count]
        })
    }

    fn item_failed(&self, method: &str, key: &str) {
        warn!(
            event_name = "bitrix.batch.command.failed",
            entity = self.entity,
            method,
            key,
            "batched command produced no result"
        );
    }
}
