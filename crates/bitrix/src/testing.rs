//! Scripted in-memory client for exercising repositories without a portal.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{BatchCommands, BitrixClient, ClientError};

/// A call the fake received. Batch calls are recorded under the method name
/// `batch` with the serialized commands as params.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

/// Replays queued responses in order, one queue per client operation. An
/// exhausted queue answers with a connection error.
#[derive(Default)]
pub struct FakeBitrixClient {
    calls: Mutex<VecDeque<Result<Value, ClientError>>>,
    batches: Mutex<VecDeque<Result<Value, ClientError>>>,
    full_lists: Mutex<VecDeque<Result<Vec<Value>, ClientError>>>,
    recorded: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn exhausted(method: &str) -> ClientError {
    ClientError::Connection(format!("no scripted response left for `{method}`"))
}

impl FakeBitrixClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw envelope for the next `call`.
    pub fn push_envelope(&self, envelope: Value) -> &Self {
        lock(&self.calls).push_back(Ok(envelope));
        self
    }

    /// Queues `{"result": result}` for the next `call`.
    pub fn push_result(&self, result: Value) -> &Self {
        self.push_envelope(json!({ "result": result }))
    }

    pub fn push_error(&self, error: ClientError) -> &Self {
        lock(&self.calls).push_back(Err(error));
        self
    }

    /// Queues `{"result": results}` for the next `call_batch`.
    pub fn push_batch_results(&self, results: Value) -> &Self {
        self.push_batch_envelope(json!({ "result": results }))
    }

    pub fn push_batch_envelope(&self, envelope: Value) -> &Self {
        lock(&self.batches).push_back(Ok(envelope));
        self
    }

    pub fn push_batch_error(&self, error: ClientError) -> &Self {
        lock(&self.batches).push_back(Err(error));
        self
    }

    pub fn push_full_list(&self, items: Vec<Value>) -> &Self {
        lock(&self.full_lists).push_back(Ok(items));
        self
    }

    pub fn push_full_list_error(&self, error: ClientError) -> &Self {
        lock(&self.full_lists).push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.recorded).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.recorded).len()
    }

    pub fn methods(&self) -> Vec<String> {
        lock(&self.recorded).iter().map(|call| call.method.clone()).collect()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.recorded).last().cloned()
    }

    fn record(&self, method: &str, params: Value) {
        lock(&self.recorded).push(RecordedCall { method: method.to_string(), params });
    }
}

#[async_trait]
impl BitrixClient for FakeBitrixClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.record(method, params);
        lock(&self.calls).pop_front().unwrap_or_else(|| Err(exhausted(method)))
    }

    async fn call_batch(&self, commands: BatchCommands) -> Result<Value, ClientError> {
        self.record("batch", serde_json::to_value(&commands).unwrap_or(Value::Null));
        lock(&self.batches).pop_front().unwrap_or_else(|| Err(exhausted("batch")))
    }

    async fn get_all(&self, method: &str, params: Value) -> Result<Vec<Value>, ClientError> {
        self.record(method, params);
        lock(&self.full_lists).pop_front().unwrap_or_else(|| Err(exhausted(method)))
    }
}
