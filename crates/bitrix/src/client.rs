//! The remote client seam. Everything above this module talks to the CRM
//! through [`BitrixClient`]; [`crate::webhook::WebhookClient`] is the HTTP
//! implementation and [`crate::testing::FakeBitrixClient`] the scripted one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection to the CRM failed: {0}")]
    Connection(String),
    #[error("CRM request timed out: {0}")]
    Timeout(String),
    #[error("CRM responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("CRM rejected the call with `{code}`: {description}")]
    Api { code: String, description: String },
    #[error("could not decode CRM response: {0}")]
    Decode(String),
    #[error("could not encode CRM request: {0}")]
    Encode(String),
}

impl ClientError {
    /// The remote answers unknown ids with an API error rather than an
    /// empty result.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, Self::Api { code, description }
            if code.eq_ignore_ascii_case("not found")
                || description.eq_ignore_ascii_case("not found"))
    }
}

/// One command of a multiplexed batch call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchCommand {
    pub method: String,
    pub params: Value,
}

impl BatchCommand {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { method: method.into(), params }
    }
}

/// Batch commands keyed by caller-chosen correlation key.
pub type BatchCommands = BTreeMap<String, BatchCommand>;

#[async_trait]
pub trait BitrixClient: Send + Sync {
    /// Calls one remote method and returns the full response envelope
    /// (`{"result": ..., "next": ..., "total": ...}`).
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError>;

    /// Runs several commands in one round trip. The envelope is
    /// `{"result": {key: raw}}`; keys whose command failed are absent.
    async fn call_batch(&self, commands: BatchCommands) -> Result<Value, ClientError>;

    /// Fetches a complete result set by following the envelope's `next`
    /// offset until the remote stops returning one.
    async fn get_all(&self, method: &str, params: Value) -> Result<Vec<Value>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn recognises_remote_not_found() {
        let error =
            ClientError::Api { code: "".to_string(), description: "Not found".to_string() };
        assert!(error.is_remote_not_found());

        let error = ClientError::Api {
            code: "ACCESS_DENIED".to_string(),
            description: "Access denied".to_string(),
        };
        assert!(!error.is_remote_not_found());
    }
}
