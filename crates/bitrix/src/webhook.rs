use std::time::Duration;

use async_trait::async_trait;
use crmbridge_core::BitrixConfig;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::client::{BatchCommand, BatchCommands, BitrixClient, ClientError};

const BATCH_METHOD: &str = "batch";
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for an inbound-webhook base URL such as
/// `https://portal.example.com/rest/1/<token>/`.
#[derive(Debug)]
pub struct WebhookClient {
    http: reqwest::Client,
    base_url: SecretString,
    batch_size: usize,
}

impl WebhookClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::Connection(error.without_url().to_string()))?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { http, base_url: base_url.into(), batch_size: batch_size.max(1) })
    }

    pub fn connect(config: &BitrixConfig) -> Result<Self, ClientError> {
        Self::new(
            config.webhook_url.expose_secret(),
            Duration::from_secs(config.timeout_secs),
            config.batch_size as usize,
        )
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}{method}.json", self.base_url.expose_secret())
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value, ClientError> {
        debug!(event_name = "bitrix.client.call", method, "calling CRM method");

        let response = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let payload = serde_json::from_str::<Value>(&text).ok();

        if let Some(error) = payload.as_ref().and_then(api_error) {
            warn!(
                event_name = "bitrix.client.api_error",
                method,
                status = %status,
                error = %error,
                "CRM rejected the call"
            );
            return Err(error);
        }

        if !status.is_success() {
            let body = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(ClientError::Status { status: status.as_u16(), body });
        }

        payload.ok_or_else(|| ClientError::Decode(format!("`{method}` returned a non-JSON body")))
    }

    /// Sends one remote `batch` call and returns its per-key results.
    async fn post_chunk(
        &self,
        chunk: &[(String, BatchCommand)],
    ) -> Result<Map<String, Value>, ClientError> {
        let mut cmd = Map::new();
        for (key, command) in chunk {
            let encoded = encode_command(&command.method, &command.params)?;
            cmd.insert(key.clone(), Value::String(encoded));
        }

        let envelope = self.post(BATCH_METHOD, &json!({ "halt": 0, "cmd": cmd })).await?;
        let outcome = envelope
            .get("result")
            .ok_or_else(|| ClientError::Decode("batch response has no `result`".to_string()))?;

        if let Some(Value::Object(errors)) = outcome.get("result_error") {
            for (key, error) in errors {
                warn!(
                    event_name = "bitrix.client.batch_command_failed",
                    key = %key,
                    error = %error,
                    "batched command failed"
                );
            }
        }

        match outcome.get("result") {
            Some(Value::Object(results)) => Ok(results.clone()),
            _ => Ok(Map::new()),
        }
    }
}

#[async_trait]
impl BitrixClient for WebhookClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let params = if params.is_null() { Value::Object(Map::new()) } else { params };
        self.post(method, &params).await
    }

    /// Commands are sent in chunks of `batch_size`. A failed chunk drops only
    /// its own keys from the result; the call fails when no chunk succeeded.
    async fn call_batch(&self, commands: BatchCommands) -> Result<Value, ClientError> {
        let commands: Vec<_> = commands.into_iter().collect();
        let mut merged = Map::new();
        let mut first_error = None;
        let mut succeeded = 0usize;

        for (index, chunk) in commands.chunks(self.batch_size).enumerate() {
            match self.post_chunk(chunk).await {
                Ok(results) => {
                    succeeded += 1;
                    merged.extend(results);
                }
                Err(error) => {
                    warn!(
                        event_name = "bitrix.client.batch_chunk_failed",
                        chunk = index,
                        commands = chunk.len(),
                        error = %error,
                        "batch chunk failed; its commands have no result"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) if succeeded == 0 => Err(error),
            _ => Ok(json!({ "result": merged })),
        }
    }

    async fn get_all(&self, method: &str, params: Value) -> Result<Vec<Value>, ClientError> {
        let mut params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut items = Vec::new();

        loop {
            let envelope = self.post(method, &Value::Object(params.clone())).await?;
            let page = envelope.get("result").ok_or_else(|| {
                ClientError::Decode(format!("`{method}` response has no `result`"))
            })?;
            items.extend(list_items(page));

            match envelope.get("next").and_then(Value::as_u64) {
                Some(next) => {
                    params.insert("start".to_string(), Value::from(next));
                }
                None => break,
            }
        }

        Ok(items)
    }
}

fn transport_error(error: reqwest::Error) -> ClientError {
    let error = error.without_url();
    if error.is_timeout() {
        ClientError::Timeout(error.to_string())
    } else if error.is_decode() {
        ClientError::Decode(error.to_string())
    } else {
        ClientError::Connection(error.to_string())
    }
}

fn api_error(payload: &Value) -> Option<ClientError> {
    let code = payload.get("error")?;
    let code = match code {
        Value::String(code) => code.clone(),
        other => other.to_string(),
    };
    let description = payload
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(ClientError::Api { code, description })
}

/// List endpoints return either a bare array or an object wrapping one
/// (`{"items": [...]}` for item-style endpoints).
fn list_items(page: &Value) -> Vec<Value> {
    match page {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .values()
            .find_map(|value| value.as_array().cloned())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Renders one batch command as `method?nested[query]=string`.
fn encode_command(method: &str, params: &Value) -> Result<String, ClientError> {
    let mut pairs = Vec::new();
    flatten_params(None, params, &mut pairs);
    if pairs.is_empty() {
        return Ok(method.to_string());
    }

    let mut url = Url::parse("http://batch.invalid/")
        .map_err(|error| ClientError::Encode(error.to_string()))?;
    url.query_pairs_mut().extend_pairs(pairs.iter());
    Ok(format!("{method}?{}", url.query().unwrap_or_default()))
}

fn flatten_params(prefix: Option<&str>, value: &Value, pairs: &mut Vec<(String, String)>) {
    let nested = |key: &str| match prefix {
        Some(prefix) => format!("{prefix}[{key}]"),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_params(Some(&nested(key)), value, pairs);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_params(Some(&nested(&index.to_string())), item, pairs);
            }
        }
        Value::Null => {}
        Value::Bool(flag) => {
            if let Some(prefix) = prefix {
                pairs.push((prefix.to_string(), if *flag { "1" } else { "0" }.to_string()));
            }
        }
        Value::Number(number) => {
            if let Some(prefix) = prefix {
                pairs.push((prefix.to_string(), number.to_string()));
            }
        }
        Value::String(text) => {
            if let Some(prefix) = prefix {
                pairs.push((prefix.to_string(), text.clone()));
            }
        }
    }
}
