//! Cross-cutting behaviours every entity repository composes: reading,
//! writing, page walking, batching, filter building and relationship links.
//!
//! Each capability method comes in two forms. `try_*` returns the explicit
//! [`RepositoryError`]; the plain form absorbs it, logs one structured event
//! and returns an empty value (`None`, `[]`, `{}` or `false`).

use crmbridge_core::{EntityId, WireRecord};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::errors::{RepositoryError, Severity};

pub mod batch;
pub mod filter;
pub mod pagination;
pub mod read;
pub mod relationship;
pub mod write;

pub use batch::Batcher;
pub use filter::{add_in_filter, add_range_filter, add_search_filter, build_filter, FilterOperator};
pub use pagination::{Paged, Paginator};
pub use read::Reader;
pub use relationship::Relationships;
pub use write::Writer;

/// Remote page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Remote method names and parameter conventions for one entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityMethods {
    pub list: String,
    pub get: String,
    pub add: String,
    pub update: String,
    pub delete: String,
    pub fields: String,
    /// Name of the identifier parameter (`ID` for classic endpoints).
    pub id_param: String,
    /// Merged into the parameters of every call.
    pub base_params: WireRecord,
    /// Key wrapping a single record in get responses, if any.
    pub item_key: Option<String>,
    /// Key wrapping the list in list responses, if any.
    pub list_key: Option<String>,
    /// Key wrapping the schema in fields responses, if any.
    pub fields_key: Option<String>,
    /// Creation timestamp field, used for the default newest-first order.
    pub created_field: String,
}

impl EntityMethods {
    /// Classic `crm.<entity>.*` endpoints, e.g. `crm("deal")`.
    pub fn crm(entity: &str) -> Self {
        Self {
            list: format!("crm.{entity}.list"),
            get: format!("crm.{entity}.get"),
            add: format!("crm.{entity}.add"),
            update: format!("crm.{entity}.update"),
            delete: format!("crm.{entity}.delete"),
            fields: format!("crm.{entity}.fields"),
            id_param: "ID".to_string(),
            base_params: WireRecord::new(),
            item_key: None,
            list_key: None,
            fields_key: None,
            created_field: "DATE_CREATE".to_string(),
        }
    }

    /// Universal `crm.item.*` endpoints bound to one entity type id.
    pub fn crm_item(entity_type_id: EntityId) -> Self {
        let mut base_params = WireRecord::new();
        base_params.insert("entityTypeId".to_string(), json!(entity_type_id));
        Self {
            list: "crm.item.list".to_string(),
            get: "crm.item.get".to_string(),
            add: "crm.item.add".to_string(),
            update: "crm.item.update".to_string(),
            delete: "crm.item.delete".to_string(),
            fields: "crm.item.fields".to_string(),
            id_param: "id".to_string(),
            base_params,
            item_key: Some("item".to_string()),
            list_key: Some("items".to_string()),
            fields_key: Some("fields".to_string()),
            created_field: "createdTime".to_string(),
        }
    }

    /// Base parameters plus `extra`; `extra` wins on collision.
    pub fn params<'a>(&self, extra: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        let mut params = self.base_params.clone();
        for (key, value) in extra {
            params.insert(key.to_string(), value);
        }
        Value::Object(params)
    }

    pub fn id_params(&self, id: EntityId) -> Value {
        self.params([(self.id_param.as_str(), json!(id))])
    }
}

/// Parameters of a list call.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filter: WireRecord,
    /// Empty means every field including custom ones (`*`, `UF_*`).
    pub select: Vec<String>,
    /// Empty means newest first (`DATE_CREATE DESC`).
    pub order: WireRecord,
    pub start: usize,
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: WireRecord::new(),
            select: Vec::new(),
            order: WireRecord::new(),
            start: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: WireRecord) -> Self {
        self.filter = filter;
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn order(mut self, field: &str, direction: &str) -> Self {
        self.order.insert(field.to_string(), Value::String(direction.to_string()));
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the wire parameters for one page starting at `start`.
    pub fn to_params(&self, methods: &EntityMethods, start: usize) -> Value {
        let select = if self.select.is_empty() {
            json!(["*", "UF_*"])
        } else {
            json!(self.select)
        };
        let order = if self.order.is_empty() {
            let mut order = WireRecord::new();
            order.insert(methods.created_field.clone(), json!("DESC"));
            Value::Object(order)
        } else {
            Value::Object(self.order.clone())
        };

        let mut extra = vec![("start", json!(start)), ("select", select), ("order", order)];
        if !self.filter.is_empty() {
            extra.push(("filter", Value::Object(self.filter.clone())));
        }
        methods.params(extra)
    }
}

/// Pulls `result` out of a response envelope.
pub(crate) fn result_of(envelope: Value, method: &str) -> Result<Value, RepositoryError> {
    match envelope {
        Value::Object(mut envelope) => envelope.remove("result").ok_or_else(|| {
            RepositoryError::MissingKey { method: method.to_string(), key: "result" }
        }),
        _ => Err(RepositoryError::MalformedResponse {
            method: method.to_string(),
            reason: "response is not an object".to_string(),
        }),
    }
}

/// Unwraps `{key: inner}` when the endpoint wraps its payload.
pub(crate) fn unwrap_key(value: Value, key: Option<&str>) -> Value {
    match (key, value) {
        (Some(key), Value::Object(mut map)) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        (_, value) => value,
    }
}

/// Logs an absorbed failure at the level its severity calls for.
pub(crate) fn report_failure(
    event_name: &'static str,
    entity: &'static str,
    subject: &str,
    failure: &RepositoryError,
) {
    let kind = failure.kind();
    match failure.severity() {
        Severity::Debug => debug!(event_name, entity, subject, kind, error = %failure, "no result"),
        Severity::Warn => {
            warn!(event_name, entity, subject, kind, error = %failure, "unexpected CRM response")
        }
        Severity::Error => {
            error!(event_name, entity, subject, kind, error = %failure, "CRM call failed")
        }
    }
}
