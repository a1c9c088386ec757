//! Filter dictionaries for list calls. These functions only build data; the
//! result is passed as [`super::ListQuery::filter`].

use crmbridge_core::WireRecord;
use serde_json::Value;

/// Comparison encoded as a prefix on the filtered field name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    Contains,
    Gte,
    Lte,
    Gt,
    Lt,
    NotEqual,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Equal => "",
            Self::Contains => "%",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::NotEqual => "!",
            Self::In => "@",
            Self::NotIn => "!@",
        }
    }

    pub fn key(self, field: &str) -> String {
        format!("{}{field}", self.prefix())
    }
}

/// Flat `base` entries plus one prefixed entry per `(field, operator, value)`.
/// Later entries overwrite earlier ones with the same key.
pub fn build_filter(
    base: Option<WireRecord>,
    logic: impl IntoIterator<Item = (String, FilterOperator, Value)>,
) -> WireRecord {
    let mut filter = base.unwrap_or_default();
    for (field, operator, value) in logic {
        filter.insert(operator.key(&field), value);
    }
    filter
}

/// Exact match keeps `field` as is; otherwise a substring match.
pub fn add_search_filter(field: &str, query: &str, exact: bool) -> WireRecord {
    let operator = if exact { FilterOperator::Equal } else { FilterOperator::Contains };
    single(operator.key(field), Value::String(query.to_string()))
}

/// Zero, one or two inclusive bounds.
pub fn add_range_filter<V: Into<Value>>(field: &str, min: Option<V>, max: Option<V>) -> WireRecord {
    let mut filter = WireRecord::new();
    if let Some(min) = min {
        filter.insert(FilterOperator::Gte.key(field), min.into());
    }
    if let Some(max) = max {
        filter.insert(FilterOperator::Lte.key(field), max.into());
    }
    filter
}

pub fn add_in_filter<V: Into<Value>>(
    field: &str,
    values: impl IntoIterator<Item = V>,
    exclude: bool,
) -> WireRecord {
    let operator = if exclude { FilterOperator::NotIn } else { FilterOperator::In };
    let values = values.into_iter().map(Into::into).collect();
    single(operator.key(field), Value::Array(values))
}

fn single(key: String, value: Value) -> WireRecord {
    let mut filter = WireRecord::new();
    filter.insert(key, value);
    filter
}
