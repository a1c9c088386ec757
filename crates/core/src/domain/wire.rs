//! Wire-format primitives and the coercion rules applied to remote values.
//!
//! The remote API sends every scalar as a string. Coercion turns those
//! strings into typed values without ever failing: anything that cannot be
//! coerced becomes `None` (identifiers) or `0.0` (amounts).

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// One remote record: upper-case keys (camelCase on `crm.item.*`), mostly
/// string values.
pub type WireRecord = Map<String, Value>;

/// Numeric identifier of a remote entity.
pub type EntityId = i64;

const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn is_digit_string(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|ch| ch.is_ascii_digit())
}

/// Coerces an identifier-like value. Digit-only strings and JSON integers
/// yield an id; every other value yields `None`.
pub fn coerce_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(raw) if is_digit_string(raw) => raw.parse().ok(),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

/// Coerces a monetary amount. Unparseable input becomes `0.0`; only JSON
/// `null` is treated as "no value".
pub fn coerce_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(number) => Some(number.as_f64().unwrap_or(0.0)),
        Value::String(raw) => Some(raw.trim().parse().unwrap_or(0.0)),
        _ => Some(0.0),
    }
}

/// Coerces a list of identifiers from either a comma-separated string or an
/// array. Tokens that are not digit-only are dropped.
pub fn coerce_id_list(value: &Value) -> Vec<EntityId> {
    match value {
        Value::String(raw) => raw
            .split(',')
            .filter(|token| is_digit_string(token))
            .filter_map(|token| token.parse().ok())
            .collect(),
        Value::Array(items) => items.iter().filter_map(coerce_id).collect(),
        Value::Number(_) => coerce_id(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn id_to_wire(id: EntityId) -> Value {
    Value::String(id.to_string())
}

pub fn amount_to_wire(amount: f64) -> Value {
    Value::String(amount.to_string())
}

pub fn id_list_to_wire(ids: &[EntityId]) -> Value {
    Value::Array(ids.iter().copied().map(id_to_wire).collect())
}

/// Parses a remote timestamp. Accepts ISO-8601 with offset and the legacy
/// `YYYY-MM-DD HH:MM:SS` form (interpreted as UTC).
pub fn parse_wire_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(raw, WIRE_DATETIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).into())
}

/// Truthiness of a raw remote result: `null`, `false`, `0`, empty strings and
/// empty collections count as "no result".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(raw) => !raw.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        coerce_amount, coerce_id, coerce_id_list, coerce_text, is_truthy, parse_wire_datetime,
    };

    #[test]
    fn digit_strings_become_ids() {
        assert_eq!(coerce_id(&json!("42")), Some(42));
        assert_eq!(coerce_id(&json!(42)), Some(42));
    }

    #[test]
    fn non_digit_ids_become_none() {
        assert_eq!(coerce_id(&json!("abc")), None);
        assert_eq!(coerce_id(&json!("")), None);
        assert_eq!(coerce_id(&json!("-3")), None);
        assert_eq!(coerce_id(&json!(" 7")), None);
        assert_eq!(coerce_id(&json!(null)), None);
        assert_eq!(coerce_id(&json!(true)), None);
    }

    #[test]
    fn overflowing_id_is_none() {
        assert_eq!(coerce_id(&json!("99999999999999999999999")), None);
    }

    #[test]
    fn unparseable_amount_is_zero_not_null() {
        assert_eq!(coerce_amount(&json!("not-a-number")), Some(0.0));
        assert_eq!(coerce_amount(&json!("1500.50")), Some(1500.5));
        assert_eq!(coerce_amount(&json!(12)), Some(12.0));
        assert_eq!(coerce_amount(&json!([])), Some(0.0));
        assert_eq!(coerce_amount(&json!(null)), None);
    }

    #[test]
    fn id_lists_drop_non_digit_tokens() {
        assert_eq!(coerce_id_list(&json!("1,2,x,4")), vec![1, 2, 4]);
        assert_eq!(coerce_id_list(&json!("1, 2")), vec![1]);
        assert_eq!(coerce_id_list(&json!(["5", 6, "y"])), vec![5, 6]);
        assert_eq!(coerce_id_list(&json!("")), Vec::<i64>::new());
    }

    #[test]
    fn coercion_is_idempotent_on_typed_values() {
        let once = coerce_id(&json!("17")).map(serde_json::Value::from);
        assert_eq!(once.as_ref().and_then(coerce_id), Some(17));

        let amount = coerce_amount(&json!("3.25")).map(serde_json::Value::from);
        assert_eq!(amount.as_ref().and_then(coerce_amount), Some(3.25));

        let ids = serde_json::Value::from(coerce_id_list(&json!("3,4")));
        assert_eq!(coerce_id_list(&ids), vec![3, 4]);
    }

    #[test]
    fn text_accepts_scalars_only() {
        assert_eq!(coerce_text(&json!("Acme")), Some("Acme".to_string()));
        assert_eq!(coerce_text(&json!(5)), Some("5".to_string()));
        assert_eq!(coerce_text(&json!({"a": 1})), None);
    }

    #[test]
    fn parses_both_timestamp_forms() {
        let iso = parse_wire_datetime("2024-03-01T10:15:00+03:00").expect("iso timestamp");
        assert_eq!(iso.offset().local_minus_utc(), 3 * 3600);

        let legacy = parse_wire_datetime("2024-03-01 10:15:00").expect("legacy timestamp");
        assert_eq!(legacy.offset().local_minus_utc(), 0);

        assert!(parse_wire_datetime("yesterday").is_none());
    }

    #[test]
    fn truthiness_matches_remote_conventions() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("15")));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!([{"CONTACT_ID": "1"}])));
    }
}
