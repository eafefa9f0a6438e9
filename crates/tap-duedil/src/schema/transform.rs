//! Record conformance
//!
//! Coerces a raw API record into the shape its stream schema declares.
//! Union types are tried in declared order and the first that accepts the
//! value wins. Object properties absent from the schema are dropped, and
//! `date-time` strings are normalized to RFC 3339 UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A value that no declared type accepts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct TransformError {
    /// JSON path of the offending value, rooted at `$`
    pub path: String,
    pub message: String,
}

/// Conform `record` to `schema`
pub fn transform(record: &Value, schema: &Value) -> Result<Value, TransformError> {
    conform(record, schema, "$")
}

fn conform(value: &Value, schema: &Value, path: &str) -> Result<Value, TransformError> {
    if let Some(variants) = schema.get("anyOf").and_then(Value::as_array) {
        return variants
            .iter()
            .find_map(|variant| conform(value, variant, path).ok())
            .ok_or_else(|| mismatch(path, value, "any of the listed schemas"));
    }

    let types = declared_types(schema);
    if types.is_empty() {
        return match (value, schema.get("properties")) {
            (Value::Object(_), Some(_)) => conform_as(value, schema, "object", path)
                .ok_or_else(|| mismatch(path, value, "object")),
            _ => Ok(value.clone()),
        };
    }

    let mut nested_error = None;
    for ty in &types {
        match conform_typed(value, schema, ty, path) {
            Ok(Some(conformed)) => return Ok(conformed),
            Ok(None) => {},
            Err(e) => {
                nested_error.get_or_insert(e);
            },
        }
    }

    // Prefer the deeper error: it names the property that actually failed
    Err(nested_error.unwrap_or_else(|| mismatch(path, value, &types.join(" or "))))
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// `Ok(None)` when `ty` cannot hold `value`; `Err` when a nested value failed
fn conform_typed(
    value: &Value,
    schema: &Value,
    ty: &str,
    path: &str,
) -> Result<Option<Value>, TransformError> {
    match (ty, value) {
        ("object", Value::Object(fields)) => conform_object(fields, schema, path).map(Some),
        ("array", Value::Array(items)) => {
            let item_schema = schema.get("items").unwrap_or(&Value::Null);
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if item_schema.is_null() {
                        Ok(item.clone())
                    } else {
                        conform(item, item_schema, &format!("{}[{}]", path, i))
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Some(Value::Array(items)))
        },
        _ => Ok(conform_as(value, schema, ty, path)),
    }
}

fn conform_object(
    fields: &Map<String, Value>,
    schema: &Value,
    path: &str,
) -> Result<Value, TransformError> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(Value::Object(fields.clone()));
    };

    let mut out = Map::new();
    for (key, value) in fields {
        if let Some(property_schema) = properties.get(key) {
            let conformed = conform(value, property_schema, &format!("{}.{}", path, key))?;
            out.insert(key.clone(), conformed);
        }
    }
    Ok(Value::Object(out))
}

/// Scalar coercions
fn conform_as(value: &Value, schema: &Value, ty: &str, path: &str) -> Option<Value> {
    match ty {
        "null" => value.is_null().then_some(Value::Null),
        "object" => match value {
            Value::Object(fields) => conform_object(fields, schema, path).ok(),
            _ => None,
        },
        "boolean" => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        "integer" => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(n) => n.as_f64().and_then(integral).map(Value::Number),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::from)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
                    .map(Value::Number)
            },
            _ => None,
        },
        "number" => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::from)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
                    .map(Value::Number)
            },
            _ => None,
        },
        "string" => {
            if schema.get("format").and_then(Value::as_str) == Some("date-time") {
                return match value {
                    Value::String(s) => normalize_date_time(s).map(Value::String),
                    _ => None,
                };
            }
            match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            }
        },
        _ => None,
    }
}

fn integral(f: f64) -> Option<Number> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then(|| Number::from(f as i64))
}

const ZONED_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// ISO 8601 date-times (with or without an offset, seconds optional) and bare
/// dates (midnight), all rendered in UTC
pub fn normalize_date_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    Some(parse_date_time(raw)?.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // %z wants a numeric offset
    let zoned = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(local) => format!("{}+0000", local),
        None => raw.to_string(),
    };
    if let Some(dt) = ZONED_LAYOUTS
        .iter()
        .find_map(|layout| DateTime::parse_from_str(&zoned, layout).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
    {
        return Some(naive.and_utc());
    }

    Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?.and_utc())
}

fn mismatch(path: &str, value: &Value, expected: &str) -> TransformError {
    TransformError {
        path: path.to_string(),
        message: format!("expected {}, got {}", expected, describe(value)),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) if s.chars().count() > 40 => {
            format!("string \"{}...\"", s.chars().take(40).collect::<String>())
        },
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vitals_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "companyId": {"type": ["string", "null"]},
                "countryCode": {"type": ["string", "null"]},
                "incorporationDate": {"type": ["string", "null"], "format": "date-time"},
                "numberOfEmployees": {"type": ["integer", "null"]},
                "turnover": {"type": ["number", "null"]},
                "isActive": {"type": ["boolean", "null"]},
                "officers": {
                    "type": ["array", "null"],
                    "items": {
                        "type": ["object", "null"],
                        "properties": {"name": {"type": ["string", "null"]}, "age": {"type": ["integer", "null"]}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_conforming_record_unchanged() {
        let record = json!({
            "companyId": "06999618",
            "countryCode": "GB",
            "numberOfEmployees": 12,
            "turnover": 1050.5,
            "isActive": true,
            "officers": [{"name": "A. Director", "age": 51}]
        });
        assert_eq!(transform(&record, &vitals_schema()).unwrap(), record);
    }

    #[test]
    fn test_nulls_accepted_everywhere_below_root() {
        let record = json!({"companyId": null, "officers": [null, {"name": null}]});
        assert_eq!(transform(&record, &vitals_schema()).unwrap(), record);
    }

    #[test]
    fn test_coercions() {
        let record = json!({
            "companyId": 6999618,
            "numberOfEmployees": "12",
            "turnover": "1050.50",
            "isActive": "false",
            "officers": [{"age": 51.0}]
        });
        let out = transform(&record, &vitals_schema()).unwrap();
        assert_eq!(out["companyId"], "6999618");
        assert_eq!(out["numberOfEmployees"], 12);
        assert_eq!(out["turnover"], 1050.5);
        assert_eq!(out["isActive"], false);
        assert_eq!(out["officers"][0]["age"], 51);
    }

    #[test]
    fn test_unknown_properties_dropped() {
        let record = json!({"companyId": "1", "links": {"self": "x"}, "officers": [{"name": "B", "extra": 1}]});
        let out = transform(&record, &vitals_schema()).unwrap();
        assert!(out.get("links").is_none());
        assert_eq!(out["officers"][0], json!({"name": "B"}));
    }

    #[test]
    fn test_date_time_normalized() {
        let schema = vitals_schema();
        let cases = [
            ("2009-09-14", "2009-09-14T00:00:00Z"),
            ("2009-09-14T10:30:00", "2009-09-14T10:30:00Z"),
            ("2009-09-14T10:30:00+01:00", "2009-09-14T09:30:00Z"),
            ("2009-09-14 10:30:00", "2009-09-14T10:30:00Z"),
            ("2009-09-14T10:30:00+0000", "2009-09-14T10:30:00Z"),
            ("2009-09-14T10:30:00.000+0100", "2009-09-14T09:30:00Z"),
            ("2009-09-14T10:30:00.250Z", "2009-09-14T10:30:00.250Z"),
            ("2009-09-14T10:30Z", "2009-09-14T10:30:00Z"),
            ("2009-09-14T10:30+0200", "2009-09-14T08:30:00Z"),
            ("2009-09-14T10:30", "2009-09-14T10:30:00Z"),
        ];
        for (raw, expected) in cases {
            let out = transform(&json!({"incorporationDate": raw}), &schema).unwrap();
            assert_eq!(out["incorporationDate"], expected, "{}", raw);
        }
    }

    #[test]
    fn test_error_names_nested_path() {
        let record = json!({"officers": [{"age": 1}, {"age": "fifty"}]});
        let err = transform(&record, &vitals_schema()).unwrap_err();
        assert_eq!(err.path, "$.officers[1].age");
        assert!(err.message.contains("integer or null"));
        assert!(err.message.contains("\"fifty\""));
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let err = transform(&json!({"incorporationDate": "last tuesday"}), &vitals_schema()).unwrap_err();
        assert_eq!(err.path, "$.incorporationDate");
    }

    #[test]
    fn test_root_must_match() {
        let err = transform(&json!(null), &vitals_schema()).unwrap_err();
        assert_eq!(err.path, "$");
    }

    #[test]
    fn test_declared_order_wins() {
        let schema = json!({"type": ["string", "integer"]});
        assert_eq!(transform(&json!(5), &schema).unwrap(), json!("5"));

        let schema = json!({"type": ["integer", "string"]});
        assert_eq!(transform(&json!("5"), &schema).unwrap(), json!(5));
    }

    #[test]
    fn test_untyped_schema_passes_through() {
        let schema = json!({});
        let record = json!({"anything": [1, "two"]});
        assert_eq!(transform(&record, &schema).unwrap(), record);
    }

    #[test]
    fn test_any_of() {
        let schema = json!({"anyOf": [{"type": "integer"}, {"type": "string", "format": "date-time"}]});
        assert_eq!(transform(&json!("2020-01-02"), &schema).unwrap(), json!("2020-01-02T00:00:00Z"));
        assert!(transform(&json!(true), &schema).is_err());
    }
}
