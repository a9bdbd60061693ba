//! Lenient request-field deserializers
//!
//! Browser forms send numbers as strings and clear fields with `""`, so
//! request bodies accept both shapes. The `nullable_*` variants distinguish
//! an absent field (`None`) from an explicit clear (`Some(None)`); pair them
//! with `#[serde(default)]`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer given as number or numeric string; blank and null become `None`
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_i64))
}

/// Float given as number or numeric string
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

/// Truthiness of a bool, number or string flag
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "yes" | "on"),
        _ => false,
    }))
}

/// Text given as string or number (`"16000"` or `16000`)
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

/// Presence-aware integer: absent → `None`, null/blank → `Some(None)`
pub fn nullable_i64<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(value_to_i64(&value)))
}

/// Presence-aware text: absent → `None`, null/blank → `Some(None)`
pub fn nullable_string<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(value_to_string(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_i64")]
        n: Option<i64>,
        #[serde(default, deserialize_with = "nullable_i64")]
        id: Option<Option<i64>>,
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: Option<bool>,
        #[serde(default, deserialize_with = "string_or_number")]
        rate: Option<String>,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_numbers_from_strings() {
        let p = probe(r#"{"n": "15", "rate": 16000}"#);
        assert_eq!(p.n, Some(15));
        assert_eq!(p.rate.as_deref(), Some("16000"));
    }

    #[test]
    fn test_nullable_presence() {
        assert_eq!(probe("{}").id, None);
        assert_eq!(probe(r#"{"id": null}"#).id, Some(None));
        assert_eq!(probe(r#"{"id": ""}"#).id, Some(None));
        assert_eq!(probe(r#"{"id": "7"}"#).id, Some(Some(7)));
    }

    #[test]
    fn test_flags() {
        assert_eq!(probe(r#"{"flag": 1}"#).flag, Some(true));
        assert_eq!(probe(r#"{"flag": "0"}"#).flag, Some(false));
        assert_eq!(probe(r#"{"flag": true}"#).flag, Some(true));
        assert_eq!(probe("{}").flag, None);
    }
}
