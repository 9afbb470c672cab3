//! Coercions from untyped JSON values

use serde_json::{Map, Value};

use crate::parsing::{dedup_trimmed, parse_delimited_list};

/// Number or numeric string, rejecting blanks and non-finite values
pub(crate) fn to_finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Floor into `u32`; anything past the type's range is rejected, not saturated
pub(crate) fn floor_u32(n: f64) -> Option<u32> {
    let floored = n.floor();
    (floored >= 0.0 && floored <= u32::MAX as f64).then(|| floored as u32)
}

/// Floor into `u64`. `u64::MAX as f64` rounds up to 2^64, hence the strict bound.
pub(crate) fn floor_u64(n: f64) -> Option<u64> {
    let floored = n.floor();
    (floored >= 0.0 && floored < u64::MAX as f64).then(|| floored as u64)
}

/// Truncate into `i64`, rejecting values outside its range
pub(crate) fn trunc_i64(n: f64) -> Option<i64> {
    let truncated = n.trunc();
    (truncated >= i64::MIN as f64 && truncated < i64::MAX as f64).then(|| truncated as i64)
}

/// Boolean-ish value; `None` means "not a recognizable toggle"
pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Loose truthiness used for caller-supplied feature overrides
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Trimmed string, `None` for blanks and non-strings
pub(crate) fn non_blank_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// List of strings from either a JSON array or a delimited string.
///
/// Non-string array items are dropped; the result is trimmed, deduplicated
/// and free of blanks.
pub(crate) fn sanitize_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => dedup_trimmed(items.iter().filter_map(Value::as_str)),
        Value::String(text) => parse_delimited_list(text),
        _ => Vec::new(),
    }
}

/// First key present with a non-null value
pub(crate) fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}
