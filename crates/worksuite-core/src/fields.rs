//! Safe extraction of nested optional JSON fields.
//!
//! Upstream APIs omit keys freely and nest the interesting values several
//! levels deep.  These helpers walk a dotted path and fall back to typed
//! defaults instead of erroring, so adapter code reads as one call per field
//! rather than a chain of `get` and `and_then`.
//!
//! Sentinel strings are part of the output contract: callers pattern-match
//! on `"Unassigned"` and `"Unknown"`, so their exact spelling is fixed.

use serde_json::{Map, Value};

/// Sentinel for string fields whose semantic role is an attribute.
pub const UNKNOWN: &str = "Unknown";
/// Sentinel for person-like fields with no value.
pub const UNASSIGNED: &str = "Unassigned";
/// Sentinel produced by the custom-field formatter when no value slot is set.
pub const NO_VALUE: &str = "No value set";

const EMPTY_ARRAY: &[Value] = &[];

/// Walks `value` along a dotted path, returning the value at the end or
/// `None` if any intermediate key is absent or not an object.
pub fn path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in dotted.split('.') {
        current = current.get(key)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// String at `dotted`, or `default` when absent or not a string.
pub fn str_or<'a>(value: &'a Value, dotted: &str, default: &'a str) -> &'a str {
    path(value, dotted).and_then(Value::as_str).unwrap_or(default)
}

/// String at `dotted`, or the empty string.
pub fn str_or_empty<'a>(value: &'a Value, dotted: &str) -> &'a str {
    str_or(value, dotted, "")
}

/// String at `dotted`, or [`UNKNOWN`].
pub fn str_or_unknown<'a>(value: &'a Value, dotted: &str) -> &'a str {
    str_or(value, dotted, UNKNOWN)
}

/// String at `dotted`, or [`UNASSIGNED`].
pub fn str_or_unassigned<'a>(value: &'a Value, dotted: &str) -> &'a str {
    str_or(value, dotted, UNASSIGNED)
}

/// Number at `dotted`, or `0.0`.  Never null, so downstream arithmetic is
/// always safe.
pub fn f64_or_zero(value: &Value, dotted: &str) -> f64 {
    path(value, dotted).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Integer at `dotted`, or `0`.
pub fn i64_or_zero(value: &Value, dotted: &str) -> i64 {
    path(value, dotted).and_then(Value::as_i64).unwrap_or(0)
}

/// Array at `dotted`, or an empty slice.
pub fn array_or_empty<'a>(value: &'a Value, dotted: &str) -> &'a [Value] {
    path(value, dotted)
        .and_then(Value::as_array)
        .map_or(EMPTY_ARRAY, Vec::as_slice)
}

/// Formats a heterogeneous custom-field collection into one display string
/// per field name.
///
/// Value slots are consulted in fixed priority order and the first match
/// wins: `display_value` (non-empty string), `text_value` (non-empty
/// string), `number_value` (presence test, so a stored `0` formats as
/// `"0"`), then `enum_value.name`.  Fields with no slot set map to
/// [`NO_VALUE`].  When two fields share a name the later one overwrites the
/// earlier; upstream duplicates are rare and ambiguous either way.
pub fn format_custom_fields(fields: &[Value]) -> Map<String, Value> {
    let mut formatted = Map::new();
    for field in fields {
        let Some(name) = field.get("name").and_then(Value::as_str) else {
            continue;
        };
        formatted.insert(name.to_string(), Value::String(format_custom_field(field)));
    }
    formatted
}

fn format_custom_field(field: &Value) -> String {
    if let Some(display) = field.get("display_value").and_then(Value::as_str)
        && !display.is_empty()
    {
        return display.to_string();
    }
    if let Some(text) = field.get("text_value").and_then(Value::as_str)
        && !text.is_empty()
    {
        return text.to_string();
    }
    if let Some(number) = field.get("number_value")
        && !number.is_null()
    {
        return match number.as_i64() {
            Some(n) => n.to_string(),
            None => number.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        };
    }
    if let Some(name) = path(field, "enum_value.name").and_then(Value::as_str) {
        return name.to_string();
    }
    NO_VALUE.to_string()
}
