//! Tool parameter extraction helpers.
//!
//! Parameter problems are host-seam failures: they surface as
//! [`AdapterError::InvalidParams`] from `execute_tool` rather than inside a
//! result envelope.

use serde_json::Value;

use worksuite_core::{AdapterError, Result};

/// A required, non-empty string parameter.
pub fn require_str<'a>(params: &'a Value, key: &str, tool_name: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::InvalidParams {
            tool_name: tool_name.to_string(),
            reason: format!("missing required parameter `{key}`"),
        })
}

/// An optional string parameter; empty strings count as absent.
pub fn opt_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// An optional unsigned integer parameter.
pub fn opt_u64(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// A required unsigned integer parameter.
pub fn require_u64(params: &Value, key: &str, tool_name: &str) -> Result<u64> {
    opt_u64(params, key).ok_or_else(|| AdapterError::InvalidParams {
        tool_name: tool_name.to_string(),
        reason: format!("missing required parameter `{key}`"),
    })
}

/// A required array-of-strings parameter; empty arrays count as missing and
/// non-string entries are skipped.
pub fn require_str_list(params: &Value, key: &str, tool_name: &str) -> Result<Vec<String>> {
    let values: Vec<String> = params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if values.is_empty() {
        return Err(AdapterError::InvalidParams {
            tool_name: tool_name.to_string(),
            reason: format!("missing required parameter `{key}` (non-empty list of strings)"),
        });
    }
    Ok(values)
}

/// An optional boolean parameter.
pub fn opt_bool(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_rejects_missing_and_empty() {
        assert!(require_str(&json!({}), "key", "t").is_err());
        assert!(require_str(&json!({"key": ""}), "key", "t").is_err());
        assert!(require_str(&json!({"key": 5}), "key", "t").is_err());
        assert_eq!(require_str(&json!({"key": "v"}), "key", "t").unwrap(), "v");
    }

    #[test]
    fn opt_str_treats_empty_as_absent() {
        assert_eq!(opt_str(&json!({"k": ""}), "k"), None);
        assert_eq!(opt_str(&json!({"k": "x"}), "k"), Some("x"));
    }

    #[test]
    fn require_str_list_rejects_empty_and_skips_non_strings() {
        assert!(require_str_list(&json!({}), "k", "t").is_err());
        assert!(require_str_list(&json!({"k": []}), "k", "t").is_err());
        assert!(require_str_list(&json!({"k": [1, 2]}), "k", "t").is_err());
        assert_eq!(
            require_str_list(&json!({"k": ["a", 1, "", "b"]}), "k", "t").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn numeric_params_ignore_wrong_types() {
        assert_eq!(opt_u64(&json!({"n": "5"}), "n"), None);
        assert_eq!(opt_u64(&json!({"n": 5}), "n"), Some(5));
        assert!(require_u64(&json!({}), "n", "t").is_err());
    }
}
