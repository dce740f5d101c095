//! Result envelopes.
//!
//! Every public tool operation returns exactly one envelope: a JSON object
//! with a `status` of `"success"` or `"error"`, a human-readable `message`,
//! and one or more operation-specific payload keys.  On error the payload
//! keys are still present but empty, so callers can index into them without
//! branching on status first.

use serde_json::{Map, Value, json};

use crate::error::AdapterError;

/// Builds a success envelope with the given payload fields.
pub fn success(message: impl Into<String>, fields: Vec<(&str, Value)>) -> Value {
    let mut obj = Map::new();
    obj.insert("status".to_string(), json!("success"));
    obj.insert("message".to_string(), json!(message.into()));
    for (key, value) in fields {
        obj.insert(key.to_string(), value);
    }
    Value::Object(obj)
}

/// Builds an error envelope from an adapter error.
///
/// `empty_fields` names the payload keys the corresponding success envelope
/// would carry; each is emitted with an empty value of the right shape so
/// the envelope's key set is identical in both outcomes.  Authentication and
/// not-found failures get an actionable hint appended to the message.
pub fn failure(err: &AdapterError, empty_fields: Vec<(&str, Value)>) -> Value {
    let raw = err.to_string();
    let mut message = raw.clone();
    if let Some(hint) = hint_for(&raw) {
        message.push_str(". ");
        message.push_str(hint);
    }

    let mut obj = Map::new();
    obj.insert("status".to_string(), json!("error"));
    obj.insert("message".to_string(), json!(message));
    obj.insert("error_type".to_string(), json!(err.error_type()));
    for (key, value) in empty_fields {
        obj.insert(key.to_string(), value);
    }
    Value::Object(obj)
}

/// Standard cardinality message for list operations.
pub fn retrieved_message(count: usize, noun: &str) -> String {
    format!("Successfully retrieved {count} {noun}")
}

/// Picks a remediation hint for authentication and not-found failures.
///
/// The trigger is a case-insensitive substring match on the raw error text;
/// upstream error bodies vary too much for anything stricter.
fn hint_for(raw: &str) -> Option<&'static str> {
    let lower = raw.to_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") {
        Some("Check that your auth token is valid and has the required permissions")
    } else if lower.contains("404") {
        Some("Check that the requested resource exists and is accessible")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_status_message_and_payload() {
        let env = success("Successfully retrieved 2 projects", vec![(
            "projects",
            json!([{"id": 1}, {"id": 2}]),
        )]);
        assert_eq!(env["status"], "success");
        assert_eq!(env["message"], "Successfully retrieved 2 projects");
        assert_eq!(env["projects"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn failure_keeps_payload_keys_empty_but_present() {
        let err = AdapterError::Transport("connection refused".into());
        let env = failure(&err, vec![("projects", json!([]))]);
        assert_eq!(env["status"], "error");
        assert!(env["projects"].as_array().is_some_and(Vec::is_empty));
        assert!(!env["message"].as_str().unwrap_or_default().is_empty());
        assert_eq!(env["error_type"], "transport_error");
    }

    #[test]
    fn unauthorized_errors_get_a_hint() {
        let err = AdapterError::UpstreamHttp {
            status: 401,
            message: "Unauthorized".into(),
        };
        let env = failure(&err, vec![("pages", json!([]))]);
        let message = env["message"].as_str().unwrap_or_default();
        assert!(message.contains("auth token"));
    }

    #[test]
    fn not_found_errors_get_a_hint() {
        let err = AdapterError::UpstreamHttp {
            status: 404,
            message: "Not Found".into(),
        };
        let env = failure(&err, vec![("page", json!(null))]);
        let message = env["message"].as_str().unwrap_or_default();
        assert!(message.contains("exists and is accessible"));
    }

    #[test]
    fn plain_errors_get_no_hint() {
        let err = AdapterError::Transport("timed out after 30s".into());
        let env = failure(&err, vec![]);
        let message = env["message"].as_str().unwrap_or_default();
        assert!(!message.contains("Check that"));
    }

    #[test]
    fn retrieved_message_formats_cardinality() {
        assert_eq!(retrieved_message(12, "projects"), "Successfully retrieved 12 projects");
        assert_eq!(retrieved_message(0, "tasks"), "Successfully retrieved 0 tasks");
    }
}
