//! Adapter error types.
//!
//! All adapter subsystems surface errors through [`AdapterError`].  Each
//! variant carries enough context for callers to decide how to handle the
//! failure without inspecting opaque strings.  Errors never cross the tool
//! boundary raw: every tool call converts them into a result envelope via
//! [`crate::envelope::failure`].

/// Unified error type for Worksuite adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A required credential or setting is absent.  Detected before any
    /// network call is made.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream API answered with a non-2xx status.  Never retried.
    #[error("upstream returned {status}: {message}")]
    UpstreamHttp { status: u16, message: String },

    /// Timeout or connection failure before a response arrived.  Never
    /// retried.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response payload did not match the expected shape.  Carries a
    /// truncated sample of the raw payload for diagnosis.
    #[error("parse error: {reason}; sample: {sample}")]
    Parse { reason: String, sample: String },

    /// The requested tool does not exist on this adapter.
    #[error("tool not found: `{tool_name}` on adapter `{adapter_id}`")]
    ToolNotFound {
        adapter_id: String,
        tool_name: String,
    },

    /// The parameters supplied to a tool are invalid.
    #[error("invalid parameters for tool `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Marker tag used in error envelopes so callers can branch on the
    /// failure class without string matching.
    pub fn error_type(&self) -> &'static str {
        match self {
            AdapterError::Config(_) => "config_error",
            AdapterError::UpstreamHttp { .. } => "http_error",
            AdapterError::Transport(_) => "transport_error",
            AdapterError::Parse { .. } => "parse_error",
            AdapterError::ToolNotFound { .. } => "tool_not_found",
            AdapterError::InvalidParams { .. } => "invalid_params",
            AdapterError::Serialization(_) => "parse_error",
        }
    }

    /// Builds a [`AdapterError::Parse`] with the raw payload truncated to a
    /// safe sample length.
    pub fn parse(reason: impl Into<String>, raw: &str) -> Self {
        const SAMPLE_LEN: usize = 200;
        let sample = if raw.len() > SAMPLE_LEN {
            let mut end = SAMPLE_LEN;
            while !raw.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &raw[..end])
        } else {
            raw.to_string()
        };
        AdapterError::Parse {
            reason: reason.into(),
            sample,
        }
    }
}

/// Convenience alias used throughout the worksuite crates.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_truncates_long_samples() {
        let raw = "x".repeat(500);
        let err = AdapterError::parse("bad shape", &raw);
        match err {
            AdapterError::Parse { sample, .. } => {
                assert!(sample.len() < 250);
                assert!(sample.ends_with("..."));
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_keeps_short_samples_intact() {
        let err = AdapterError::parse("bad shape", "{\"a\":1}");
        match err {
            AdapterError::Parse { sample, .. } => assert_eq!(sample, "{\"a\":1}"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_respects_utf8_boundaries() {
        let raw = "é".repeat(300);
        let err = AdapterError::parse("bad shape", &raw);
        match err {
            AdapterError::Parse { sample, .. } => assert!(sample.ends_with("...")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn error_type_tags_are_stable() {
        assert_eq!(AdapterError::Config("x".into()).error_type(), "config_error");
        assert_eq!(
            AdapterError::UpstreamHttp {
                status: 404,
                message: "not found".into()
            }
            .error_type(),
            "http_error"
        );
        assert_eq!(
            AdapterError::Transport("timed out".into()).error_type(),
            "transport_error"
        );
    }
}
