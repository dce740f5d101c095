//! Shared HTTP plumbing for the adapters.
//!
//! Each adapter owns one [`HttpClient`] built once at construction with its
//! credential and a uniform request timeout.  All outbound traffic flows
//! through [`HttpClient::send`], which is the single place where transport
//! failures and non-2xx statuses are classified into [`AdapterError`]
//! variants.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};

/// Uniform per-request timeout applied to every outbound call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How a request authenticates against the upstream.
#[derive(Debug, Clone)]
pub enum Credential {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credential {
    /// Interprets a configured token string.  A token containing a colon is
    /// `user:password` material for Basic auth; anything else is a bearer
    /// token.
    pub fn from_token(token: &str) -> Self {
        match token.split_once(':') {
            Some((username, password)) => Credential::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            None => Credential::Bearer(token.to_string()),
        }
    }
}

/// A reqwest client bound to one upstream credential.
pub struct HttpClient {
    client: reqwest::Client,
    credential: Credential,
}

impl HttpClient {
    pub fn new(credential: Credential) -> Self {
        Self::build(credential, false)
    }

    /// Builds a client that skips TLS certificate verification.  Only for
    /// instances behind interception proxies.
    pub fn new_insecure(credential: Credential) -> Self {
        warn!("TLS certificate verification is disabled for this adapter");
        Self::build(credential, true)
    }

    fn build(credential: Credential, accept_invalid_certs: bool) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Worksuite/0.1")
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .unwrap_or_default();
        Self { client, credential }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    /// GET a JSON document.
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "GET");
        let request = self
            .authorize(self.client.get(url))
            .header("Accept", "application/json");
        Self::send_json(request).await
    }

    /// GET a plain-text document (raw diffs, file content).
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "GET (text)");
        let request = self.authorize(self.client.get(url));
        let (status, body) = Self::send(request).await?;
        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }
        Ok(body)
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!(url = %url, "POST");
        let request = self
            .authorize(self.client.post(url))
            .header("Content-Type", "application/json")
            .json(body);
        Self::send_json(request).await
    }

    /// PUT a JSON body and parse the JSON response.
    pub async fn put_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!(url = %url, "PUT");
        let request = self
            .authorize(self.client.put(url))
            .header("Content-Type", "application/json")
            .json(body);
        Self::send_json(request).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "DELETE");
        let request = self.authorize(self.client.delete(url));
        Self::send_json(request).await
    }

    async fn send_json(request: reqwest::RequestBuilder) -> Result<Value> {
        let (status, body) = Self::send(request).await?;
        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }
        if body.trim().is_empty() {
            // 204 and friends.
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AdapterError::parse(format!("response is not valid JSON: {e}"), &body))
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<(reqwest::StatusCode, String)> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Transport(format!(
                    "request timed out after {DEFAULT_TIMEOUT_SECS}s: {e}"
                ))
            } else {
                AdapterError::Transport(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(format!("failed to read response body: {e}")))?;
        Ok((status, body))
    }
}

fn upstream_error(status: reqwest::StatusCode, body: &str) -> AdapterError {
    // Upstreams wrap error text inconsistently; try the common JSON shapes
    // before falling back to the raw body.
    let parsed: Value = serde_json::from_str(body).unwrap_or_else(|_| json!({"message": body}));
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            parsed
                .get("errorMessages")
                .and_then(Value::as_array)
                .and_then(|msgs| msgs.first())
                .and_then(Value::as_str)
        })
        .or_else(|| parsed.get("error").and_then(Value::as_str))
        .unwrap_or(body);
    AdapterError::UpstreamHttp {
        status: status.as_u16(),
        message: message.chars().take(300).collect(),
    }
}

/// Percent-encode a string for use in a URL query parameter.
pub mod urlencoding {
    pub fn encode(input: &str) -> String {
        let mut encoded = String::with_capacity(input.len() * 2);
        for byte in input.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    encoded.push(byte as char);
                }
                _ => {
                    encoded.push('%');
                    encoded.push_str(&format!("{byte:02X}"));
                }
            }
        }
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_with_colon_becomes_basic_auth() {
        match Credential::from_token("alice:s3cret") {
            Credential::Basic { username, password } => {
                assert_eq!(username, "alice");
                assert_eq!(password, "s3cret");
            }
            other => panic!("expected Basic, got {other:?}"),
        }
    }

    #[test]
    fn plain_token_becomes_bearer() {
        match Credential::from_token("abc123") {
            Credential::Bearer(token) => assert_eq!(token, "abc123"),
            other => panic!("expected Bearer, got {other:?}"),
        }
    }

    #[test]
    fn upstream_error_extracts_jira_style_messages() {
        let err = upstream_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"errorMessages":["Field 'priority' is required"],"errors":{}}"#,
        );
        match err {
            AdapterError::UpstreamHttp { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("priority"));
            }
            other => panic!("expected UpstreamHttp, got {other:?}"),
        }
    }

    #[test]
    fn upstream_error_falls_back_to_raw_body() {
        let err = upstream_error(reqwest::StatusCode::BAD_GATEWAY, "upstream exploded");
        match err {
            AdapterError::UpstreamHttp { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected UpstreamHttp, got {other:?}"),
        }
    }

    #[test]
    fn urlencoding_escapes_query_characters() {
        assert_eq!(urlencoding::encode("a b&c"), "a%20b%26c");
        assert_eq!(urlencoding::encode("safe-chars_.~"), "safe-chars_.~");
    }
}
