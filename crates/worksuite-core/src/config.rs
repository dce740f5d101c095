//! Per-system configuration.
//!
//! Each upstream system gets one explicit config struct, read from the
//! environment exactly once at adapter construction.  Business logic never
//! touches the environment directly; it only sees these structs.
//!
//! A missing credential is not an error at construction time.  Adapters are
//! built unconditionally so they can list their tools and answer healthcheck
//! calls; the credential check happens before the first network call.

use std::env;

use crate::error::{AdapterError, Result};

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Connection settings for the Jira issue tracker.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl JiraConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("JIRA_BASE_URL"),
            auth_token: env_string("JIRA_AUTH_TOKEN"),
        }
    }

    /// Base URL and bearer token, or a config error naming what is missing.
    pub fn require(&self) -> Result<(&str, &str)> {
        require_pair(
            self.base_url.as_deref(),
            self.auth_token.as_deref(),
            "JIRA_BASE_URL",
            "JIRA_AUTH_TOKEN",
        )
    }
}

/// Connection settings for the Bitbucket Server code review system.
#[derive(Debug, Clone)]
pub struct BitbucketConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl BitbucketConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("BITBUCKET_BASE_URL"),
            auth_token: env_string("BITBUCKET_AUTH_TOKEN"),
        }
    }

    pub fn require(&self) -> Result<(&str, &str)> {
        require_pair(
            self.base_url.as_deref(),
            self.auth_token.as_deref(),
            "BITBUCKET_BASE_URL",
            "BITBUCKET_AUTH_TOKEN",
        )
    }
}

/// Connection settings for the Confluence wiki.
#[derive(Debug, Clone)]
pub struct ConfluenceConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl ConfluenceConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("CONFLUENCE_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            auth_token: env_string("CONFLUENCE_AUTH_TOKEN"),
        }
    }

    pub fn require(&self) -> Result<(&str, &str)> {
        require_pair(
            self.base_url.as_deref(),
            self.auth_token.as_deref(),
            "CONFLUENCE_BASE_URL",
            "CONFLUENCE_AUTH_TOKEN",
        )
    }
}

/// Connection settings for the Asana task manager.
#[derive(Debug, Clone)]
pub struct AsanaConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Skips TLS certificate verification when true.  Only for instances
    /// behind interception proxies; logged loudly when enabled.
    pub disable_ssl_verify: bool,
}

impl AsanaConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://app.asana.com/api/1.0";

    pub fn from_env() -> Self {
        Self {
            base_url: env_string("ASANA_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            auth_token: env_string("ASANA_AUTH_TOKEN"),
            disable_ssl_verify: env_flag("ASANA_DISABLE_SSL_VERIFY"),
        }
    }

    pub fn require_token(&self) -> Result<&str> {
        self.auth_token.as_deref().ok_or_else(|| {
            AdapterError::Config(
                "Asana credentials not configured. Set the ASANA_AUTH_TOKEN environment variable."
                    .to_string(),
            )
        })
    }
}

/// Connection settings for the TestRail test management system.
#[derive(Debug, Clone)]
pub struct TestRailConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
}

impl TestRailConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("TESTRAIL_URL").map(|u| u.trim_end_matches('/').to_string()),
            username: env_string("TESTRAIL_USERNAME"),
            api_key: env_string("TESTRAIL_API_KEY"),
        }
    }

    /// Base URL, username and API key, or a config error listing what is
    /// missing.
    pub fn require(&self) -> Result<(&str, &str, &str)> {
        let mut missing = Vec::new();
        if self.base_url.is_none() {
            missing.push("TESTRAIL_URL");
        }
        if self.username.is_none() {
            missing.push("TESTRAIL_USERNAME");
        }
        if self.api_key.is_none() {
            missing.push("TESTRAIL_API_KEY");
        }
        if !missing.is_empty() {
            return Err(AdapterError::Config(format!(
                "TestRail credentials not configured. Set: {}",
                missing.join(", ")
            )));
        }
        // Checked above.
        Ok((
            self.base_url.as_deref().unwrap_or_default(),
            self.username.as_deref().unwrap_or_default(),
            self.api_key.as_deref().unwrap_or_default(),
        ))
    }
}

fn require_pair<'a>(
    base_url: Option<&'a str>,
    token: Option<&'a str>,
    url_var: &str,
    token_var: &str,
) -> Result<(&'a str, &'a str)> {
    let mut missing = Vec::new();
    if base_url.is_none() {
        missing.push(url_var);
    }
    if token.is_none() {
        missing.push(token_var);
    }
    match (base_url, token) {
        (Some(u), Some(t)) => Ok((u.trim_end_matches('/'), t)),
        _ => Err(AdapterError::Config(format!(
            "credentials not configured. Set: {}",
            missing.join(", ")
        ))),
    }
}
