//! Core adapter trait and supporting types.
//!
//! Every SaaS adapter (issue tracker, code review, wiki, task manager, test
//! management) implements the [`Adapter`] trait, providing a uniform
//! interface for the plugin host to discover and invoke tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use worksuite_core::Result;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The category of service an adapter provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Issue and project tracking (tickets, sprints, boards).
    IssueTracking,
    /// Source hosting and code review (repositories, pull requests).
    CodeReview,
    /// Knowledge bases and wikis.
    Documentation,
    /// Work and task management.
    TaskManagement,
    /// Test case and test run management.
    TestManagement,
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IssueTracking => write!(f, "issue_tracking"),
            Self::CodeReview => write!(f, "code_review"),
            Self::Documentation => write!(f, "documentation"),
            Self::TaskManagement => write!(f, "task_management"),
            Self::TestManagement => write!(f, "test_management"),
        }
    }
}

/// A tool exposed by an adapter that the host can invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Machine-readable tool name (e.g. `jira_get_ticket_details`).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub parameters: serde_json::Value,
}

/// Authentication requirements for an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequirement {
    /// The credential provider name (e.g. `jira`, `asana`).
    pub provider: String,
    /// The environment variables the adapter reads its credential from.
    pub env_vars: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// The universal adapter interface.
///
/// Adapters are stateless per call: configuration and the HTTP client are
/// built once at construction and never mutated afterwards.  The host
/// discovers available tools via [`Adapter::tools`] and executes them via
/// [`Adapter::execute_tool`].
///
/// `execute_tool` returns `Err` only for host-seam failures (unknown tool,
/// invalid parameters).  Upstream failures are reported inside the returned
/// envelope so every valid invocation yields a value.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Return the unique identifier for this adapter instance.
    fn id(&self) -> &str;

    /// Return the category of service this adapter provides.
    fn adapter_type(&self) -> AdapterType;

    /// Return the list of tools this adapter exposes.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with the given JSON parameters.
    ///
    /// Returns a result envelope: a JSON object with `status`, `message`,
    /// and operation-specific payload keys.
    async fn execute_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Return the authentication requirements for this adapter, if any.
    fn required_auth(&self) -> Option<AuthRequirement>;
}
