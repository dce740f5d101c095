//! Bitbucket Server adapter.
//!
//! Pull request tools take a full PR web link and resolve it to the REST
//! 1.0 coordinates (project key, repository slug, PR id) via
//! [`parse_pr_link`].  PR payloads are mapped to a simplified shape with
//! reviewer approval status and the Jira issue key scraped from the title.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use worksuite_core::config::BitbucketConfig;
use worksuite_core::http::urlencoding;
use worksuite_core::{AdapterError, Credential, HttpClient, Result, envelope, fields};

use crate::params;
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};

const DEFAULT_REVIEWED_PR_LIMIT: u64 = 25;

static PR_LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"/projects/([^/]+)/repos/([^/]+)/pull-requests/(\d+)").expect("valid regex"),
        Regex::new(r"/projects/([^/]+)/repos/([^/]+)/pull-request/(\d+)").expect("valid regex"),
    ]
});

static JIRA_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"([A-Z]+-\d+)").expect("valid regex"),
        Regex::new(r"\[([A-Z]+-\d+)\]").expect("valid regex"),
        Regex::new(r"\(([A-Z]+-\d+)\)").expect("valid regex"),
    ]
});

/// Coordinates of one pull request on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrLocator {
    pub workspace: String,
    pub repo_slug: String,
    pub pr_id: String,
}

/// Parses a PR web link into its REST coordinates.  Both the plural and
/// singular URL shapes are accepted and a trailing `/overview` is ignored.
/// Malformed links yield `None`, never a partial locator.
pub fn parse_pr_link(pr_link: &str) -> Option<PrLocator> {
    let pr_link = pr_link.replace("/overview", "");
    for pattern in PR_LINK_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&pr_link) {
            return Some(PrLocator {
                workspace: captures.get(1)?.as_str().to_string(),
                repo_slug: captures.get(2)?.as_str().to_string(),
                pr_id: captures.get(3)?.as_str().to_string(),
            });
        }
    }
    None
}

/// Scrapes a Jira issue key out of a PR title.
pub fn parse_jira_id(title: &str) -> Option<String> {
    for pattern in JIRA_ID_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(title) {
            return captures.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

/// Bitbucket Server code review adapter.
pub struct BitbucketAdapter {
    id: String,
    config: BitbucketConfig,
    client: Option<HttpClient>,
}

impl BitbucketAdapter {
    pub fn new(id: &str) -> Self {
        Self::with_config(id, BitbucketConfig::from_env())
    }

    pub fn with_config(id: &str, config: BitbucketConfig) -> Self {
        // A token containing a colon is user:password material.
        let client = config
            .auth_token
            .as_deref()
            .map(|token| HttpClient::new(Credential::from_token(token)));
        Self {
            id: id.to_string(),
            config,
            client,
        }
    }

    fn connection(&self) -> Result<(&HttpClient, &str)> {
        let (base_url, _) = self.config.require()?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AdapterError::Config("BITBUCKET_AUTH_TOKEN is not set".to_string()))?;
        Ok((client, base_url))
    }

    fn repo_url(&self, base_url: &str, workspace: &str, repo_slug: &str) -> String {
        format!("{base_url}/rest/api/1.0/projects/{workspace}/repos/{repo_slug}")
    }

    fn locator(&self, params: &Value, tool_name: &str) -> Result<PrLocator> {
        let pr_link = params::require_str(params, "pr_link", tool_name)?;
        parse_pr_link(pr_link).ok_or_else(|| AdapterError::InvalidParams {
            tool_name: tool_name.to_string(),
            reason: format!(
                "could not parse PR link `{pr_link}`; expected .../projects/KEY/repos/slug/pull-requests/ID"
            ),
        })
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    fn tool_healthcheck(&self) -> Value {
        match self.config.require() {
            Ok((base_url, _)) => envelope::success(
                "Bitbucket adapter is configured",
                vec![("configured", json!(true)), ("base_url", json!(base_url))],
            ),
            Err(e) => envelope::failure(
                &e,
                vec![
                    ("configured", json!(false)),
                    (
                        "instructions",
                        json!("Set BITBUCKET_BASE_URL and BITBUCKET_AUTH_TOKEN (bearer token, or user:password for basic auth)"),
                    ),
                ],
            ),
        }
    }

    async fn tool_get_pr_details(&self, locator: &PrLocator) -> Value {
        match self.fetch_pr_details(locator).await {
            Ok((pr, diff)) => envelope::success(
                format!(
                    "Successfully retrieved pull request {} in {}/{}",
                    locator.pr_id, locator.workspace, locator.repo_slug
                ),
                vec![("pull_request", pr), ("diff", json!(diff))],
            ),
            Err(e) => {
                warn!(pr_id = %locator.pr_id, error = %e, "failed to fetch PR details");
                envelope::failure(
                    &e,
                    vec![("pull_request", Value::Null), ("diff", json!(""))],
                )
            }
        }
    }

    async fn fetch_pr_details(&self, locator: &PrLocator) -> Result<(Value, String)> {
        let (client, base_url) = self.connection()?;
        let pr_url = format!(
            "{}/pull-requests/{}",
            self.repo_url(base_url, &locator.workspace, &locator.repo_slug),
            locator.pr_id
        );
        let pr_data = client.get_json(&pr_url).await?;
        // The raw diff rides on the same URL with a .diff suffix.
        let diff = client.get_text(&format!("{pr_url}.diff")).await?;
        Ok((map_pr_data(&pr_data), diff))
    }

    async fn tool_add_pr_comment(&self, locator: &PrLocator, text: &str) -> Value {
        match self.add_pr_comment(locator, text).await {
            Ok(comment) => {
                info!(pr_id = %locator.pr_id, "added PR comment");
                envelope::success(
                    format!("Comment added to pull request {}", locator.pr_id),
                    vec![("comment", comment)],
                )
            }
            Err(e) => {
                warn!(pr_id = %locator.pr_id, error = %e, "failed to add PR comment");
                envelope::failure(&e, vec![("comment", Value::Null)])
            }
        }
    }

    async fn add_pr_comment(&self, locator: &PrLocator, text: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let url = format!(
            "{}/pull-requests/{}/comments",
            self.repo_url(base_url, &locator.workspace, &locator.repo_slug),
            locator.pr_id
        );
        client.post_json(&url, &json!({"text": text})).await
    }

    async fn tool_get_reviewed_prs(&self, params: &Value, tool_name: &str) -> Result<Value> {
        let workspaces = params::require_str_list(params, "workspaces", tool_name)?;
        let repo_slugs = params::require_str_list(params, "repo_slugs", tool_name)?;
        let username = params::require_str(params, "username", tool_name)?;
        let state = params::opt_str(params, "state").unwrap_or("ALL");
        let limit = params::opt_u64(params, "limit").unwrap_or(DEFAULT_REVIEWED_PR_LIMIT);
        match self
            .fetch_reviewed_prs(&workspaces, &repo_slugs, username, state, limit)
            .await
        {
            Ok((results, total)) => Ok(envelope::success(
                format!("Found {total} pull requests reviewed by {username}"),
                vec![("total_prs_found", json!(total)), ("results", results)],
            )),
            Err(e) => {
                warn!(username, error = %e, "failed to fetch reviewed PRs");
                Ok(envelope::failure(
                    &e,
                    vec![("total_prs_found", json!(0)), ("results", json!({}))],
                ))
            }
        }
    }

    /// Walks the workspace x repository grid and collects the PRs the user
    /// reviewed in each, keyed `results[workspace][repo_slug]`.
    async fn fetch_reviewed_prs(
        &self,
        workspaces: &[String],
        repo_slugs: &[String],
        username: &str,
        state: &str,
        limit: u64,
    ) -> Result<(Value, usize)> {
        let (client, base_url) = self.connection()?;
        let mut total = 0usize;
        let mut results = serde_json::Map::new();
        for workspace in workspaces {
            let mut repos = serde_json::Map::new();
            for repo_slug in repo_slugs {
                let url = format!(
                    "{}/pull-requests?limit={limit}&state={}&role.1=REVIEWER&username.1={}",
                    self.repo_url(base_url, workspace, repo_slug),
                    urlencoding::encode(state),
                    urlencoding::encode(username),
                );
                let data = client.get_json(&url).await?;
                let prs: Vec<Value> = fields::array_or_empty(&data, "values")
                    .iter()
                    .map(map_pr_data)
                    .collect();
                total += prs.len();
                repos.insert(repo_slug.clone(), json!(prs));
            }
            results.insert(workspace.clone(), Value::Object(repos));
        }
        Ok((Value::Object(results), total))
    }

    async fn tool_get_repo_permissions(&self, workspace: &str, repo_slug: &str) -> Value {
        match self.fetch_repo_permissions(workspace, repo_slug).await {
            Ok(permissions) => envelope::success(
                envelope::retrieved_message(permissions.len(), "user permissions"),
                vec![("permissions", json!(permissions))],
            ),
            Err(e) => {
                warn!(workspace, repo_slug, error = %e, "failed to fetch repository permissions");
                envelope::failure(&e, vec![("permissions", json!([]))])
            }
        }
    }

    async fn fetch_repo_permissions(
        &self,
        workspace: &str,
        repo_slug: &str,
    ) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!(
            "{}/permissions/users",
            self.repo_url(base_url, workspace, repo_slug)
        );
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "values")
            .iter()
            .map(|grant| {
                json!({
                    "username": fields::str_or_empty(grant, "user.name"),
                    "display_name": fields::str_or_empty(grant, "user.displayName"),
                    "email": fields::str_or_empty(grant, "user.emailAddress"),
                    "permission": fields::str_or_unknown(grant, "permission"),
                })
            })
            .collect())
    }

    async fn tool_get_repository_info(&self, workspace: &str, repo_slug: &str) -> Value {
        match self.fetch_repository_info(workspace, repo_slug).await {
            Ok(repo) => envelope::success(
                format!("Successfully retrieved repository {workspace}/{repo_slug}"),
                vec![("repository", repo)],
            ),
            Err(e) => {
                warn!(workspace, repo_slug, error = %e, "failed to fetch repository info");
                envelope::failure(&e, vec![("repository", Value::Null)])
            }
        }
    }

    async fn fetch_repository_info(&self, workspace: &str, repo_slug: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        client
            .get_json(&self.repo_url(base_url, workspace, repo_slug))
            .await
    }

    async fn tool_get_branches(
        &self,
        workspace: &str,
        repo_slug: &str,
        filter_text: Option<&str>,
    ) -> Value {
        match self.fetch_branches(workspace, repo_slug, filter_text).await {
            Ok(branches) => envelope::success(
                envelope::retrieved_message(branches.len(), "branches"),
                vec![("branches", json!(branches))],
            ),
            Err(e) => {
                warn!(workspace, repo_slug, error = %e, "failed to fetch branches");
                envelope::failure(&e, vec![("branches", json!([]))])
            }
        }
    }

    async fn fetch_branches(
        &self,
        workspace: &str,
        repo_slug: &str,
        filter_text: Option<&str>,
    ) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let mut url = format!("{}/branches", self.repo_url(base_url, workspace, repo_slug));
        if let Some(filter) = filter_text {
            url.push_str(&format!("?filterText={}", urlencoding::encode(filter)));
        }
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "values")
            .iter()
            .map(|branch| {
                json!({
                    "name": fields::str_or_empty(branch, "displayId"),
                    "id": fields::str_or_empty(branch, "id"),
                    "latest_commit": fields::str_or_empty(branch, "latestCommit"),
                    "is_default": fields::path(branch, "isDefault").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .collect())
    }

    async fn tool_get_commit_details(
        &self,
        workspace: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Value {
        match self.fetch_commit_details(workspace, repo_slug, commit_id).await {
            Ok(commit) => envelope::success(
                format!("Successfully retrieved commit {commit_id}"),
                vec![("commit", commit)],
            ),
            Err(e) => {
                warn!(commit_id, error = %e, "failed to fetch commit details");
                envelope::failure(&e, vec![("commit", Value::Null)])
            }
        }
    }

    async fn fetch_commit_details(
        &self,
        workspace: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let url = format!(
            "{}/commits/{commit_id}",
            self.repo_url(base_url, workspace, repo_slug)
        );
        let data = client.get_json(&url).await?;
        Ok(json!({
            "id": fields::str_or_empty(&data, "id"),
            "display_id": fields::str_or_empty(&data, "displayId"),
            "message": fields::str_or_empty(&data, "message"),
            "author": {
                "name": fields::str_or_unknown(&data, "author.name"),
                "email": fields::str_or_empty(&data, "author.emailAddress"),
            },
            "author_timestamp": data.get("authorTimestamp").cloned().unwrap_or(Value::Null),
            "parents": fields::array_or_empty(&data, "parents")
                .iter()
                .map(|p| json!(fields::str_or_empty(p, "id")))
                .collect::<Vec<Value>>(),
        }))
    }

    async fn tool_get_pr_activities(&self, locator: &PrLocator) -> Value {
        match self.fetch_pr_activities(locator).await {
            Ok(activities) => envelope::success(
                envelope::retrieved_message(activities.len(), "activities"),
                vec![("activities", json!(activities))],
            ),
            Err(e) => {
                warn!(pr_id = %locator.pr_id, error = %e, "failed to fetch PR activities");
                envelope::failure(&e, vec![("activities", json!([]))])
            }
        }
    }

    async fn fetch_pr_activities(&self, locator: &PrLocator) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!(
            "{}/pull-requests/{}/activities",
            self.repo_url(base_url, &locator.workspace, &locator.repo_slug),
            locator.pr_id
        );
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "values")
            .iter()
            .map(|activity| {
                json!({
                    "id": activity.get("id").cloned().unwrap_or(Value::Null),
                    "action": fields::str_or_unknown(activity, "action"),
                    "user": fields::str_or_unknown(activity, "user.displayName"),
                    "created_date": activity.get("createdDate").cloned().unwrap_or(Value::Null),
                    "comment": fields::str_or_empty(activity, "comment.text"),
                })
            })
            .collect())
    }

    async fn tool_get_file_content(
        &self,
        workspace: &str,
        repo_slug: &str,
        path: &str,
        at: Option<&str>,
    ) -> Value {
        match self.fetch_file_content(workspace, repo_slug, path, at).await {
            Ok(content) => envelope::success(
                format!("Successfully retrieved {path}"),
                vec![("path", json!(path)), ("content", json!(content))],
            ),
            Err(e) => {
                warn!(path, error = %e, "failed to fetch file content");
                envelope::failure(&e, vec![("path", json!(path)), ("content", json!(""))])
            }
        }
    }

    async fn fetch_file_content(
        &self,
        workspace: &str,
        repo_slug: &str,
        path: &str,
        at: Option<&str>,
    ) -> Result<String> {
        let (client, base_url) = self.connection()?;
        let mut url = format!(
            "{}/browse/{path}",
            self.repo_url(base_url, workspace, repo_slug)
        );
        if let Some(at) = at {
            url.push_str(&format!("?at={}", urlencoding::encode(at)));
        }
        let data = client.get_json(&url).await?;
        // The browse endpoint returns the file as a list of line objects.
        let content = fields::array_or_empty(&data, "lines")
            .iter()
            .map(|line| fields::str_or_empty(line, "text"))
            .collect::<Vec<&str>>()
            .join("\n");
        Ok(content)
    }

    async fn tool_create_pull_request(&self, params: &Value) -> Value {
        match self.create_pull_request(params).await {
            Ok(pr) => {
                let id = pr.get("id").cloned().unwrap_or(Value::Null);
                info!(pr_id = %id, "created pull request");
                envelope::success(
                    "Successfully created pull request",
                    vec![("pull_request", pr)],
                )
            }
            Err(e) => {
                warn!(error = %e, "failed to create pull request");
                envelope::failure(&e, vec![("pull_request", Value::Null)])
            }
        }
    }

    async fn create_pull_request(&self, params: &Value) -> Result<Value> {
        let tool = "bitbucket_create_pull_request";
        let (client, base_url) = self.connection()?;
        let workspace = params::require_str(params, "workspace", tool)?;
        let repo_slug = params::require_str(params, "repo_slug", tool)?;
        let source_branch = params::require_str(params, "source_branch", tool)?;
        let target_branch = params::require_str(params, "target_branch", tool)?;
        let title = params::require_str(params, "title", tool)?;
        let description = params::opt_str(params, "description").unwrap_or("");

        let branch_ref = |branch: &str| {
            json!({
                "id": format!("refs/heads/{branch}"),
                "repository": {
                    "slug": repo_slug,
                    "project": {"key": workspace}
                }
            })
        };
        let mut body = json!({
            "title": title,
            "description": description,
            "fromRef": branch_ref(source_branch),
            "toRef": branch_ref(target_branch),
        });
        if let Some(reviewers) = params.get("reviewers").and_then(Value::as_array) {
            let reviewers: Vec<Value> = reviewers
                .iter()
                .filter_map(Value::as_str)
                .map(|name| json!({"user": {"name": name}}))
                .collect();
            if let Some(obj) = body.as_object_mut() {
                obj.insert("reviewers".into(), json!(reviewers));
            }
        }

        let url = format!(
            "{}/pull-requests",
            self.repo_url(base_url, workspace, repo_slug)
        );
        let created = client.post_json(&url, &body).await?;
        Ok(map_pr_data(&created))
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn build_tool_definitions() -> Vec<ToolDefinition> {
        let repo_props = json!({
            "workspace": {"type": "string", "description": "Project key"},
            "repo_slug": {"type": "string", "description": "Repository slug"}
        });
        vec![
            ToolDefinition {
                name: "bitbucket_healthcheck".to_string(),
                description: "Check whether the Bitbucket adapter is configured".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "bitbucket_get_pr_details".to_string(),
                description: "Fetch a pull request (simplified shape plus raw diff) from its web link".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pr_link": {"type": "string", "description": "Full PR URL"}
                    },
                    "required": ["pr_link"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_add_pr_comment".to_string(),
                description: "Add a comment to a pull request identified by its web link".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pr_link": {"type": "string"},
                        "text": {"type": "string"}
                    },
                    "required": ["pr_link", "text"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_reviewed_prs".to_string(),
                description: "List pull requests a user reviewed, grouped by workspace and repository".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspaces": {"type": "array", "items": {"type": "string"}, "description": "Project keys to search"},
                        "repo_slugs": {"type": "array", "items": {"type": "string"}, "description": "Repository slugs to search"},
                        "username": {"type": "string", "description": "Reviewer username"},
                        "state": {"type": "string", "description": "ALL, OPEN, MERGED, or DECLINED (default ALL)"},
                        "limit": {"type": "integer", "description": "Max PRs per repository (default 25)"}
                    },
                    "required": ["workspaces", "repo_slugs", "username"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_repo_permissions".to_string(),
                description: "List per-user permission grants on a repository".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": repo_props.clone(),
                    "required": ["workspace", "repo_slug"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_repository_info".to_string(),
                description: "Get repository metadata".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": repo_props,
                    "required": ["workspace", "repo_slug"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_branches".to_string(),
                description: "List branches, optionally filtered by name substring".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace": {"type": "string"},
                        "repo_slug": {"type": "string"},
                        "filter_text": {"type": "string"}
                    },
                    "required": ["workspace", "repo_slug"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_commit_details".to_string(),
                description: "Get details for one commit".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace": {"type": "string"},
                        "repo_slug": {"type": "string"},
                        "commit_id": {"type": "string"}
                    },
                    "required": ["workspace", "repo_slug", "commit_id"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_pr_activities".to_string(),
                description: "List review activities (comments, approvals, rescopes) on a pull request".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pr_link": {"type": "string"}
                    },
                    "required": ["pr_link"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_get_file_content".to_string(),
                description: "Read a file from a repository at an optional ref".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace": {"type": "string"},
                        "repo_slug": {"type": "string"},
                        "path": {"type": "string"},
                        "at": {"type": "string", "description": "Branch, tag, or commit"}
                    },
                    "required": ["workspace", "repo_slug", "path"]
                }),
            },
            ToolDefinition {
                name: "bitbucket_create_pull_request".to_string(),
                description: "Create a pull request between two branches".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace": {"type": "string"},
                        "repo_slug": {"type": "string"},
                        "source_branch": {"type": "string"},
                        "target_branch": {"type": "string"},
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "reviewers": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["workspace", "repo_slug", "source_branch", "target_branch", "title"]
                }),
            },
        ]
    }
}

#[async_trait]
impl Adapter for BitbucketAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CodeReview
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Self::build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        match name {
            "bitbucket_healthcheck" => Ok(self.tool_healthcheck()),
            "bitbucket_get_pr_details" => {
                let locator = self.locator(&params, name)?;
                Ok(self.tool_get_pr_details(&locator).await)
            }
            "bitbucket_add_pr_comment" => {
                let locator = self.locator(&params, name)?;
                let text = params::require_str(&params, "text", name)?;
                Ok(self.tool_add_pr_comment(&locator, text).await)
            }
            "bitbucket_get_reviewed_prs" => self.tool_get_reviewed_prs(&params, name).await,
            "bitbucket_get_repo_permissions" => {
                let workspace = params::require_str(&params, "workspace", name)?;
                let repo_slug = params::require_str(&params, "repo_slug", name)?;
                Ok(self.tool_get_repo_permissions(workspace, repo_slug).await)
            }
            "bitbucket_get_repository_info" => {
                let workspace = params::require_str(&params, "workspace", name)?;
                let repo_slug = params::require_str(&params, "repo_slug", name)?;
                Ok(self.tool_get_repository_info(workspace, repo_slug).await)
            }
            "bitbucket_get_branches" => {
                let workspace = params::require_str(&params, "workspace", name)?;
                let repo_slug = params::require_str(&params, "repo_slug", name)?;
                let filter_text = params::opt_str(&params, "filter_text");
                Ok(self.tool_get_branches(workspace, repo_slug, filter_text).await)
            }
            "bitbucket_get_commit_details" => {
                let workspace = params::require_str(&params, "workspace", name)?;
                let repo_slug = params::require_str(&params, "repo_slug", name)?;
                let commit_id = params::require_str(&params, "commit_id", name)?;
                Ok(self
                    .tool_get_commit_details(workspace, repo_slug, commit_id)
                    .await)
            }
            "bitbucket_get_pr_activities" => {
                let locator = self.locator(&params, name)?;
                Ok(self.tool_get_pr_activities(&locator).await)
            }
            "bitbucket_get_file_content" => {
                let workspace = params::require_str(&params, "workspace", name)?;
                let repo_slug = params::require_str(&params, "repo_slug", name)?;
                let path = params::require_str(&params, "path", name)?;
                let at = params::opt_str(&params, "at");
                Ok(self
                    .tool_get_file_content(workspace, repo_slug, path, at)
                    .await)
            }
            "bitbucket_create_pull_request" => {
                for required in ["workspace", "repo_slug", "source_branch", "target_branch", "title"] {
                    params::require_str(&params, required, name)?;
                }
                Ok(self.tool_create_pull_request(&params).await)
            }
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "bitbucket".to_string(),
            env_vars: vec![
                "BITBUCKET_BASE_URL".to_string(),
                "BITBUCKET_AUTH_TOKEN".to_string(),
            ],
        })
    }
}

// ---------------------------------------------------------------------------
// PR mapping
// ---------------------------------------------------------------------------

fn map_user(entry: &Value, default_role: &str) -> Value {
    json!({
        "username": fields::str_or_empty(entry, "user.name"),
        "display_name": fields::str_or_empty(entry, "user.displayName"),
        "email": fields::str_or_empty(entry, "user.emailAddress"),
        "role": fields::str_or(entry, "role", default_role),
        "approved": fields::path(entry, "approved").and_then(Value::as_bool).unwrap_or(false),
        "status": fields::str_or(entry, "status", "UNAPPROVED"),
    })
}

fn map_branch(branch_ref: &Value) -> Value {
    json!({
        "name": fields::str_or_empty(branch_ref, "displayId"),
        "id": fields::str_or_empty(branch_ref, "id"),
        "latest_commit": fields::str_or_empty(branch_ref, "latestCommit"),
        "repository": {
            "slug": fields::str_or_empty(branch_ref, "repository.slug"),
            "name": fields::str_or_empty(branch_ref, "repository.name"),
            "project_key": fields::str_or_empty(branch_ref, "repository.project.key"),
            "project_name": fields::str_or_empty(branch_ref, "repository.project.name"),
        },
    })
}

/// Maps a raw PR document to the simplified shape.  The Jira issue key is
/// scraped from the title when present.
pub(crate) fn map_pr_data(pr_data: &Value) -> Value {
    let title = fields::str_or_empty(pr_data, "title");
    let reviewers: Vec<Value> = fields::array_or_empty(pr_data, "reviewers")
        .iter()
        .map(|r| map_user(r, "REVIEWER"))
        .collect();
    let participants: Vec<Value> = fields::array_or_empty(pr_data, "participants")
        .iter()
        .map(|p| map_user(p, "PARTICIPANT"))
        .collect();
    let self_links: Vec<Value> = fields::array_or_empty(pr_data, "links.self")
        .iter()
        .map(|link| json!(fields::str_or_empty(link, "href")))
        .collect();

    let mut mapped = json!({
        "id": pr_data.get("id").cloned().unwrap_or(Value::Null),
        "title": title,
        "description": fields::str_or_empty(pr_data, "description"),
        "state": fields::str_or_unknown(pr_data, "state"),
        "open": fields::path(pr_data, "open").and_then(Value::as_bool).unwrap_or(false),
        "closed": fields::path(pr_data, "closed").and_then(Value::as_bool).unwrap_or(false),
        "created_date": pr_data.get("createdDate").cloned().unwrap_or(Value::Null),
        "updated_date": pr_data.get("updatedDate").cloned().unwrap_or(Value::Null),
        "version": pr_data.get("version").cloned().unwrap_or(Value::Null),
        "author": fields::path(pr_data, "author").map(|a| map_user(a, "AUTHOR")).unwrap_or(Value::Null),
        "reviewers": reviewers,
        "participants": participants,
        "source_branch": fields::path(pr_data, "fromRef").map(map_branch).unwrap_or(Value::Null),
        "target_branch": fields::path(pr_data, "toRef").map(map_branch).unwrap_or(Value::Null),
        "links": {
            "web_url": self_links.first().cloned().unwrap_or(Value::Null),
            "self": self_links,
        },
    });

    if let Some(jira_id) = parse_jira_id(title)
        && let Some(obj) = mapped.as_object_mut()
    {
        obj.insert("jira_issue_id".into(), json!(jira_id));
    }
    mapped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BitbucketAdapter {
        BitbucketAdapter::with_config(
            "bitbucket-test",
            BitbucketConfig {
                base_url: Some("https://stash.example.com".to_string()),
                auth_token: Some("token".to_string()),
            },
        )
    }

    // -- PR link parsing --

    #[test]
    fn parses_plural_pr_link() {
        let locator = parse_pr_link(
            "https://stash.example.com/projects/INGN/repos/ingn_api/pull-requests/866/overview",
        )
        .unwrap();
        assert_eq!(locator.workspace, "INGN");
        assert_eq!(locator.repo_slug, "ingn_api");
        assert_eq!(locator.pr_id, "866");
    }

    #[test]
    fn parses_singular_pr_link() {
        let locator = parse_pr_link(
            "https://stash.example.com/projects/OPS/repos/deploy/pull-request/12",
        )
        .unwrap();
        assert_eq!(locator.workspace, "OPS");
        assert_eq!(locator.pr_id, "12");
    }

    #[test]
    fn both_url_shapes_yield_identical_locators() {
        let plural =
            parse_pr_link("https://x.example.com/projects/A/repos/b/pull-requests/3").unwrap();
        let singular =
            parse_pr_link("https://x.example.com/projects/A/repos/b/pull-request/3").unwrap();
        assert_eq!(plural, singular);
    }

    #[test]
    fn malformed_pr_link_yields_none() {
        assert!(parse_pr_link("https://stash.example.com/projects/INGN").is_none());
        assert!(parse_pr_link("not a link at all").is_none());
        assert!(parse_pr_link("/projects/X/repos/y/pull-requests/abc").is_none());
    }

    // -- Jira id parsing --

    #[test]
    fn jira_id_found_in_common_title_shapes() {
        assert_eq!(parse_jira_id("PRJ-123 fix the thing"), Some("PRJ-123".into()));
        assert_eq!(parse_jira_id("[OPS-7] deploy tweaks"), Some("OPS-7".into()));
        assert_eq!(parse_jira_id("hotfix (CORE-42)"), Some("CORE-42".into()));
        assert_eq!(parse_jira_id("no ticket here"), None);
    }

    // -- PR mapping --

    #[test]
    fn map_pr_data_simplifies_and_tags_jira_id() {
        let raw = json!({
            "id": 866,
            "title": "INGN-101 add rate limiting",
            "state": "OPEN",
            "open": true,
            "author": {"user": {"name": "ana", "displayName": "Ana"}, "approved": false},
            "reviewers": [
                {"user": {"name": "bo"}, "approved": true, "status": "APPROVED"}
            ],
            "fromRef": {
                "displayId": "feature/rate-limit",
                "id": "refs/heads/feature/rate-limit",
                "repository": {"slug": "ingn_api", "project": {"key": "INGN"}}
            },
            "toRef": {"displayId": "main", "repository": {"slug": "ingn_api", "project": {"key": "INGN"}}},
            "links": {"self": [{"href": "https://stash.example.com/pr/866"}]}
        });
        let mapped = map_pr_data(&raw);
        assert_eq!(mapped["jira_issue_id"], "INGN-101");
        assert_eq!(mapped["author"]["username"], "ana");
        assert_eq!(mapped["reviewers"][0]["approved"], true);
        assert_eq!(mapped["source_branch"]["name"], "feature/rate-limit");
        assert_eq!(mapped["source_branch"]["repository"]["project_key"], "INGN");
        assert_eq!(mapped["links"]["web_url"], "https://stash.example.com/pr/866");
    }

    #[test]
    fn map_pr_data_tolerates_sparse_payloads() {
        let mapped = map_pr_data(&json!({"id": 1}));
        assert_eq!(mapped["state"], "Unknown");
        assert_eq!(mapped["author"], Value::Null);
        assert!(mapped["reviewers"].as_array().unwrap().is_empty());
        assert!(mapped.get("jira_issue_id").is_none());
    }

    // -- Tool surface and dispatch --

    #[test]
    fn tools_cover_the_full_surface() {
        let names: Vec<String> = adapter().tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "bitbucket_healthcheck",
            "bitbucket_get_pr_details",
            "bitbucket_add_pr_comment",
            "bitbucket_get_reviewed_prs",
            "bitbucket_get_repo_permissions",
            "bitbucket_get_repository_info",
            "bitbucket_get_branches",
            "bitbucket_get_commit_details",
            "bitbucket_get_pr_activities",
            "bitbucket_get_file_content",
            "bitbucket_create_pull_request",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn malformed_pr_link_is_invalid_params() {
        let err = adapter()
            .execute_tool("bitbucket_get_pr_details", json!({"pr_link": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn reviewed_prs_requires_non_empty_lists() {
        let a = adapter();
        for bad in [
            json!({"repo_slugs": ["b"], "username": "bo"}),
            json!({"workspaces": [], "repo_slugs": ["b"], "username": "bo"}),
            json!({"workspaces": ["A"], "repo_slugs": ["b"]}),
        ] {
            let err = a
                .execute_tool("bitbucket_get_reviewed_prs", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, AdapterError::InvalidParams { .. }));
        }
    }

    #[tokio::test]
    async fn unconfigured_reviewed_prs_is_an_error_envelope() {
        let a = BitbucketAdapter::with_config(
            "bb",
            BitbucketConfig {
                base_url: None,
                auth_token: None,
            },
        );
        let env = a
            .execute_tool(
                "bitbucket_get_reviewed_prs",
                json!({"workspaces": ["A"], "repo_slugs": ["b"], "username": "bo"}),
            )
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["total_prs_found"], 0);
        assert!(env["results"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = adapter()
            .execute_tool("bitbucket_teleport", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_config_error() {
        let a = BitbucketAdapter::with_config(
            "bb",
            BitbucketConfig {
                base_url: None,
                auth_token: None,
            },
        );
        let env = a
            .execute_tool(
                "bitbucket_get_repository_info",
                json!({"workspace": "A", "repo_slug": "b"}),
            )
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["error_type"], "config_error");
        assert_eq!(env["repository"], Value::Null);

        let env = a
            .execute_tool(
                "bitbucket_get_repo_permissions",
                json!({"workspace": "A", "repo_slug": "b"}),
            )
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert!(env["permissions"].as_array().unwrap().is_empty());
    }
}
