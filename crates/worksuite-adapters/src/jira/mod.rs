//! Jira adapter.
//!
//! Covers ticket retrieval and mutation through REST API v2, sprint
//! reporting through the Agile 1.0 API, and pull request status read from
//! the development summary custom field.  Responses are flattened into
//! caller-safe records with sentinel defaults; see [`flatten_ticket`].

mod report;

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use worksuite_core::config::JiraConfig;
use worksuite_core::http::urlencoding;
use worksuite_core::pagination::filter_records;
use worksuite_core::{AdapterError, Credential, HttpClient, Result, envelope, fields};

use crate::params;
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};

pub use report::{build_sprint_report, summarize_sprint_reports};

/// Story points custom field on this instance.
const STORY_POINTS: &str = "customfield_10121";
/// Development summary custom field holding embedded PR state JSON.
const DEV_SUMMARY: &str = "customfield_25440";

static SPRINT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name=([^,\]]+)").expect("valid regex"));
static DEV_SUMMARY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""devSummaryJson":\s*""#).expect("valid regex"));
static CACHED_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{"cachedValue".*"isStale":[^}]*\}"#).expect("valid regex"));

/// Jira issue tracker adapter.
pub struct JiraAdapter {
    id: String,
    config: JiraConfig,
    client: Option<HttpClient>,
}

impl JiraAdapter {
    /// Create an adapter configured from the environment.
    pub fn new(id: &str) -> Self {
        Self::with_config(id, JiraConfig::from_env())
    }

    pub fn with_config(id: &str, config: JiraConfig) -> Self {
        let client = config
            .auth_token
            .as_deref()
            .map(|token| HttpClient::new(Credential::Bearer(token.to_string())));
        Self {
            id: id.to_string(),
            config,
            client,
        }
    }

    /// The configured client and base URL, or a config error before any
    /// network traffic happens.
    fn connection(&self) -> Result<(&HttpClient, &str)> {
        let (base_url, _) = self.config.require()?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AdapterError::Config("JIRA_AUTH_TOKEN is not set".to_string()))?;
        Ok((client, base_url))
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    fn tool_healthcheck(&self) -> Value {
        match self.config.require() {
            Ok((base_url, _)) => envelope::success(
                "Jira adapter is configured",
                vec![("configured", json!(true)), ("base_url", json!(base_url))],
            ),
            Err(e) => envelope::failure(
                &e,
                vec![
                    ("configured", json!(false)),
                    (
                        "instructions",
                        json!("Set JIRA_BASE_URL and JIRA_AUTH_TOKEN (a personal access token with read/write issue scope)"),
                    ),
                ],
            ),
        }
    }

    async fn tool_get_ticket_details(&self, ticket_key: &str) -> Value {
        match self.fetch_ticket_details(ticket_key).await {
            Ok(ticket) => envelope::success(
                format!("Successfully retrieved ticket {ticket_key}"),
                vec![("ticket", ticket)],
            ),
            Err(e) => {
                warn!(ticket_key, error = %e, "failed to fetch ticket details");
                envelope::failure(&e, vec![("ticket", Value::Null)])
            }
        }
    }

    async fn fetch_ticket_details(&self, ticket_key: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/issue/{ticket_key}?fields=*all,customfield_13544");
        let data = client.get_json(&url).await?;
        Ok(flatten_ticket(&data))
    }

    async fn tool_search_issues(&self, jql: &str, max_results: u64) -> Value {
        match self.fetch_search_results(jql, max_results).await {
            Ok((total, issues)) => {
                let count = issues.len();
                envelope::success(
                    envelope::retrieved_message(count, "issues"),
                    vec![
                        ("results", json!({"total": total, "issues": issues})),
                        ("query", json!(jql)),
                    ],
                )
            }
            Err(e) => {
                warn!(jql, error = %e, "issue search failed");
                envelope::failure(
                    &e,
                    vec![
                        ("results", json!({"total": 0, "issues": []})),
                        ("query", json!(jql)),
                    ],
                )
            }
        }
    }

    async fn fetch_search_results(&self, jql: &str, max_results: u64) -> Result<(u64, Vec<Value>)> {
        let (client, base_url) = self.connection()?;
        let issue_fields = format!(
            "key,summary,status,issuetype,priority,assignee,created,updated,{STORY_POINTS},{DEV_SUMMARY},customfield_26560,customfield_13543"
        );
        let url = format!(
            "{base_url}/rest/api/2/search?jql={}&maxResults={max_results}&fields={issue_fields}",
            urlencoding::encode(jql)
        );
        let data = client.get_json(&url).await?;

        let total = fields::i64_or_zero(&data, "total").max(0) as u64;
        let issues = fields::array_or_empty(&data, "issues")
            .iter()
            .map(flatten_search_row)
            .collect();
        Ok((total, issues))
    }

    async fn tool_get_projects(&self, search_term: &str, max_results: usize) -> Value {
        match self.fetch_projects(search_term, max_results).await {
            Ok(projects) => {
                let total_found = projects.len();
                envelope::success(
                    envelope::retrieved_message(total_found, "projects"),
                    vec![
                        ("results", json!({"total": total_found, "projects": projects})),
                        ("search_term", search_term_field(search_term)),
                        ("total_found", json!(total_found)),
                        ("filtered", json!(!search_term.is_empty())),
                    ],
                )
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch projects");
                envelope::failure(
                    &e,
                    vec![
                        ("results", json!({"total": 0, "projects": []})),
                        ("search_term", search_term_field(search_term)),
                        ("total_found", json!(0)),
                        ("filtered", json!(!search_term.is_empty())),
                    ],
                )
            }
        }
    }

    async fn fetch_projects(&self, search_term: &str, max_results: usize) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/project");
        let data = client.get_json(&url).await?;

        // Some instances wrap the list in a `values` field.
        let projects: Vec<Value> = match &data {
            Value::Array(list) => list.clone(),
            other => fields::array_or_empty(other, "values").to_vec(),
        };

        let mut filtered =
            filter_records(projects, search_term, &["name", "key", "description"]);
        filtered.truncate(max_results);
        Ok(filtered.iter().map(flatten_project_row).collect())
    }

    async fn tool_get_project_details(&self, project_id: &str) -> Value {
        match self.fetch_project_details(project_id).await {
            Ok(project) => envelope::success(
                format!("Successfully retrieved project {project_id}"),
                vec![
                    ("project", project),
                    ("project_identifier", json!(project_id)),
                ],
            ),
            Err(e) => {
                warn!(project_id, error = %e, "failed to fetch project details");
                envelope::failure(
                    &e,
                    vec![
                        ("project", Value::Null),
                        ("project_identifier", json!(project_id)),
                    ],
                )
            }
        }
    }

    async fn fetch_project_details(&self, project_id: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/project/{project_id}");
        let data = client.get_json(&url).await?;
        Ok(flatten_project_details(&data))
    }

    async fn tool_create_bug(&self, params: &Value) -> Value {
        match self.create_bug(params).await {
            Ok(created) => {
                let key = fields::str_or_unknown(&created, "key").to_string();
                info!(ticket_key = %key, "created bug ticket");
                envelope::success(
                    format!("Successfully created bug ticket {key}"),
                    vec![
                        ("ticket_key", json!(key)),
                        ("ticket_self", created.get("self").cloned().unwrap_or(Value::Null)),
                    ],
                )
            }
            Err(e) => {
                warn!(error = %e, "bug creation failed");
                envelope::failure(
                    &e,
                    vec![("ticket_key", Value::Null), ("ticket_self", Value::Null)],
                )
            }
        }
    }

    async fn create_bug(&self, params: &Value) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let project_key = params::require_str(params, "project_key", "jira_create_bug")?;

        // The create endpoint wants the numeric project id.
        let project_url = format!("{base_url}/rest/api/2/project/{project_key}");
        let project = client.get_json(&project_url).await?;
        let project_id = fields::str_or_empty(&project, "id").to_string();

        let priority = params::opt_str(params, "priority").unwrap_or("3-Medium");
        let mut bug_fields = Map::new();
        bug_fields.insert("project".into(), json!({"id": project_id}));
        bug_fields.insert(
            "summary".into(),
            json!(params::require_str(params, "summary", "jira_create_bug")?),
        );
        bug_fields.insert(
            "description".into(),
            json!(params::require_str(params, "description", "jira_create_bug")?),
        );
        bug_fields.insert("issuetype".into(), json!({"name": "Bug"}));
        bug_fields.insert("priority".into(), json!({"name": priority}));

        // Display names map to instance option ids, unknown values fall back
        // to the "-1" (none) option.
        let severity = params::opt_str(params, "severity").unwrap_or("-1");
        bug_fields.insert(
            "customfield_11947".into(),
            json!({"id": severity_option_id(severity)}),
        );
        let detected_in = params::opt_str(params, "detected_in").unwrap_or("-1");
        bug_fields.insert(
            "customfield_14849".into(),
            json!({"id": detected_in_option_id(detected_in)}),
        );
        let detected_by = params::opt_str(params, "detected_by").unwrap_or("-1");
        bug_fields.insert(
            "customfield_10940".into(),
            json!({"id": detected_by_option_id(detected_by)}),
        );

        if let Some(steps) = params::opt_str(params, "steps_to_reproduce") {
            bug_fields.insert("customfield_25647".into(), json!(steps));
        }
        if let Some(expected) = params::opt_str(params, "expected_result") {
            bug_fields.insert("customfield_26140".into(), json!(expected));
        }
        if let Some(actual) = params::opt_str(params, "actual_result") {
            bug_fields.insert("customfield_27140".into(), json!(actual));
        }

        let url = format!("{base_url}/rest/api/2/issue");
        client
            .post_json(&url, &json!({"fields": Value::Object(bug_fields)}))
            .await
    }

    async fn tool_add_comment(&self, ticket_key: &str, body: &str) -> Value {
        match self.add_comment(ticket_key, body).await {
            Ok(()) => envelope::success(
                format!("Comment added to {ticket_key}"),
                vec![("ticket_key", json!(ticket_key))],
            ),
            Err(e) => {
                warn!(ticket_key, error = %e, "comment addition failed");
                envelope::failure(&e, vec![("ticket_key", json!(ticket_key))])
            }
        }
    }

    async fn add_comment(&self, ticket_key: &str, body: &str) -> Result<()> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/issue/{ticket_key}/comment");
        client.post_json(&url, &json!({"body": body})).await?;
        Ok(())
    }

    async fn tool_update_ticket(&self, params: &Value) -> Value {
        let ticket_key = fields::str_or_empty(params, "ticket_key").to_string();
        match self.update_ticket(&ticket_key, params).await {
            Ok((updates_performed, fields_updated)) => {
                let updated_ticket = self
                    .fetch_ticket_details(&ticket_key)
                    .await
                    .unwrap_or(Value::Null);
                envelope::success(
                    format!("Successfully updated ticket {ticket_key}"),
                    vec![
                        ("ticket_key", json!(ticket_key)),
                        ("updates_performed", json!(updates_performed)),
                        ("fields_updated", json!(fields_updated)),
                        ("updated_ticket", updated_ticket),
                    ],
                )
            }
            Err(e) => {
                warn!(ticket_key, error = %e, "ticket update failed");
                envelope::failure(
                    &e,
                    vec![
                        ("ticket_key", json!(ticket_key)),
                        ("updates_performed", json!([])),
                        ("fields_updated", json!([])),
                        ("updated_ticket", Value::Null),
                    ],
                )
            }
        }
    }

    async fn update_ticket(
        &self,
        ticket_key: &str,
        params: &Value,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let (client, base_url) = self.connection()?;
        let mut update: Map<String, Value> = Map::new();

        if let Some(summary) = params::opt_str(params, "summary") {
            update.insert("summary".into(), json!(summary));
        }
        if let Some(description) = params::opt_str(params, "description") {
            update.insert("description".into(), json!(description));
        }
        // An empty assignee string unassigns the ticket.
        if let Some(assignee) = params.get("assignee").and_then(Value::as_str) {
            if assignee.is_empty() {
                update.insert("assignee".into(), Value::Null);
            } else {
                update.insert("assignee".into(), json!({"name": assignee}));
            }
        }
        if let Some(priority_id) = params::opt_str(params, "priority_id") {
            update.insert("priority".into(), json!({"id": priority_id}));
        }

        if let Some(labels) = params.get("labels").and_then(Value::as_array) {
            update.insert("labels".into(), json!(labels));
        } else if params.get("add_labels").is_some() || params.get("remove_labels").is_some() {
            let current = self.fetch_ticket_details(ticket_key).await?;
            let mut labels: Vec<String> = fields::array_or_empty(&current, "labels")
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            for label in fields::array_or_empty(params, "add_labels") {
                if let Some(label) = label.as_str()
                    && !labels.iter().any(|l| l == label)
                {
                    labels.push(label.to_string());
                }
            }
            if let Some(remove) = params.get("remove_labels").and_then(Value::as_array) {
                labels.retain(|l| !remove.iter().any(|r| r.as_str() == Some(l)));
            }
            update.insert("labels".into(), json!(labels));
        }

        let fields_updated: Vec<String> = update.keys().cloned().collect();
        let mut updates_performed = Vec::new();

        if !update.is_empty() {
            let url = format!("{base_url}/rest/api/2/issue/{ticket_key}");
            client
                .put_json(&url, &json!({"fields": Value::Object(update)}))
                .await?;
            updates_performed.push("Fields updated successfully".to_string());
        }

        if let Some(status_id) = params::opt_str(params, "status_id") {
            updates_performed.push(self.transition_status(ticket_key, status_id).await?);
        }

        if let Some(comment) = params::opt_str(params, "comment") {
            self.add_comment(ticket_key, comment).await?;
            updates_performed.push("Comment added successfully".to_string());
        }

        Ok((updates_performed, fields_updated))
    }

    /// Status changes go through the transitions endpoint: find the
    /// transition whose target matches and fire it.
    async fn transition_status(&self, ticket_key: &str, status_id: &str) -> Result<String> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/issue/{ticket_key}/transitions");
        let data = client.get_json(&url).await?;
        let transitions = fields::array_or_empty(&data, "transitions");

        let target = transitions
            .iter()
            .find(|t| fields::str_or_empty(t, "to.id") == status_id);
        let Some(target) = target else {
            let available: Vec<&str> = transitions
                .iter()
                .map(|t| fields::str_or_unknown(t, "to.name"))
                .collect();
            return Ok(format!(
                "No transition available to status ID {status_id}. Available transitions: {}",
                available.join(", ")
            ));
        };

        let transition_id = fields::str_or_empty(target, "id");
        client
            .post_json(&url, &json!({"transition": {"id": transition_id}}))
            .await?;
        Ok(format!(
            "Status transitioned to {}",
            fields::str_or_unknown(target, "to.name")
        ))
    }

    async fn tool_get_current_sprint_status(&self, board_id: &str) -> Value {
        match self.fetch_current_sprint_status(board_id).await {
            Ok(Some(current)) => {
                let name = fields::str_or_unknown(&current, "name").to_string();
                envelope::success(
                    format!("Current sprint status retrieved for {name}"),
                    vec![("board_id", json!(board_id)), ("current_sprint", current)],
                )
            }
            Ok(None) => envelope::success(
                format!("No active sprint found for board {board_id}"),
                vec![("board_id", json!(board_id)), ("current_sprint", Value::Null)],
            ),
            Err(e) => {
                warn!(board_id, error = %e, "failed to get current sprint status");
                envelope::failure(
                    &e,
                    vec![("board_id", json!(board_id)), ("current_sprint", Value::Null)],
                )
            }
        }
    }

    async fn fetch_current_sprint_status(&self, board_id: &str) -> Result<Option<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/agile/1.0/board/{board_id}/sprint?state=active");
        let data = client.get_json(&url).await?;

        let Some(sprint) = fields::array_or_empty(&data, "values").first().cloned() else {
            return Ok(None);
        };
        let report = self.fetch_single_sprint_report(&sprint).await?;
        Ok(Some(json!({
            "id": sprint.get("id").cloned().unwrap_or(Value::Null),
            "name": fields::str_or_unknown(&sprint, "name"),
            "state": fields::str_or_unknown(&sprint, "state"),
            "start_date": sprint.get("startDate").cloned().unwrap_or(Value::Null),
            "end_date": sprint.get("endDate").cloned().unwrap_or(Value::Null),
            "goal": fields::str_or_empty(&sprint, "goal"),
            "report": report,
        })))
    }

    async fn fetch_single_sprint_report(&self, sprint: &Value) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let sprint_id = fields::i64_or_zero(sprint, "id");
        let url = format!("{base_url}/rest/agile/1.0/sprint/{sprint_id}/issue?maxResults=500");
        let data = client.get_json(&url).await?;
        let issues = fields::array_or_empty(&data, "issues");
        debug!(sprint_id, issue_count = issues.len(), "building sprint report");
        Ok(report::build_sprint_report(sprint, issues, Utc::now()))
    }

    async fn tool_generate_sprint_report(&self, params: &Value) -> Value {
        let board_id = params::opt_str(params, "board_id");
        let sprint_id = params::opt_str(params, "sprint_id");
        let start_date = params::opt_str(params, "start_date");
        let end_date = params::opt_str(params, "end_date");

        if let Some(sprint_id) = sprint_id {
            return match self.report_for_sprint(sprint_id).await {
                Ok((board, name, report)) => envelope::success(
                    format!("Generated report for sprint {name}"),
                    vec![
                        ("sprint_id", json!(sprint_id)),
                        ("board_id", board),
                        ("sprint_report", report),
                    ],
                ),
                Err(e) => {
                    warn!(sprint_id, error = %e, "sprint report failed");
                    envelope::failure(
                        &e,
                        vec![
                            ("sprint_id", json!(sprint_id)),
                            ("sprint_report", Value::Null),
                        ],
                    )
                }
            };
        }

        let Some(board_id) = board_id else {
            // Checked in execute_tool; kept as a guard for direct callers.
            let e = AdapterError::InvalidParams {
                tool_name: "jira_generate_sprint_report".to_string(),
                reason: "either board_id or sprint_id must be provided".to_string(),
            };
            return envelope::failure(&e, vec![("sprint_reports", json!([]))]);
        };

        match self.report_for_board(board_id, start_date, end_date).await {
            Ok(reports) => {
                let summary = report::summarize_sprint_reports(&reports);
                envelope::success(
                    format!("Generated reports for {} sprints", reports.len()),
                    vec![
                        ("board_id", json!(board_id)),
                        (
                            "date_range",
                            json!({
                                "start_date": start_date,
                                "end_date": end_date,
                                "sprints_analyzed": reports.len(),
                            }),
                        ),
                        ("summary_metrics", summary),
                        ("sprint_reports", json!(reports)),
                    ],
                )
            }
            Err(e) => {
                warn!(board_id, error = %e, "board sprint report failed");
                envelope::failure(
                    &e,
                    vec![
                        ("board_id", json!(board_id)),
                        ("summary_metrics", Value::Null),
                        ("sprint_reports", json!([])),
                    ],
                )
            }
        }
    }

    async fn report_for_sprint(&self, sprint_id: &str) -> Result<(Value, String, Value)> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/agile/1.0/sprint/{sprint_id}");
        let sprint = client.get_json(&url).await?;
        let name = fields::str_or_unknown(&sprint, "name").to_string();
        let board = sprint.get("originBoardId").cloned().unwrap_or(Value::Null);
        let report = self.fetch_single_sprint_report(&sprint).await?;
        Ok((board, name, report))
    }

    async fn report_for_board(
        &self,
        board_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        // Without a date range only the active sprint is interesting; with
        // one, closed sprints join the set.
        let state = if start_date.is_none() && end_date.is_none() {
            "active"
        } else {
            "active,closed"
        };
        let url = format!(
            "{base_url}/rest/agile/1.0/board/{board_id}/sprint?state={state}&startAt=0&maxResults=100"
        );
        let data = client.get_json(&url).await?;
        let sprints: Vec<Value> = fields::array_or_empty(&data, "values")
            .iter()
            .filter(|sprint| sprint_in_range(sprint, start_date, end_date))
            .cloned()
            .collect();
        info!(board_id, count = sprints.len(), "sprints selected for reporting");

        let mut reports = Vec::with_capacity(sprints.len());
        for sprint in &sprints {
            match self.fetch_single_sprint_report(sprint).await {
                Ok(report) => reports.push(report),
                Err(e) => reports.push(json!({
                    "sprint_id": sprint.get("id").cloned().unwrap_or(Value::Null),
                    "sprint_name": fields::str_or_unknown(sprint, "name"),
                    "status": "error",
                    "error": e.to_string(),
                })),
            }
        }
        Ok(reports)
    }

    async fn tool_get_pull_request_details(&self, ticket_key: &str) -> Value {
        match self.fetch_pull_request_details(ticket_key).await {
            Ok(details) => details,
            Err(e) => {
                warn!(ticket_key, error = %e, "failed to get pull request details");
                envelope::failure(
                    &e,
                    vec![
                        ("ticket_key", json!(ticket_key)),
                        ("pull_request_count", json!(0)),
                        ("pull_request_state", json!("UNKNOWN")),
                    ],
                )
            }
        }
    }

    async fn fetch_pull_request_details(&self, ticket_key: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/2/issue/{ticket_key}");
        let data = client.get_json(&url).await?;

        let Some(pr_field) = fields::path(&data, &format!("fields.{DEV_SUMMARY}"))
            .and_then(Value::as_str)
        else {
            return Ok(envelope::success(
                "No pull request data found",
                vec![
                    ("ticket_key", json!(ticket_key)),
                    ("pull_request_count", json!(0)),
                    ("pull_request_state", json!("NONE")),
                ],
            ));
        };

        let parsed = parse_dev_summary_field(pr_field)?;
        Ok(pull_request_envelope(ticket_key, parsed))
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn build_tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "jira_healthcheck".to_string(),
                description: "Check whether the Jira adapter is configured".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "jira_get_ticket_details".to_string(),
                description: "Fetch a ticket flattened to caller-safe fields, including sprint, story points, and bug details".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ticket_key": {"type": "string", "description": "Ticket key, e.g. PRJ-123"}
                    },
                    "required": ["ticket_key"]
                }),
            },
            ToolDefinition {
                name: "jira_search_issues".to_string(),
                description: "Search issues with a JQL query".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "jql": {"type": "string", "description": "JQL query string"},
                        "max_results": {"type": "integer", "description": "Maximum issues to return (default 50)"}
                    },
                    "required": ["jql"]
                }),
            },
            ToolDefinition {
                name: "jira_get_projects".to_string(),
                description: "List accessible projects, optionally filtered by a search term".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search_term": {"type": "string", "description": "Case-insensitive filter over name, key, and description"},
                        "max_results": {"type": "integer", "description": "Maximum projects to return (default 50)"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "jira_get_project_details".to_string(),
                description: "Get full details for one project by id or key".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string", "description": "Project id or key"}
                    },
                    "required": ["project_id"]
                }),
            },
            ToolDefinition {
                name: "jira_create_bug".to_string(),
                description: "Create a bug ticket; severity, detected_in, and detected_by display names are mapped to instance option ids".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_key": {"type": "string"},
                        "summary": {"type": "string"},
                        "description": {"type": "string"},
                        "severity": {"type": "string", "description": "blocker, critical, high, major, medium, minor, low, or trivial"},
                        "steps_to_reproduce": {"type": "string"},
                        "expected_result": {"type": "string"},
                        "actual_result": {"type": "string"},
                        "detected_in": {"type": "string", "description": "dev, qa, stg, uat, prod, ..."},
                        "detected_by": {"type": "string", "description": "automated testing, manual testing, internal users, external users"},
                        "priority": {"type": "string", "description": "Priority name (default 3-Medium)"}
                    },
                    "required": ["project_key", "summary", "description"]
                }),
            },
            ToolDefinition {
                name: "jira_add_comment".to_string(),
                description: "Add a comment to a ticket".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ticket_key": {"type": "string"},
                        "body": {"type": "string"}
                    },
                    "required": ["ticket_key", "body"]
                }),
            },
            ToolDefinition {
                name: "jira_update_ticket".to_string(),
                description: "Update ticket fields, transition status, and add a comment in one call; an empty assignee unassigns".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ticket_key": {"type": "string"},
                        "summary": {"type": "string"},
                        "description": {"type": "string"},
                        "assignee": {"type": "string", "description": "Username; empty string unassigns"},
                        "priority_id": {"type": "string"},
                        "labels": {"type": "array", "items": {"type": "string"}, "description": "Replaces all labels"},
                        "add_labels": {"type": "array", "items": {"type": "string"}},
                        "remove_labels": {"type": "array", "items": {"type": "string"}},
                        "status_id": {"type": "string", "description": "Target status id for a workflow transition"},
                        "comment": {"type": "string"}
                    },
                    "required": ["ticket_key"]
                }),
            },
            ToolDefinition {
                name: "jira_get_current_sprint_status".to_string(),
                description: "Get the active sprint for a board with a full sprint report".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "board_id": {"type": "string"}
                    },
                    "required": ["board_id"]
                }),
            },
            ToolDefinition {
                name: "jira_generate_sprint_report".to_string(),
                description: "Generate sprint reports for a board (optionally date-filtered) or a single sprint".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "board_id": {"type": "string"},
                        "sprint_id": {"type": "string"},
                        "start_date": {"type": "string", "description": "YYYY-MM-DD"},
                        "end_date": {"type": "string", "description": "YYYY-MM-DD"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "jira_get_pull_request_details".to_string(),
                description: "Read linked pull request counts and state from the ticket's development summary".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ticket_key": {"type": "string"}
                    },
                    "required": ["ticket_key"]
                }),
            },
        ]
    }
}

#[async_trait]
impl Adapter for JiraAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::IssueTracking
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Self::build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        match name {
            "jira_healthcheck" => Ok(self.tool_healthcheck()),
            "jira_get_ticket_details" => {
                let ticket_key = params::require_str(&params, "ticket_key", name)?;
                Ok(self.tool_get_ticket_details(ticket_key).await)
            }
            "jira_search_issues" => {
                let jql = params::require_str(&params, "jql", name)?;
                let max_results = params::opt_u64(&params, "max_results").unwrap_or(50);
                Ok(self.tool_search_issues(jql, max_results).await)
            }
            "jira_get_projects" => {
                let search_term = params::opt_str(&params, "search_term").unwrap_or("");
                let max_results = params::opt_u64(&params, "max_results").unwrap_or(50) as usize;
                Ok(self.tool_get_projects(search_term, max_results).await)
            }
            "jira_get_project_details" => {
                let project_id = params::require_str(&params, "project_id", name)?;
                Ok(self.tool_get_project_details(project_id).await)
            }
            "jira_create_bug" => {
                params::require_str(&params, "project_key", name)?;
                params::require_str(&params, "summary", name)?;
                params::require_str(&params, "description", name)?;
                Ok(self.tool_create_bug(&params).await)
            }
            "jira_add_comment" => {
                let ticket_key = params::require_str(&params, "ticket_key", name)?;
                let body = params::require_str(&params, "body", name)?;
                Ok(self.tool_add_comment(ticket_key, body).await)
            }
            "jira_update_ticket" => {
                params::require_str(&params, "ticket_key", name)?;
                Ok(self.tool_update_ticket(&params).await)
            }
            "jira_get_current_sprint_status" => {
                let board_id = params::require_str(&params, "board_id", name)?;
                Ok(self.tool_get_current_sprint_status(board_id).await)
            }
            "jira_generate_sprint_report" => {
                if params::opt_str(&params, "board_id").is_none()
                    && params::opt_str(&params, "sprint_id").is_none()
                {
                    return Err(AdapterError::InvalidParams {
                        tool_name: name.to_string(),
                        reason: "either board_id or sprint_id must be provided".to_string(),
                    });
                }
                Ok(self.tool_generate_sprint_report(&params).await)
            }
            "jira_get_pull_request_details" => {
                let ticket_key = params::require_str(&params, "ticket_key", name)?;
                Ok(self.tool_get_pull_request_details(ticket_key).await)
            }
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "jira".to_string(),
            env_vars: vec!["JIRA_BASE_URL".to_string(), "JIRA_AUTH_TOKEN".to_string()],
        })
    }
}

// ---------------------------------------------------------------------------
// Response flattening
// ---------------------------------------------------------------------------

/// Extracts the sprint name from the agile sprint field, which arrives as a
/// Java toString blob (`...,name=Sprint 42,startDate=...`).
pub(crate) fn sprint_name_from_field(raw: &str) -> Option<String> {
    SPRINT_NAME_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Flattens a raw issue document into the caller-safe ticket shape.  Bug
/// tickets get the bug-only fields appended.
pub(crate) fn flatten_ticket(data: &Value) -> Value {
    let sprint_name = fields::array_or_empty(data, "fields.customfield_13543")
        .first()
        .and_then(Value::as_str)
        .and_then(sprint_name_from_field);
    let fix_version = fields::array_or_empty(data, "fields.fixVersions")
        .first()
        .map(|v| fields::str_or_unknown(v, "name").to_string());
    let components: Vec<String> = fields::array_or_empty(data, "fields.components")
        .iter()
        .map(|c| fields::str_or_unknown(c, "name").to_string())
        .collect();

    let issue_type = fields::str_or_unknown(data, "fields.issuetype.name").to_string();
    let mut ticket = json!({
        "key": fields::str_or_unknown(data, "key"),
        "project_id": fields::str_or_empty(data, "fields.project.id"),
        "project_key": fields::str_or_empty(data, "fields.project.key"),
        "issue_type": issue_type,
        "summary": fields::str_or_empty(data, "fields.summary"),
        "acceptance_criteria": fields::str_or_empty(data, "fields.customfield_10253"),
        "description": fields::str_or_empty(data, "fields.description"),
        "status": fields::str_or_unknown(data, "fields.status.name"),
        "priority": fields::str_or_unknown(data, "fields.priority.name"),
        "assignee": fields::str_or_unassigned(data, "fields.assignee.name"),
        "components": components,
        "labels": fields::array_or_empty(data, "fields.labels"),
        "sprint_name": sprint_name,
        "tech_category": fields::path(data, "fields.customfield_14746.value").cloned().unwrap_or(Value::Null),
        "fix_version": fix_version,
        "story_points": fields::f64_or_zero(data, &format!("fields.{STORY_POINTS}")),
        "epic_link": fields::path(data, "fields.customfield_13544").cloned().unwrap_or(Value::Null),
    });

    if issue_type.eq_ignore_ascii_case("bug")
        && let Some(obj) = ticket.as_object_mut()
    {
        obj.insert(
            "steps_to_reproduce".into(),
            json!(fields::str_or_empty(data, "fields.customfield_25647")),
        );
        obj.insert(
            "expected_results".into(),
            json!(fields::str_or_empty(data, "fields.customfield_26140")),
        );
        obj.insert(
            "actual_results".into(),
            json!(fields::str_or_empty(data, "fields.customfield_27140")),
        );
        obj.insert(
            "severity".into(),
            fields::path(data, "fields.customfield_11947.value")
                .cloned()
                .unwrap_or(Value::Null),
        );
        obj.insert(
            "detected_in".into(),
            fields::path(data, "fields.customfield_14849.value")
                .cloned()
                .unwrap_or(Value::Null),
        );
        obj.insert(
            "root_cause".into(),
            fields::path(data, "fields.customfield_12049.value")
                .cloned()
                .unwrap_or(Value::Null),
        );
        obj.insert(
            "root_cause_description".into(),
            json!(fields::str_or_empty(data, "fields.customfield_10415")),
        );
    }

    ticket
}

fn flatten_search_row(issue: &Value) -> Value {
    json!({
        "key": fields::str_or_unknown(issue, "key"),
        "summary": fields::str_or_empty(issue, "fields.summary"),
        "status": fields::str_or_unknown(issue, "fields.status.name"),
        "type": fields::str_or_unknown(issue, "fields.issuetype.name"),
        "priority": fields::str_or_unknown(issue, "fields.priority.name"),
        "assignee": fields::str_or_unassigned(issue, "fields.assignee.displayName"),
        "created": fields::str_or_unknown(issue, "fields.created"),
        "updated": fields::str_or_unknown(issue, "fields.updated"),
        "story_points": fields::f64_or_zero(issue, &format!("fields.{STORY_POINTS}")),
    })
}

fn flatten_project_row(project: &Value) -> Value {
    json!({
        "id": fields::str_or_empty(project, "id"),
        "key": fields::str_or_empty(project, "key"),
        "name": fields::str_or_empty(project, "name"),
        "description": fields::str_or(project, "description", "No description"),
        "lead": fields::str_or_unknown(project, "lead.displayName"),
        "project_type": fields::str_or_unknown(project, "projectTypeKey"),
        "category": fields::str_or(project, "projectCategory.name", "Uncategorized"),
        "url": fields::str_or_empty(project, "self"),
    })
}

fn flatten_project_details(data: &Value) -> Value {
    let components: Vec<Value> = fields::array_or_empty(data, "components")
        .iter()
        .map(|c| {
            json!({
                "id": fields::str_or_empty(c, "id"),
                "name": fields::str_or_empty(c, "name"),
                "description": fields::str_or(c, "description", "No description"),
                "lead": fields::str_or_unknown(c, "lead.displayName"),
            })
        })
        .collect();
    let versions: Vec<Value> = fields::array_or_empty(data, "versions")
        .iter()
        .map(|v| {
            json!({
                "id": fields::str_or_empty(v, "id"),
                "name": fields::str_or_empty(v, "name"),
                "released": fields::path(v, "released").and_then(Value::as_bool).unwrap_or(false),
                "archived": fields::path(v, "archived").and_then(Value::as_bool).unwrap_or(false),
                "release_date": v.get("releaseDate").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    let issue_types: Vec<Value> = fields::array_or_empty(data, "issueTypes")
        .iter()
        .map(|t| {
            json!({
                "id": fields::str_or_empty(t, "id"),
                "name": fields::str_or_empty(t, "name"),
                "subtask": fields::path(t, "subtask").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect();

    json!({
        "id": fields::str_or_empty(data, "id"),
        "key": fields::str_or_empty(data, "key"),
        "name": fields::str_or_empty(data, "name"),
        "description": fields::str_or(data, "description", "No description"),
        "lead": {
            "username": fields::str_or_unknown(data, "lead.name"),
            "display_name": fields::str_or_unknown(data, "lead.displayName"),
        },
        "project_type": fields::str_or_unknown(data, "projectTypeKey"),
        "category": fields::str_or(data, "projectCategory.name", "Uncategorized"),
        "url": fields::str_or_empty(data, "self"),
        "components": components,
        "versions": versions,
        "issue_types": issue_types,
    })
}

fn search_term_field(search_term: &str) -> Value {
    if search_term.is_empty() {
        json!("All projects")
    } else {
        json!(search_term)
    }
}

// ---------------------------------------------------------------------------
// Development summary parsing
// ---------------------------------------------------------------------------

/// Parsed pull request state from the development summary field.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PullRequestSummary {
    pub count: u64,
    pub state: String,
    pub open_count: u64,
    pub merged_count: u64,
    pub declined_count: u64,
    pub last_updated: Option<String>,
    /// True when the structured parse failed and the counts were salvaged
    /// with field-level regexes.
    pub regex_fallback: bool,
}

fn parsed_state_label(parsed: &PullRequestSummary) -> String {
    format!(
        "{} total ({} open, {} merged, {} declined)",
        parsed.count, parsed.open_count, parsed.merged_count, parsed.declined_count
    )
}

/// Builds the success envelope for a parsed development summary.
pub(crate) fn pull_request_envelope(ticket_key: &str, parsed: PullRequestSummary) -> Value {
    let state_label = parsed_state_label(&parsed);
    let mut fields_out = vec![("ticket_key", json!(ticket_key))];
    fields_out.push(("pull_request_count", parsed.count.into()));
    fields_out.push(("pull_request_state", json!(parsed.state)));
    fields_out.push(("open_count", parsed.open_count.into()));
    fields_out.push(("merged_count", parsed.merged_count.into()));
    fields_out.push(("declined_count", parsed.declined_count.into()));
    fields_out.push((
        "last_updated",
        parsed.last_updated.map_or(Value::Null, Value::String),
    ));
    if parsed.regex_fallback {
        fields_out.push(("parsing_method", json!("regex_fallback")));
    }
    envelope::success(
        format!("Pull request state for {ticket_key}: {state_label}"),
        fields_out,
    )
}

/// Two-stage parse of the development summary field.
///
/// The field is a Java toString blob with a `devSummaryJson` entry holding
/// escaped JSON.  Stage one extracts and parses that JSON; stage two
/// salvages the individual counters with regexes when the structured parse
/// fails.  Only when neither stage finds anything does this error, carrying
/// a truncated sample of the raw field.
pub(crate) fn parse_dev_summary_field(pr_field: &str) -> Result<PullRequestSummary> {
    let embedded = extract_dev_summary_json(pr_field).or_else(|| {
        CACHED_VALUE_RE
            .find(pr_field)
            .map(|m| m.as_str().to_string())
    });

    if let Some(embedded) = embedded
        && let Ok(summary) = serde_json::from_str::<Value>(&embedded)
    {
        let overall = fields::path(&summary, "cachedValue.summary.pullrequest.overall");
        if let Some(overall) = overall {
            return Ok(PullRequestSummary {
                count: fields::i64_or_zero(overall, "count").max(0) as u64,
                state: fields::str_or(overall, "state", "UNKNOWN").to_string(),
                open_count: fields::i64_or_zero(overall, "details.openCount").max(0) as u64,
                merged_count: fields::i64_or_zero(overall, "details.mergedCount").max(0) as u64,
                declined_count: fields::i64_or_zero(overall, "details.declinedCount").max(0)
                    as u64,
                last_updated: fields::path(overall, "lastUpdated")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                regex_fallback: false,
            });
        }
    }

    warn!("structured parse of development summary failed, falling back to regex salvage");
    salvage_pr_counts(pr_field)
}

/// Pulls the escaped JSON string out of the `devSummaryJson` entry, undoing
/// the quote and backslash escaping as it goes.  The value may contain
/// escaped quotes, so a lazy regex capture would truncate it.
fn extract_dev_summary_json(pr_field: &str) -> Option<String> {
    let start = DEV_SUMMARY_KEY_RE.find(pr_field)?.end();
    let mut out = String::new();
    let mut chars = pr_field[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            '"' => return Some(out),
            other => out.push(other),
        }
    }
    None
}

/// Field-level salvage when the embedded JSON is mangled.  The patterns
/// tolerate escaped quotes so they work on both the raw and the unescaped
/// form of the field.
fn salvage_pr_counts(pr_field: &str) -> Result<PullRequestSummary> {
    let capture_u64 = |pattern: &str| -> Option<u64> {
        Regex::new(pattern)
            .ok()?
            .captures(pr_field)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    };
    let capture_str = |pattern: &str| -> Option<String> {
        Regex::new(pattern)
            .ok()?
            .captures(pr_field)?
            .get(1)
            .map(|m| m.as_str().to_string())
    };

    let count = capture_u64(r#""count\\?":\s*(\d+)"#);
    let state = capture_str(r#""state\\?":\s*\\?"([^"\\]*)"#);
    if count.is_none() && state.is_none() {
        return Err(AdapterError::parse(
            "failed to parse pull request data using both JSON and regex methods",
            pr_field,
        ));
    }

    Ok(PullRequestSummary {
        count: count.unwrap_or(0),
        state: state.unwrap_or_else(|| "UNKNOWN".to_string()),
        open_count: capture_u64(r#""openCount\\?":\s*(\d+)"#).unwrap_or(0),
        merged_count: capture_u64(r#""mergedCount\\?":\s*(\d+)"#).unwrap_or(0),
        declined_count: capture_u64(r#""declinedCount\\?":\s*(\d+)"#).unwrap_or(0),
        last_updated: capture_str(r#""lastUpdated\\?":\s*\\?"([^"\\]*)"#),
        regex_fallback: true,
    })
}

fn sprint_in_range(sprint: &Value, start_date: Option<&str>, end_date: Option<&str>) -> bool {
    let Some(sprint_start) = fields::path(sprint, "startDate")
        .and_then(Value::as_str)
        .and_then(report::parse_jira_datetime)
    else {
        // Sprints without a start date are unplanned; skip them.
        return false;
    };
    let sprint_end = fields::path(sprint, "endDate")
        .and_then(Value::as_str)
        .and_then(report::parse_jira_datetime)
        .unwrap_or_else(Utc::now);

    if let Some(start) = start_date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        && sprint_end.date_naive() < start
    {
        return false;
    }
    if let Some(end) = end_date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        && sprint_start.date_naive() > end
    {
        return false;
    }
    true
}

fn severity_option_id(severity: &str) -> &'static str {
    match severity.trim().to_lowercase().as_str() {
        "blocker" => "48721",
        "critical" => "12886",
        "high" => "12887",
        "major" => "48722",
        "medium" => "12888",
        "minor" => "48723",
        "low" => "12889",
        "trivial" => "48724",
        _ => "-1",
    }
}

fn detected_in_option_id(detected_in: &str) -> &'static str {
    match detected_in.trim().to_lowercase().as_str() {
        "dev" => "17473",
        "qa" => "17472",
        "stg" => "17474",
        "uat" => "17475",
        "testpool" => "43557",
        "prod beta" => "36261",
        "prod" => "17476",
        "dr" => "43558",
        "production server" => "48718",
        "qa server" => "48719",
        "pre-production server" => "48720",
        _ => "-1",
    }
}

fn detected_by_option_id(detected_by: &str) -> &'static str {
    match detected_by.trim().to_lowercase().as_str() {
        "automated testing" => "17477",
        "manual testing" => "11962",
        "internal users" => "11960",
        "external users" => "11961",
        _ => "-1",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> JiraAdapter {
        JiraAdapter::with_config(
            "jira-test",
            JiraConfig {
                base_url: Some("https://jira.example.com".to_string()),
                auth_token: Some("token".to_string()),
            },
        )
    }

    fn unconfigured() -> JiraAdapter {
        JiraAdapter::with_config(
            "jira-test",
            JiraConfig {
                base_url: None,
                auth_token: None,
            },
        )
    }

    // -- Construction and tool surface --

    #[test]
    fn adapter_reports_identity() {
        let a = adapter();
        assert_eq!(a.id(), "jira-test");
        assert_eq!(a.adapter_type(), AdapterType::IssueTracking);
    }

    #[test]
    fn tools_cover_the_full_surface() {
        let names: Vec<String> = adapter().tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "jira_healthcheck",
            "jira_get_ticket_details",
            "jira_search_issues",
            "jira_get_projects",
            "jira_get_project_details",
            "jira_create_bug",
            "jira_add_comment",
            "jira_update_ticket",
            "jira_get_current_sprint_status",
            "jira_generate_sprint_report",
            "jira_get_pull_request_details",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn tool_schemas_declare_required_fields() {
        let tools = adapter().tools();
        let details = tools
            .iter()
            .find(|t| t.name == "jira_get_ticket_details")
            .unwrap();
        assert_eq!(details.parameters["required"][0], "ticket_key");
    }

    #[test]
    fn required_auth_names_env_vars() {
        let auth = adapter().required_auth().unwrap();
        assert_eq!(auth.provider, "jira");
        assert!(auth.env_vars.contains(&"JIRA_AUTH_TOKEN".to_string()));
    }

    // -- Dispatch --

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = adapter()
            .execute_tool("jira_nope", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_required_param_is_rejected() {
        let err = adapter()
            .execute_tool("jira_get_ticket_details", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn sprint_report_needs_board_or_sprint() {
        let err = adapter()
            .execute_tool("jira_generate_sprint_report", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unconfigured_adapter_returns_config_error_envelope() {
        let env = unconfigured()
            .execute_tool("jira_get_projects", json!({}))
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["error_type"], "config_error");
        assert!(env["results"]["projects"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn healthcheck_reports_missing_configuration() {
        let env = unconfigured()
            .execute_tool("jira_healthcheck", json!({}))
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["configured"], false);
        assert!(env["instructions"].as_str().unwrap().contains("JIRA_AUTH_TOKEN"));
    }

    // -- Sprint field parsing --

    #[test]
    fn sprint_name_extracted_from_tostring_blob() {
        let raw = "com.atlassian.greenhopper.service.sprint.Sprint@1a[id=42,rapidViewId=7,state=ACTIVE,name=Sprint 42,startDate=2024-01-01T00:00:00.000Z]";
        assert_eq!(sprint_name_from_field(raw), Some("Sprint 42".to_string()));
    }

    #[test]
    fn sprint_name_missing_yields_none() {
        assert_eq!(sprint_name_from_field("no sprint here"), None);
    }

    // -- Ticket flattening --

    #[test]
    fn flatten_ticket_applies_sentinels_and_defaults() {
        let data = json!({
            "key": "PRJ-1",
            "fields": {
                "project": {"id": "100", "key": "PRJ"},
                "issuetype": {"name": "Story"},
                "summary": "Do the thing",
                "status": {"name": "In Progress"},
                "priority": null,
                "assignee": null,
                "customfield_10121": null,
            }
        });
        let ticket = flatten_ticket(&data);
        assert_eq!(ticket["key"], "PRJ-1");
        assert_eq!(ticket["priority"], "Unknown");
        assert_eq!(ticket["assignee"], "Unassigned");
        assert_eq!(ticket["story_points"], 0.0);
        assert_eq!(ticket["sprint_name"], Value::Null);
        assert!(ticket.get("steps_to_reproduce").is_none());
    }

    #[test]
    fn flatten_ticket_adds_bug_fields_for_bugs() {
        let data = json!({
            "key": "PRJ-2",
            "fields": {
                "project": {"id": "100", "key": "PRJ"},
                "issuetype": {"name": "Bug"},
                "summary": "It broke",
                "status": {"name": "Open"},
                "customfield_25647": "1. click button",
                "customfield_11947": {"value": "High"},
                "customfield_14849": {"value": "QA"},
            }
        });
        let ticket = flatten_ticket(&data);
        assert_eq!(ticket["steps_to_reproduce"], "1. click button");
        assert_eq!(ticket["severity"], "High");
        assert_eq!(ticket["detected_in"], "QA");
    }

    #[test]
    fn flatten_ticket_extracts_sprint_and_fix_version() {
        let data = json!({
            "key": "PRJ-3",
            "fields": {
                "project": {"id": "100", "key": "PRJ"},
                "issuetype": {"name": "Task"},
                "summary": "s",
                "status": {"name": "Done"},
                "customfield_13543": ["[id=1,name=Sprint 9,state=CLOSED]"],
                "fixVersions": [{"name": "2024.1"}],
                "components": [{"name": "api"}, {"name": "web"}],
            }
        });
        let ticket = flatten_ticket(&data);
        assert_eq!(ticket["sprint_name"], "Sprint 9");
        assert_eq!(ticket["fix_version"], "2024.1");
        assert_eq!(ticket["components"], json!(["api", "web"]));
    }

    // -- Development summary parsing --

    #[test]
    fn dev_summary_structured_parse() {
        let embedded = r#"{\"cachedValue\":{\"summary\":{\"pullrequest\":{\"overall\":{\"count\":3,\"state\":\"OPEN\",\"lastUpdated\":\"2024-02-01T10:00:00.000+0000\",\"details\":{\"openCount\":1,\"mergedCount\":2,\"declinedCount\":0}}}}},\"isStale\":false}"#;
        let field = format!(r#"{{"devSummaryJson": "{embedded}", "other": 1}}"#);
        let parsed = parse_dev_summary_field(&field).unwrap();
        assert_eq!(parsed.count, 3);
        assert_eq!(parsed.state, "OPEN");
        assert_eq!(parsed.open_count, 1);
        assert_eq!(parsed.merged_count, 2);
        assert!(!parsed.regex_fallback);
        assert_eq!(
            parsed.last_updated.as_deref(),
            Some("2024-02-01T10:00:00.000+0000")
        );
    }

    #[test]
    fn dev_summary_falls_back_to_regex_salvage() {
        // Malformed JSON but the counters are still present as text.
        let field = r#"garbage "count": 2, "state": "MERGED", "openCount": 0, "mergedCount": 2, "declinedCount": 0 garbage"#;
        let parsed = parse_dev_summary_field(field).unwrap();
        assert!(parsed.regex_fallback);
        assert_eq!(parsed.count, 2);
        assert_eq!(parsed.state, "MERGED");
        assert_eq!(parsed.merged_count, 2);
    }

    #[test]
    fn pull_request_envelope_reports_counts_and_label() {
        let parsed = PullRequestSummary {
            count: 3,
            state: "OPEN".to_string(),
            open_count: 1,
            merged_count: 2,
            declined_count: 0,
            last_updated: Some("2024-02-01T10:00:00.000+0000".to_string()),
            regex_fallback: false,
        };
        let env = pull_request_envelope("PRJ-1", parsed);
        assert_eq!(env["status"], "success");
        assert_eq!(
            env["message"],
            "Pull request state for PRJ-1: 3 total (1 open, 2 merged, 0 declined)"
        );
        assert_eq!(env["pull_request_count"], 3);
        assert_eq!(env["pull_request_state"], "OPEN");
        assert_eq!(env["last_updated"], "2024-02-01T10:00:00.000+0000");
        assert!(env.get("parsing_method").is_none());
    }

    #[test]
    fn pull_request_envelope_tags_regex_salvage() {
        let parsed = PullRequestSummary {
            count: 2,
            state: "MERGED".to_string(),
            open_count: 0,
            merged_count: 2,
            declined_count: 0,
            last_updated: None,
            regex_fallback: true,
        };
        let env = pull_request_envelope("PRJ-2", parsed);
        assert_eq!(env["parsing_method"], "regex_fallback");
        assert_eq!(env["last_updated"], Value::Null);
    }

    #[test]
    fn dev_summary_unparseable_errors_with_sample() {
        let raw = "completely unrelated text ".repeat(20);
        let err = parse_dev_summary_field(&raw).unwrap_err();
        match err {
            AdapterError::Parse { sample, .. } => assert!(sample.len() <= 203),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    // -- Option id maps --

    #[test]
    fn option_maps_default_to_none_id() {
        assert_eq!(severity_option_id("Critical"), "12886");
        assert_eq!(severity_option_id(" HIGH "), "12887");
        assert_eq!(severity_option_id("nonsense"), "-1");
        assert_eq!(detected_in_option_id("prod"), "17476");
        assert_eq!(detected_in_option_id(""), "-1");
        assert_eq!(detected_by_option_id("Manual Testing"), "11962");
    }

    // -- Sprint date filtering --

    #[test]
    fn sprint_range_filter_bounds() {
        let sprint = json!({
            "startDate": "2024-01-10T00:00:00.000+0000",
            "endDate": "2024-01-24T00:00:00.000+0000",
        });
        assert!(sprint_in_range(&sprint, None, None));
        assert!(sprint_in_range(&sprint, Some("2024-01-01"), Some("2024-02-01")));
        assert!(!sprint_in_range(&sprint, Some("2024-02-01"), None));
        assert!(!sprint_in_range(&sprint, None, Some("2024-01-01")));
        assert!(!sprint_in_range(&json!({}), None, None));
    }
}
