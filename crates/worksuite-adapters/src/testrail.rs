//! TestRail test management adapter.
//!
//! TestRail routes everything through `index.php?/api/v2/<op>`, which means
//! the first query separator is already spent; extra parameters are always
//! appended with `&`.  Authentication is HTTP Basic with the account email
//! and an API key.
//!
//! The big list endpoints (`get_projects`, `get_cases`) are paginated at the
//! API maximum of 250 records per page and support client-side substring
//! filtering after the full collection has been retrieved.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use worksuite_core::config::TestRailConfig;
use worksuite_core::http::urlencoding;
use worksuite_core::pagination::{self, FetchOutcome, Page};
use worksuite_core::{AdapterError, Credential, HttpClient, Result, envelope, fields};

use crate::params;
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};

/// API maximum page size for list endpoints.
const PAGE_LIMIT: usize = 250;

/// TestRail adapter.
pub struct TestRailAdapter {
    id: String,
    config: TestRailConfig,
    client: Option<HttpClient>,
}

impl TestRailAdapter {
    pub fn new(id: &str) -> Self {
        Self::with_config(id, TestRailConfig::from_env())
    }

    pub fn with_config(id: &str, config: TestRailConfig) -> Self {
        let client = match (config.username.as_deref(), config.api_key.as_deref()) {
            (Some(username), Some(api_key)) => Some(HttpClient::new(Credential::Basic {
                username: username.to_string(),
                password: api_key.to_string(),
            })),
            _ => None,
        };
        Self {
            id: id.to_string(),
            config,
            client,
        }
    }

    fn connection(&self) -> Result<(&HttpClient, &str)> {
        let (base_url, _, _) = self.config.require()?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AdapterError::Config("TestRail credentials are not set".to_string()))?;
        Ok((client, base_url))
    }

    fn api_url(&self, base_url: &str, uri: &str) -> String {
        format!("{base_url}/index.php?/api/v2/{uri}")
    }

    async fn api_get(&self, uri: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        client.get_json(&self.api_url(base_url, uri)).await
    }

    async fn api_post(&self, uri: &str, body: &Value) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        client.post_json(&self.api_url(base_url, uri), body).await
    }

    // -----------------------------------------------------------------------
    // Envelope helpers
    // -----------------------------------------------------------------------

    /// Wraps a single-record fetch or write in the standard envelope.
    fn entity_envelope(result: Result<Value>, key: &str, ok_message: &str) -> Value {
        match result {
            Ok(entity) => envelope::success(ok_message, vec![(key, entity)]),
            Err(e) => {
                warn!(key, error = %e, "TestRail request failed");
                envelope::failure(&e, vec![(key, Value::Null)])
            }
        }
    }

    /// Wraps a list fetch; the payload is always an array.
    fn list_envelope(result: Result<Value>, key: &str, noun: &str) -> Value {
        match result {
            Ok(data) => {
                // Some deployments wrap lists in `{<key>: [...]}`, others
                // return a bare array.
                let items = data
                    .get(key)
                    .and_then(Value::as_array)
                    .cloned()
                    .or_else(|| data.as_array().cloned())
                    .unwrap_or_default();
                envelope::success(
                    envelope::retrieved_message(items.len(), noun),
                    vec![(key, json!(items))],
                )
            }
            Err(e) => {
                warn!(key, error = %e, "TestRail request failed");
                envelope::failure(&e, vec![(key, json!([]))])
            }
        }
    }

    /// Builds the envelope for a paginated, client-filtered collection.
    fn collection_envelope(
        outcome: FetchOutcome,
        key: &str,
        noun: &str,
        search_term: &str,
        filter_fields: &[&str],
        all_label: &str,
    ) -> Value {
        let total_retrieved = outcome.total_retrieved();
        let pagination_used = outcome.pagination_used();
        let filtered = !search_term.is_empty();
        let items = pagination::filter_records(outcome.records, search_term, filter_fields);
        let total_found = items.len();
        envelope::success(
            envelope::retrieved_message(total_found, noun),
            vec![
                ("results", json!({"total": total_found, key: items})),
                (
                    "search_term",
                    json!(if filtered { search_term } else { all_label }),
                ),
                ("total_found", json!(total_found)),
                ("filtered", json!(filtered)),
                ("total_retrieved", json!(total_retrieved)),
                ("pagination_used", json!(pagination_used)),
            ],
        )
    }

    fn collection_failure(e: &AdapterError, key: &str) -> Value {
        warn!(key, error = %e, "TestRail pagination failed");
        envelope::failure(
            e,
            vec![
                ("results", json!({"total": 0, key: []})),
                ("search_term", json!("")),
                ("total_found", json!(0)),
                ("filtered", json!(false)),
                ("total_retrieved", json!(0)),
                ("pagination_used", json!(false)),
            ],
        )
    }

    /// Splits one page response: either `{<key>: [...], _links: {next}}` or
    /// a bare array (older deployments).
    fn parse_page(data: Value, key: &str) -> Page {
        if let Some(items) = data.get(key).and_then(Value::as_array) {
            let has_next_link = fields::path(&data, "_links.next")
                .map(|next| !next.is_null())
                .unwrap_or(false);
            return Page {
                records: items.clone(),
                has_next_link,
            };
        }
        let records = data.as_array().cloned().unwrap_or_default();
        let has_next_link = records.len() == PAGE_LIMIT;
        Page {
            records,
            has_next_link,
        }
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    fn tool_healthcheck(&self) -> Value {
        match self.config.require() {
            Ok((base_url, username, _)) => envelope::success(
                "TestRail adapter is configured",
                vec![
                    ("configured", json!(true)),
                    ("base_url", json!(base_url)),
                    ("username", json!(username)),
                ],
            ),
            Err(e) => envelope::failure(
                &e,
                vec![
                    ("configured", json!(false)),
                    (
                        "instructions",
                        json!("Set TESTRAIL_URL, TESTRAIL_USERNAME (account email), and TESTRAIL_API_KEY"),
                    ),
                ],
            ),
        }
    }

    async fn tool_get_projects(&self, search_term: &str) -> Value {
        let outcome = pagination::fetch_all(PAGE_LIMIT, |offset| async move {
            let data = self
                .api_get(&format!("get_projects&offset={offset}&limit={PAGE_LIMIT}"))
                .await?;
            Ok(Self::parse_page(data, "projects"))
        })
        .await;
        match outcome {
            Ok(outcome) => Self::collection_envelope(
                outcome,
                "projects",
                "projects",
                search_term,
                &["name"],
                "All projects",
            ),
            Err(e) => Self::collection_failure(&e, "projects"),
        }
    }

    async fn tool_get_cases(&self, params: &Value) -> Value {
        let tool = "testrail_get_cases";
        let project_id = match params::require_u64(params, "project_id", tool) {
            Ok(id) => id,
            Err(e) => return Self::collection_failure(&e, "cases"),
        };
        let search_term = params::opt_str(params, "search_term").unwrap_or("");
        let base_uri = Self::cases_uri(project_id, params);
        let base_uri = &base_uri;
        let outcome = pagination::fetch_all(PAGE_LIMIT, |offset| async move {
            let data = self
                .api_get(&format!("{base_uri}&offset={offset}&limit={PAGE_LIMIT}"))
                .await?;
            Ok(Self::parse_page(data, "cases"))
        })
        .await;
        match outcome {
            Ok(outcome) => Self::collection_envelope(
                outcome,
                "cases",
                "cases",
                search_term,
                &["title", "custom_description"],
                "All Cases",
            ),
            Err(e) => Self::collection_failure(&e, "cases"),
        }
    }

    /// Assembles the `get_cases` URI with the optional upstream filters.
    /// String filter values are percent-encoded.
    fn cases_uri(project_id: u64, params: &Value) -> String {
        let mut uri = format!("get_cases/{project_id}");
        if let Some(refs) = params::opt_str(params, "refs") {
            uri.push_str(&format!("&refs={}", urlencoding::encode(refs)));
        }
        if let Some(suite_id) = params::opt_u64(params, "suite_id") {
            uri.push_str(&format!("&suite_id={suite_id}"));
        }
        if let Some(label_ids) = params.get("label_ids").and_then(Value::as_array) {
            let ids: Vec<String> = label_ids
                .iter()
                .filter_map(Value::as_u64)
                .map(|id| id.to_string())
                .collect();
            if !ids.is_empty() {
                uri.push_str(&format!("&label_id={}", ids.join(",")));
            }
        }
        uri
    }

    /// Builds the `add_result` body from the status and the optional
    /// outcome fields.
    fn result_body(status_id: u64, params: &Value) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("status_id".into(), json!(status_id));
        for key in ["comment", "version", "elapsed", "defects"] {
            if let Some(value) = params::opt_str(params, key) {
                body.insert(key.into(), json!(value));
            }
        }
        if let Some(assignee) = params::opt_u64(params, "assignedto_id") {
            body.insert("assignedto_id".into(), json!(assignee));
        }
        Value::Object(body)
    }

    async fn tool_get_runs(&self, params: &Value) -> Value {
        let tool = "testrail_get_runs";
        let project_id = match params::require_u64(params, "project_id", tool) {
            Ok(id) => id,
            Err(e) => return envelope::failure(&e, vec![("runs", json!([]))]),
        };
        let mut uri = format!("get_runs/{project_id}");
        match params::opt_str(params, "status").map(str::to_lowercase).as_deref() {
            Some("active") => uri.push_str("&is_completed=0"),
            Some("completed") => uri.push_str("&is_completed=1"),
            _ => {}
        }
        if let Some(created_by) = params::opt_u64(params, "created_by") {
            uri.push_str(&format!("&created_by={created_by}"));
        }
        Self::list_envelope(self.api_get(&uri).await, "runs", "runs")
    }

    /// Pulls the caller-supplied write payload; write operations take the
    /// upstream field names verbatim under `data`.
    fn require_data(params: &Value, tool_name: &str) -> Result<Value> {
        match params.get("data") {
            Some(data @ Value::Object(_)) => Ok(data.clone()),
            _ => Err(AdapterError::InvalidParams {
                tool_name: tool_name.to_string(),
                reason: "`data` must be an object of TestRail fields".to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn build_tool_definitions() -> Vec<ToolDefinition> {
        let id_only = |field: &str| {
            json!({
                "type": "object",
                "properties": {field: {"type": "integer"}},
                "required": [field]
            })
        };
        let id_and_data = |field: &str| {
            json!({
                "type": "object",
                "properties": {
                    field: {"type": "integer"},
                    "data": {"type": "object", "description": "TestRail fields to write"}
                },
                "required": [field, "data"]
            })
        };
        vec![
            ToolDefinition {
                name: "testrail_healthcheck".to_string(),
                description: "Check whether the TestRail adapter is configured".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "testrail_get_current_user".to_string(),
                description: "Get the authenticated TestRail user".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "testrail_get_project".to_string(),
                description: "Get one project".to_string(),
                parameters: id_only("project_id"),
            },
            ToolDefinition {
                name: "testrail_get_projects".to_string(),
                description: "List all accessible projects, optionally filtered by name".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search_term": {"type": "string", "description": "Case-insensitive name filter"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "testrail_add_project".to_string(),
                description: "Create a project".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "data": {"type": "object", "description": "Project fields (name, announcement, suite_mode, ...)"}
                    },
                    "required": ["data"]
                }),
            },
            ToolDefinition {
                name: "testrail_update_project".to_string(),
                description: "Update a project".to_string(),
                parameters: id_and_data("project_id"),
            },
            ToolDefinition {
                name: "testrail_delete_project".to_string(),
                description: "Delete a project".to_string(),
                parameters: id_only("project_id"),
            },
            ToolDefinition {
                name: "testrail_get_case".to_string(),
                description: "Get one test case".to_string(),
                parameters: id_only("case_id"),
            },
            ToolDefinition {
                name: "testrail_get_cases".to_string(),
                description: "List all test cases in a project with optional refs/suite/label filters and a title/description search".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "integer"},
                        "refs": {"type": "string", "description": "Issue key reference filter, e.g. PRJ-123"},
                        "suite_id": {"type": "integer"},
                        "label_ids": {"type": "array", "items": {"type": "integer"}},
                        "search_term": {"type": "string"}
                    },
                    "required": ["project_id"]
                }),
            },
            ToolDefinition {
                name: "testrail_add_case".to_string(),
                description: "Create a test case in a section".to_string(),
                parameters: id_and_data("section_id"),
            },
            ToolDefinition {
                name: "testrail_update_case".to_string(),
                description: "Update a test case".to_string(),
                parameters: id_and_data("case_id"),
            },
            ToolDefinition {
                name: "testrail_delete_case".to_string(),
                description: "Delete a test case".to_string(),
                parameters: id_only("case_id"),
            },
            ToolDefinition {
                name: "testrail_get_labels".to_string(),
                description: "List the labels defined in a project".to_string(),
                parameters: id_only("project_id"),
            },
            ToolDefinition {
                name: "testrail_get_section".to_string(),
                description: "Get one section".to_string(),
                parameters: id_only("section_id"),
            },
            ToolDefinition {
                name: "testrail_get_sections".to_string(),
                description: "List sections in a project, optionally scoped to a suite".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "integer"},
                        "suite_id": {"type": "integer"}
                    },
                    "required": ["project_id"]
                }),
            },
            ToolDefinition {
                name: "testrail_add_section".to_string(),
                description: "Create a section in a project".to_string(),
                parameters: id_and_data("project_id"),
            },
            ToolDefinition {
                name: "testrail_update_section".to_string(),
                description: "Update a section".to_string(),
                parameters: id_and_data("section_id"),
            },
            ToolDefinition {
                name: "testrail_delete_section".to_string(),
                description: "Delete a section; soft delete only previews the effect".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "section_id": {"type": "integer"},
                        "soft": {"type": "boolean", "description": "Preview without deleting"}
                    },
                    "required": ["section_id"]
                }),
            },
            ToolDefinition {
                name: "testrail_move_section".to_string(),
                description: "Move a section under a new parent or after a sibling".to_string(),
                parameters: id_and_data("section_id"),
            },
            ToolDefinition {
                name: "testrail_get_run".to_string(),
                description: "Get one test run".to_string(),
                parameters: id_only("run_id"),
            },
            ToolDefinition {
                name: "testrail_get_runs".to_string(),
                description: "List test runs in a project, optionally by status or creator".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "integer"},
                        "status": {"type": "string", "enum": ["active", "completed"]},
                        "created_by": {"type": "integer"}
                    },
                    "required": ["project_id"]
                }),
            },
            ToolDefinition {
                name: "testrail_add_run".to_string(),
                description: "Create a test run in a project".to_string(),
                parameters: id_and_data("project_id"),
            },
            ToolDefinition {
                name: "testrail_update_run".to_string(),
                description: "Update a test run".to_string(),
                parameters: id_and_data("run_id"),
            },
            ToolDefinition {
                name: "testrail_close_run".to_string(),
                description: "Close a test run (archives results)".to_string(),
                parameters: id_only("run_id"),
            },
            ToolDefinition {
                name: "testrail_delete_run".to_string(),
                description: "Delete a test run".to_string(),
                parameters: id_only("run_id"),
            },
            ToolDefinition {
                name: "testrail_get_results".to_string(),
                description: "List results for one test".to_string(),
                parameters: id_only("test_id"),
            },
            ToolDefinition {
                name: "testrail_get_results_for_run".to_string(),
                description: "List results for every test in a run".to_string(),
                parameters: id_only("run_id"),
            },
            ToolDefinition {
                name: "testrail_add_result".to_string(),
                description: "Record a result for one test (status 1=Passed, 2=Blocked, 4=Retest, 5=Failed)".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "test_id": {"type": "integer"},
                        "status_id": {"type": "integer"},
                        "comment": {"type": "string"},
                        "version": {"type": "string"},
                        "elapsed": {"type": "string", "description": "e.g. \"30s\" or \"2m 45s\""},
                        "defects": {"type": "string"},
                        "assignedto_id": {"type": "integer"}
                    },
                    "required": ["test_id", "status_id"]
                }),
            },
            ToolDefinition {
                name: "testrail_add_results_for_cases".to_string(),
                description: "Record results for multiple cases in a run".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "run_id": {"type": "integer"},
                        "data": {"type": "object", "description": "Body with a `results` array of {case_id, status_id, comment, ...}"}
                    },
                    "required": ["run_id", "data"]
                }),
            },
            ToolDefinition {
                name: "testrail_get_datasets".to_string(),
                description: "List datasets in a project".to_string(),
                parameters: id_only("project_id"),
            },
            ToolDefinition {
                name: "testrail_get_dataset".to_string(),
                description: "Get one dataset".to_string(),
                parameters: id_only("dataset_id"),
            },
            ToolDefinition {
                name: "testrail_add_dataset".to_string(),
                description: "Create a dataset in a project".to_string(),
                parameters: id_and_data("project_id"),
            },
            ToolDefinition {
                name: "testrail_update_dataset".to_string(),
                description: "Update a dataset".to_string(),
                parameters: id_and_data("dataset_id"),
            },
            ToolDefinition {
                name: "testrail_delete_dataset".to_string(),
                description: "Delete a dataset".to_string(),
                parameters: id_only("dataset_id"),
            },
        ]
    }
}

#[async_trait]
impl Adapter for TestRailAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TestManagement
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Self::build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        match name {
            "testrail_healthcheck" => Ok(self.tool_healthcheck()),
            "testrail_get_current_user" => Ok(Self::entity_envelope(
                self.api_get("get_current_user").await,
                "user",
                "Successfully retrieved current user",
            )),
            "testrail_get_project" => {
                let id = params::require_u64(&params, "project_id", name)?;
                Ok(Self::entity_envelope(
                    self.api_get(&format!("get_project/{id}")).await,
                    "project",
                    "Successfully retrieved project",
                ))
            }
            "testrail_get_projects" => {
                let search_term = params::opt_str(&params, "search_term").unwrap_or("");
                Ok(self.tool_get_projects(search_term).await)
            }
            "testrail_add_project" => {
                let data = Self::require_data(&params, name)?;
                info!("creating TestRail project");
                Ok(Self::entity_envelope(
                    self.api_post("add_project", &data).await,
                    "project",
                    "Successfully created project",
                ))
            }
            "testrail_update_project" => {
                let id = params::require_u64(&params, "project_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("update_project/{id}"), &data).await,
                    "project",
                    "Successfully updated project",
                ))
            }
            "testrail_delete_project" => {
                let id = params::require_u64(&params, "project_id", name)?;
                info!(project_id = id, "deleting TestRail project");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("delete_project/{id}"), &json!({})).await,
                    "result",
                    "Successfully deleted project",
                ))
            }
            "testrail_get_case" => {
                let id = params::require_u64(&params, "case_id", name)?;
                Ok(Self::entity_envelope(
                    self.api_get(&format!("get_case/{id}")).await,
                    "case",
                    "Successfully retrieved test case",
                ))
            }
            "testrail_get_cases" => {
                params::require_u64(&params, "project_id", name)?;
                Ok(self.tool_get_cases(&params).await)
            }
            "testrail_add_case" => {
                let id = params::require_u64(&params, "section_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("add_case/{id}"), &data).await,
                    "case",
                    "Successfully created test case",
                ))
            }
            "testrail_update_case" => {
                let id = params::require_u64(&params, "case_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("update_case/{id}"), &data).await,
                    "case",
                    "Successfully updated test case",
                ))
            }
            "testrail_delete_case" => {
                let id = params::require_u64(&params, "case_id", name)?;
                info!(case_id = id, "deleting TestRail case");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("delete_case/{id}"), &json!({})).await,
                    "result",
                    "Successfully deleted test case",
                ))
            }
            "testrail_get_labels" => {
                let id = params::require_u64(&params, "project_id", name)?;
                Ok(Self::list_envelope(
                    self.api_get(&format!("get_labels/{id}")).await,
                    "labels",
                    "labels",
                ))
            }
            "testrail_get_section" => {
                let id = params::require_u64(&params, "section_id", name)?;
                Ok(Self::entity_envelope(
                    self.api_get(&format!("get_section/{id}")).await,
                    "section",
                    "Successfully retrieved section",
                ))
            }
            "testrail_get_sections" => {
                let id = params::require_u64(&params, "project_id", name)?;
                let mut uri = format!("get_sections/{id}");
                if let Some(suite_id) = params::opt_u64(&params, "suite_id") {
                    uri.push_str(&format!("&suite_id={suite_id}"));
                }
                Ok(Self::list_envelope(
                    self.api_get(&uri).await,
                    "sections",
                    "sections",
                ))
            }
            "testrail_add_section" => {
                let id = params::require_u64(&params, "project_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("add_section/{id}"), &data).await,
                    "section",
                    "Successfully created section",
                ))
            }
            "testrail_update_section" => {
                let id = params::require_u64(&params, "section_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("update_section/{id}"), &data).await,
                    "section",
                    "Successfully updated section",
                ))
            }
            "testrail_delete_section" => {
                let id = params::require_u64(&params, "section_id", name)?;
                let soft = params::opt_bool(&params, "soft").unwrap_or(false);
                let mut uri = format!("delete_section/{id}");
                if soft {
                    uri.push_str("&soft=1");
                }
                info!(section_id = id, soft, "deleting TestRail section");
                Ok(Self::entity_envelope(
                    self.api_post(&uri, &json!({})).await,
                    "result",
                    if soft {
                        "Soft delete preview for section"
                    } else {
                        "Successfully deleted section"
                    },
                ))
            }
            "testrail_move_section" => {
                let id = params::require_u64(&params, "section_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("move_section/{id}"), &data).await,
                    "section",
                    "Successfully moved section",
                ))
            }
            "testrail_get_run" => {
                let id = params::require_u64(&params, "run_id", name)?;
                Ok(Self::entity_envelope(
                    self.api_get(&format!("get_run/{id}")).await,
                    "run",
                    "Successfully retrieved test run",
                ))
            }
            "testrail_get_runs" => {
                params::require_u64(&params, "project_id", name)?;
                Ok(self.tool_get_runs(&params).await)
            }
            "testrail_add_run" => {
                let id = params::require_u64(&params, "project_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("add_run/{id}"), &data).await,
                    "run",
                    "Successfully created test run",
                ))
            }
            "testrail_update_run" => {
                let id = params::require_u64(&params, "run_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("update_run/{id}"), &data).await,
                    "run",
                    "Successfully updated test run",
                ))
            }
            "testrail_close_run" => {
                let id = params::require_u64(&params, "run_id", name)?;
                info!(run_id = id, "closing TestRail run");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("close_run/{id}"), &json!({})).await,
                    "run",
                    "Successfully closed test run",
                ))
            }
            "testrail_delete_run" => {
                let id = params::require_u64(&params, "run_id", name)?;
                info!(run_id = id, "deleting TestRail run");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("delete_run/{id}"), &json!({})).await,
                    "result",
                    "Successfully deleted test run",
                ))
            }
            "testrail_get_results" => {
                let id = params::require_u64(&params, "test_id", name)?;
                Ok(Self::list_envelope(
                    self.api_get(&format!("get_results/{id}")).await,
                    "results",
                    "results",
                ))
            }
            "testrail_get_results_for_run" => {
                let id = params::require_u64(&params, "run_id", name)?;
                Ok(Self::list_envelope(
                    self.api_get(&format!("get_results_for_run/{id}")).await,
                    "results",
                    "results",
                ))
            }
            "testrail_add_result" => {
                let test_id = params::require_u64(&params, "test_id", name)?;
                let status_id = params::require_u64(&params, "status_id", name)?;
                let body = Self::result_body(status_id, &params);
                info!(test_id, status_id, "recording TestRail result");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("add_result/{test_id}"), &body).await,
                    "result",
                    "Successfully added test result",
                ))
            }
            "testrail_add_results_for_cases" => {
                let id = params::require_u64(&params, "run_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::list_envelope(
                    self.api_post(&format!("add_results_for_cases/{id}"), &data).await,
                    "results",
                    "results",
                ))
            }
            "testrail_get_datasets" => {
                let id = params::require_u64(&params, "project_id", name)?;
                Ok(Self::list_envelope(
                    self.api_get(&format!("get_datasets/{id}")).await,
                    "datasets",
                    "datasets",
                ))
            }
            "testrail_get_dataset" => {
                let id = params::require_u64(&params, "dataset_id", name)?;
                Ok(Self::entity_envelope(
                    self.api_get(&format!("get_dataset/{id}")).await,
                    "dataset",
                    "Successfully retrieved dataset",
                ))
            }
            "testrail_add_dataset" => {
                let id = params::require_u64(&params, "project_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("add_dataset/{id}"), &data).await,
                    "dataset",
                    "Successfully created dataset",
                ))
            }
            "testrail_update_dataset" => {
                let id = params::require_u64(&params, "dataset_id", name)?;
                let data = Self::require_data(&params, name)?;
                Ok(Self::entity_envelope(
                    self.api_post(&format!("update_dataset/{id}"), &data).await,
                    "dataset",
                    "Successfully updated dataset",
                ))
            }
            "testrail_delete_dataset" => {
                let id = params::require_u64(&params, "dataset_id", name)?;
                info!(dataset_id = id, "deleting TestRail dataset");
                Ok(Self::entity_envelope(
                    self.api_post(&format!("delete_dataset/{id}"), &json!({})).await,
                    "result",
                    "Successfully deleted dataset",
                ))
            }
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "testrail".to_string(),
            env_vars: vec![
                "TESTRAIL_URL".to_string(),
                "TESTRAIL_USERNAME".to_string(),
                "TESTRAIL_API_KEY".to_string(),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TestRailAdapter {
        TestRailAdapter::with_config(
            "testrail-test",
            TestRailConfig {
                base_url: Some("https://qa.example.com".to_string()),
                username: Some("qa@example.com".to_string()),
                api_key: Some("key".to_string()),
            },
        )
    }

    #[test]
    fn api_url_uses_ampersand_separators() {
        let a = adapter();
        assert_eq!(
            a.api_url("https://qa.example.com", "get_cases/7&suite_id=2&offset=0&limit=250"),
            "https://qa.example.com/index.php?/api/v2/get_cases/7&suite_id=2&offset=0&limit=250"
        );
    }

    #[test]
    fn cases_uri_encodes_string_filters() {
        let uri = TestRailAdapter::cases_uri(
            7,
            &json!({"refs": "PRJ-1,PRJ 2", "suite_id": 3, "label_ids": [4, 5]}),
        );
        assert_eq!(uri, "get_cases/7&refs=PRJ-1%2CPRJ%202&suite_id=3&label_id=4,5");

        let bare = TestRailAdapter::cases_uri(7, &json!({}));
        assert_eq!(bare, "get_cases/7");
    }

    #[test]
    fn result_body_keeps_only_supplied_outcome_fields() {
        let body = TestRailAdapter::result_body(
            5,
            &json!({"comment": "timed out", "elapsed": "1m 30s", "assignedto_id": 9, "version": ""}),
        );
        assert_eq!(
            body,
            json!({"status_id": 5, "comment": "timed out", "elapsed": "1m 30s", "assignedto_id": 9})
        );

        let minimal = TestRailAdapter::result_body(1, &json!({}));
        assert_eq!(minimal, json!({"status_id": 1}));
    }

    #[tokio::test]
    async fn add_result_requires_test_and_status_ids() {
        let err = adapter()
            .execute_tool("testrail_add_result", json!({"test_id": 12}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[test]
    fn parse_page_handles_wrapped_and_bare_lists() {
        let wrapped = json!({
            "projects": [{"id": 1}, {"id": 2}],
            "_links": {"next": "/api/v2/get_projects&offset=250"}
        });
        let page = TestRailAdapter::parse_page(wrapped, "projects");
        assert_eq!(page.records.len(), 2);
        assert!(page.has_next_link);

        let last = json!({"projects": [{"id": 3}], "_links": {"next": null}});
        let page = TestRailAdapter::parse_page(last, "projects");
        assert_eq!(page.records.len(), 1);
        assert!(!page.has_next_link);

        let bare = json!([{"id": 4}]);
        let page = TestRailAdapter::parse_page(bare, "projects");
        assert_eq!(page.records.len(), 1);
        assert!(!page.has_next_link);
    }

    #[test]
    fn bare_full_page_assumes_more() {
        let full: Vec<Value> = (0..PAGE_LIMIT).map(|i| json!({"id": i})).collect();
        let page = TestRailAdapter::parse_page(json!(full), "cases");
        assert_eq!(page.records.len(), PAGE_LIMIT);
        assert!(page.has_next_link);
    }

    #[test]
    fn collection_envelope_reports_filter_counts() {
        let outcome = FetchOutcome {
            records: vec![
                json!({"name": "Payments API"}),
                json!({"name": "Mobile App"}),
                json!({"name": "payments-batch"}),
            ],
            pages_fetched: 2,
        };
        let env = TestRailAdapter::collection_envelope(
            outcome,
            "projects",
            "projects",
            "payments",
            &["name"],
            "All projects",
        );
        assert_eq!(env["status"], "success");
        assert_eq!(env["total_retrieved"], 3);
        assert_eq!(env["total_found"], 2);
        assert_eq!(env["filtered"], true);
        assert_eq!(env["pagination_used"], true);
        assert_eq!(env["search_term"], "payments");
        assert_eq!(env["results"]["total"], 2);
    }

    #[test]
    fn collection_envelope_without_term_reports_all() {
        let outcome = FetchOutcome {
            records: vec![json!({"name": "Solo"})],
            pages_fetched: 1,
        };
        let env = TestRailAdapter::collection_envelope(
            outcome,
            "projects",
            "projects",
            "",
            &["name"],
            "All projects",
        );
        assert_eq!(env["filtered"], false);
        assert_eq!(env["search_term"], "All projects");
        assert_eq!(env["pagination_used"], false);
    }

    #[test]
    fn tools_cover_the_full_surface() {
        let names: Vec<String> = adapter().tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "testrail_healthcheck",
            "testrail_get_current_user",
            "testrail_get_project",
            "testrail_get_projects",
            "testrail_add_project",
            "testrail_update_project",
            "testrail_delete_project",
            "testrail_get_case",
            "testrail_get_cases",
            "testrail_add_case",
            "testrail_update_case",
            "testrail_delete_case",
            "testrail_get_labels",
            "testrail_get_section",
            "testrail_get_sections",
            "testrail_add_section",
            "testrail_update_section",
            "testrail_delete_section",
            "testrail_move_section",
            "testrail_get_run",
            "testrail_get_runs",
            "testrail_add_run",
            "testrail_update_run",
            "testrail_close_run",
            "testrail_delete_run",
            "testrail_get_results",
            "testrail_get_results_for_run",
            "testrail_add_result",
            "testrail_add_results_for_cases",
            "testrail_get_datasets",
            "testrail_get_dataset",
            "testrail_add_dataset",
            "testrail_update_dataset",
            "testrail_delete_dataset",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn write_ops_require_a_data_object() {
        let err = adapter()
            .execute_tool("testrail_add_case", json!({"section_id": 5, "data": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn missing_numeric_id_is_invalid_params() {
        let err = adapter()
            .execute_tool("testrail_get_case", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = adapter()
            .execute_tool("testrail_export_everything", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_config_error() {
        let a = TestRailAdapter::with_config(
            "testrail",
            TestRailConfig {
                base_url: None,
                username: None,
                api_key: None,
            },
        );
        let env = a
            .execute_tool("testrail_get_current_user", json!({}))
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["error_type"], "config_error");
        assert!(env["message"].as_str().unwrap().contains("TESTRAIL_URL"));
    }
}
