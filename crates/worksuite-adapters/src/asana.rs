//! Asana task management adapter.
//!
//! The Asana API wraps every response in a `data` envelope and carries
//! typed custom fields on tasks and portfolios.  Tools attach a
//! `formatted_custom_fields` map (name to display string) next to the raw
//! fields so callers do not have to decode the variants themselves.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use worksuite_core::config::AsanaConfig;
use worksuite_core::http::urlencoding;
use worksuite_core::{AdapterError, Credential, HttpClient, Result, envelope, fields};

use crate::params;
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};

const DEFAULT_PROJECTS_LIMIT: u64 = 20;
const DEFAULT_TASKS_LIMIT: u64 = 50;
const DEFAULT_SEARCH_LIMIT: u64 = 20;
const DEFAULT_PORTFOLIOS_LIMIT: u64 = 20;
const DEFAULT_PORTFOLIO_ITEMS_LIMIT: u64 = 50;

const TASK_OPT_FIELDS: &str = "name,created_at,modified_at,completed,completed_at,due_on,assignee,projects,notes,tags,parent,custom_fields,custom_fields.name,custom_fields.display_value,custom_fields.text_value,custom_fields.number_value,custom_fields.enum_value,custom_fields.enum_value.name";
const TASK_DETAIL_OPT_FIELDS: &str = "name,created_at,modified_at,completed,completed_at,due_on,assignee,projects,notes,tags,parent,subtasks,dependencies,dependents,followers,permalink_url,custom_fields,custom_fields.name,custom_fields.display_value,custom_fields.text_value,custom_fields.number_value,custom_fields.enum_value,custom_fields.enum_value.name,custom_fields.type";
const PROJECT_OPT_FIELDS: &str =
    "name,created_at,modified_at,owner,current_status,notes,color,public,archived";
const PROJECT_DETAIL_OPT_FIELDS: &str = "name,created_at,modified_at,owner,archived,color,notes,public,custom_fields,custom_fields.name,custom_fields.type,custom_fields.enum_options,custom_fields.enum_options.name";
const SEARCH_OPT_FIELDS: &str =
    "name,created_at,modified_at,completed,completed_at,due_on,assignee,projects,notes";
const PORTFOLIO_OPT_FIELDS: &str = "name,created_at,modified_at,owner,archived,color,public,due_on,start_on,current_status_update,permalink_url,privacy_setting,default_access_level";
const PORTFOLIO_DETAIL_OPT_FIELDS: &str = "name,created_at,modified_at,created_by,owner,archived,color,public,due_on,start_on,current_status_update,current_status_update.title,current_status_update.resource_subtype,permalink_url,privacy_setting,default_access_level,workspace,workspace.name,members,members.name,custom_fields,custom_fields.name,custom_fields.display_value,custom_fields.text_value,custom_fields.number_value,custom_fields.enum_value,custom_fields.enum_value.name,custom_fields.type,custom_field_settings,custom_field_settings.custom_field,custom_field_settings.custom_field.name";
const PORTFOLIO_ITEM_OPT_FIELDS: &str = "name,created_at,modified_at,owner,archived,color,public,current_status,current_status.title,current_status.color,due_on,start_on,permalink_url,workspace,workspace.name,team,team.name,custom_fields,custom_fields.name,custom_fields.display_value";

/// Asana cloud adapter.
pub struct AsanaAdapter {
    id: String,
    config: AsanaConfig,
    client: Option<HttpClient>,
}

impl AsanaAdapter {
    pub fn new(id: &str) -> Self {
        Self::with_config(id, AsanaConfig::from_env())
    }

    pub fn with_config(id: &str, config: AsanaConfig) -> Self {
        let client = config.auth_token.as_deref().map(|token| {
            let credential = Credential::Bearer(token.to_string());
            if config.disable_ssl_verify {
                HttpClient::new_insecure(credential)
            } else {
                HttpClient::new(credential)
            }
        });
        Self {
            id: id.to_string(),
            config,
            client,
        }
    }

    fn connection(&self) -> Result<(&HttpClient, &str)> {
        self.config.require_token()?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AdapterError::Config("ASANA_AUTH_TOKEN is not set".to_string()))?;
        Ok((client, self.config.base_url.trim_end_matches('/')))
    }

    /// GET helper that unwraps the Asana `data` envelope.
    async fn get_data(&self, path_and_query: &str) -> Result<Value> {
        let (client, base_url) = self.connection()?;
        let body = client.get_json(&format!("{base_url}{path_and_query}")).await?;
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    fn tool_healthcheck(&self) -> Value {
        match self.config.require_token() {
            Ok(_) => envelope::success(
                "Asana adapter is configured",
                vec![
                    ("configured", json!(true)),
                    ("base_url", json!(self.config.base_url)),
                    ("ssl_verify", json!(!self.config.disable_ssl_verify)),
                ],
            ),
            Err(e) => envelope::failure(
                &e,
                vec![
                    ("configured", json!(false)),
                    (
                        "instructions",
                        json!("Set ASANA_AUTH_TOKEN (personal access token). ASANA_BASE_URL and ASANA_DISABLE_SSL_VERIFY are optional."),
                    ),
                ],
            ),
        }
    }

    async fn tool_get_workspaces(&self) -> Value {
        match self.get_data("/workspaces").await {
            Ok(data) => {
                let workspaces = data.as_array().cloned().unwrap_or_default();
                envelope::success(
                    envelope::retrieved_message(workspaces.len(), "workspaces"),
                    vec![("workspaces", json!(workspaces))],
                )
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch Asana workspaces");
                envelope::failure(&e, vec![("workspaces", json!([]))])
            }
        }
    }

    async fn tool_get_projects(&self, workspace_gid: &str, limit: u64) -> Value {
        let query = format!(
            "/projects?workspace={}&limit={limit}&opt_fields={PROJECT_OPT_FIELDS}",
            urlencoding::encode(workspace_gid)
        );
        match self.get_data(&query).await {
            Ok(data) => {
                let projects = data.as_array().cloned().unwrap_or_default();
                envelope::success(
                    envelope::retrieved_message(projects.len(), "projects"),
                    vec![
                        ("projects", json!(projects)),
                        ("workspace_gid", json!(workspace_gid)),
                    ],
                )
            }
            Err(e) => {
                warn!(workspace_gid, error = %e, "failed to fetch Asana projects");
                envelope::failure(
                    &e,
                    vec![
                        ("projects", json!([])),
                        ("workspace_gid", json!(workspace_gid)),
                    ],
                )
            }
        }
    }

    async fn tool_get_project_details(&self, project_gid: &str) -> Value {
        let query = format!(
            "/projects/{}?opt_fields={PROJECT_DETAIL_OPT_FIELDS}",
            urlencoding::encode(project_gid)
        );
        match self.get_data(&query).await {
            Ok(project) => envelope::success(
                "Successfully retrieved project details",
                vec![("project", project)],
            ),
            Err(e) => {
                warn!(project_gid, error = %e, "failed to fetch project details");
                envelope::failure(&e, vec![("project", json!({}))])
            }
        }
    }

    async fn tool_get_tasks(
        &self,
        project_gid: Option<&str>,
        assignee: Option<&str>,
        limit: u64,
    ) -> Value {
        let mut query = format!("/tasks?limit={limit}&opt_fields={TASK_OPT_FIELDS}");
        if let Some(project) = project_gid {
            query.push_str(&format!("&project={}", urlencoding::encode(project)));
        }
        if let Some(assignee) = assignee {
            query.push_str(&format!("&assignee={}", urlencoding::encode(assignee)));
        }
        match self.get_data(&query).await {
            Ok(data) => {
                let mut tasks = data.as_array().cloned().unwrap_or_default();
                for task in &mut tasks {
                    attach_formatted_custom_fields(task);
                }
                envelope::success(
                    envelope::retrieved_message(tasks.len(), "tasks"),
                    vec![
                        ("tasks", json!(tasks)),
                        ("project_gid", json!(project_gid)),
                        ("assignee", json!(assignee)),
                    ],
                )
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch Asana tasks");
                envelope::failure(&e, vec![("tasks", json!([]))])
            }
        }
    }

    async fn tool_get_task_details(&self, task_gid: &str) -> Value {
        let query = format!(
            "/tasks/{}?opt_fields={TASK_DETAIL_OPT_FIELDS}",
            urlencoding::encode(task_gid)
        );
        match self.get_data(&query).await {
            Ok(mut task) => {
                attach_formatted_custom_fields(&mut task);
                envelope::success(
                    "Successfully retrieved task details",
                    vec![("task", task)],
                )
            }
            Err(e) => {
                warn!(task_gid, error = %e, "failed to fetch task details");
                envelope::failure(&e, vec![("task", json!({}))])
            }
        }
    }

    async fn tool_create_task(&self, params: &Value) -> Value {
        match self.create_task(params).await {
            Ok(task) => {
                info!(task_gid = %fields::str_or_empty(&task, "gid"), "created Asana task");
                envelope::success("Successfully created task", vec![("task", task)])
            }
            Err(e) => {
                warn!(error = %e, "failed to create Asana task");
                envelope::failure(&e, vec![("task", json!({}))])
            }
        }
    }

    async fn create_task(&self, params: &Value) -> Result<Value> {
        let tool = "asana_create_task";
        let (client, base_url) = self.connection()?;
        let name = params::require_str(params, "name", tool)?;

        let mut task_data = json!({"name": name});
        if let Some(obj) = task_data.as_object_mut() {
            if let Some(project) = params::opt_str(params, "project_gid") {
                obj.insert("projects".into(), json!([project]));
            }
            if let Some(assignee) = params::opt_str(params, "assignee") {
                obj.insert("assignee".into(), json!(assignee));
            }
            if let Some(notes) = params::opt_str(params, "notes") {
                obj.insert("notes".into(), json!(notes));
            }
            if let Some(due_on) = params::opt_str(params, "due_on") {
                obj.insert("due_on".into(), json!(due_on));
            }
        }

        let body = client
            .post_json(&format!("{base_url}/tasks"), &json!({"data": task_data}))
            .await?;
        Ok(body.get("data").cloned().unwrap_or(json!({})))
    }

    async fn update_task(&self, params: &Value) -> Result<Value> {
        let tool = "asana_update_task";
        let (client, base_url) = self.connection()?;
        let task_gid = params::require_str(params, "task_gid", tool)?;

        let mut task_data = serde_json::Map::new();
        if let Some(name) = params::opt_str(params, "name") {
            task_data.insert("name".into(), json!(name));
        }
        if let Some(notes) = params::opt_str(params, "notes") {
            task_data.insert("notes".into(), json!(notes));
        }
        if let Some(completed) = params::opt_bool(params, "completed") {
            task_data.insert("completed".into(), json!(completed));
        }
        if let Some(due_on) = params::opt_str(params, "due_on") {
            task_data.insert("due_on".into(), json!(due_on));
        }
        if let Some(assignee) = params::opt_str(params, "assignee") {
            task_data.insert("assignee".into(), json!(assignee));
        }
        if task_data.is_empty() {
            return Err(AdapterError::InvalidParams {
                tool_name: tool.to_string(),
                reason: "no updatable fields provided".to_string(),
            });
        }

        let url = format!("{base_url}/tasks/{}", urlencoding::encode(task_gid));
        let body = client
            .put_json(&url, &json!({"data": Value::Object(task_data)}))
            .await?;
        Ok(body.get("data").cloned().unwrap_or(json!({})))
    }

    async fn tool_search_tasks(&self, workspace_gid: &str, text: &str, limit: u64) -> Value {
        let query = format!(
            "/workspaces/{}/tasks/search?text={}&resource_type=task&limit={limit}&opt_fields={SEARCH_OPT_FIELDS}",
            urlencoding::encode(workspace_gid),
            urlencoding::encode(text)
        );
        match self.get_data(&query).await {
            Ok(data) => {
                let tasks = data.as_array().cloned().unwrap_or_default();
                envelope::success(
                    format!("Successfully found {} tasks", tasks.len()),
                    vec![
                        ("tasks", json!(tasks)),
                        ("search_text", json!(text)),
                        ("workspace_gid", json!(workspace_gid)),
                    ],
                )
            }
            Err(e) => {
                warn!(workspace_gid, text, error = %e, "Asana task search failed");
                envelope::failure(&e, vec![("tasks", json!([]))])
            }
        }
    }

    async fn tool_get_user_info(&self) -> Value {
        match self.get_data("/users/me").await {
            Ok(user) => envelope::success(
                "Successfully retrieved user information",
                vec![("user", user)],
            ),
            Err(e) => {
                warn!(error = %e, "failed to fetch Asana user info");
                envelope::failure(&e, vec![("user", json!({}))])
            }
        }
    }

    async fn tool_get_portfolios(&self, workspace_gid: &str, limit: u64) -> Value {
        let query = format!(
            "/portfolios?workspace={}&limit={limit}&opt_fields={PORTFOLIO_OPT_FIELDS}",
            urlencoding::encode(workspace_gid)
        );
        match self.get_data(&query).await {
            Ok(data) => {
                let portfolios = data.as_array().cloned().unwrap_or_default();
                envelope::success(
                    envelope::retrieved_message(portfolios.len(), "portfolios"),
                    vec![
                        ("portfolios", json!(portfolios)),
                        ("workspace_gid", json!(workspace_gid)),
                    ],
                )
            }
            Err(e) => {
                warn!(workspace_gid, error = %e, "failed to fetch Asana portfolios");
                envelope::failure(&e, vec![("portfolios", json!([]))])
            }
        }
    }

    async fn tool_get_portfolio_details(&self, portfolio_gid: &str) -> Value {
        let query = format!(
            "/portfolios/{}?opt_fields={PORTFOLIO_DETAIL_OPT_FIELDS}",
            urlencoding::encode(portfolio_gid)
        );
        match self.get_data(&query).await {
            Ok(mut portfolio) => {
                attach_formatted_custom_fields(&mut portfolio);
                envelope::success(
                    "Successfully retrieved portfolio details",
                    vec![("portfolio", portfolio)],
                )
            }
            Err(e) => {
                warn!(portfolio_gid, error = %e, "failed to fetch portfolio details");
                envelope::failure(&e, vec![("portfolio", json!({}))])
            }
        }
    }

    async fn tool_get_portfolio_items(&self, portfolio_gid: &str, limit: u64) -> Value {
        let query = format!(
            "/portfolios/{}/items?limit={limit}&opt_fields={PORTFOLIO_ITEM_OPT_FIELDS}",
            urlencoding::encode(portfolio_gid)
        );
        match self.get_data(&query).await {
            Ok(data) => {
                let items = data.as_array().cloned().unwrap_or_default();
                envelope::success(
                    format!("Successfully retrieved {} items from portfolio", items.len()),
                    vec![
                        ("items", json!(items)),
                        ("portfolio_gid", json!(portfolio_gid)),
                    ],
                )
            }
            Err(e) => {
                warn!(portfolio_gid, error = %e, "failed to fetch portfolio items");
                envelope::failure(&e, vec![("items", json!([]))])
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn build_tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "asana_healthcheck".to_string(),
                description: "Check whether the Asana adapter is configured".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "asana_get_workspaces".to_string(),
                description: "List workspaces accessible to the authenticated user".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "asana_get_projects".to_string(),
                description: "List projects in a workspace".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace_gid": {"type": "string"},
                        "limit": {"type": "integer", "description": "Max results, default 20"}
                    },
                    "required": ["workspace_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_get_project_details".to_string(),
                description: "Get a project including its custom field configuration".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"project_gid": {"type": "string"}},
                    "required": ["project_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_get_tasks".to_string(),
                description: "List tasks with optional project/assignee filters, including custom fields".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_gid": {"type": "string"},
                        "assignee": {"type": "string", "description": "User GID or 'me'"},
                        "limit": {"type": "integer", "description": "Max results, default 50"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "asana_get_task_details".to_string(),
                description: "Get one task with subtasks, dependencies, and custom fields".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"task_gid": {"type": "string"}},
                    "required": ["task_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_create_task".to_string(),
                description: "Create a task".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "project_gid": {"type": "string"},
                        "assignee": {"type": "string"},
                        "notes": {"type": "string"},
                        "due_on": {"type": "string", "description": "YYYY-MM-DD"}
                    },
                    "required": ["name"]
                }),
            },
            ToolDefinition {
                name: "asana_update_task".to_string(),
                description: "Update task fields (name, notes, completed, due_on, assignee)".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_gid": {"type": "string"},
                        "name": {"type": "string"},
                        "notes": {"type": "string"},
                        "completed": {"type": "boolean"},
                        "due_on": {"type": "string"},
                        "assignee": {"type": "string"}
                    },
                    "required": ["task_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_search_tasks".to_string(),
                description: "Full-text task search within a workspace".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace_gid": {"type": "string"},
                        "text": {"type": "string"},
                        "limit": {"type": "integer", "description": "Max results, default 20"}
                    },
                    "required": ["workspace_gid", "text"]
                }),
            },
            ToolDefinition {
                name: "asana_get_user_info".to_string(),
                description: "Get the authenticated user".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "asana_get_portfolios".to_string(),
                description: "List portfolios in a workspace".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "workspace_gid": {"type": "string"},
                        "limit": {"type": "integer", "description": "Max results, default 20"}
                    },
                    "required": ["workspace_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_get_portfolio_details".to_string(),
                description: "Get one portfolio with status, members, and custom fields".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"portfolio_gid": {"type": "string"}},
                    "required": ["portfolio_gid"]
                }),
            },
            ToolDefinition {
                name: "asana_get_portfolio_items".to_string(),
                description: "List the projects contained in a portfolio".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "portfolio_gid": {"type": "string"},
                        "limit": {"type": "integer", "description": "Max results, default 50"}
                    },
                    "required": ["portfolio_gid"]
                }),
            },
        ]
    }
}

#[async_trait]
impl Adapter for AsanaAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TaskManagement
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Self::build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        match name {
            "asana_healthcheck" => Ok(self.tool_healthcheck()),
            "asana_get_workspaces" => Ok(self.tool_get_workspaces().await),
            "asana_get_projects" => {
                let workspace_gid = params::require_str(&params, "workspace_gid", name)?;
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_PROJECTS_LIMIT);
                Ok(self.tool_get_projects(workspace_gid, limit).await)
            }
            "asana_get_project_details" => {
                let project_gid = params::require_str(&params, "project_gid", name)?;
                Ok(self.tool_get_project_details(project_gid).await)
            }
            "asana_get_tasks" => {
                let project_gid = params::opt_str(&params, "project_gid");
                let assignee = params::opt_str(&params, "assignee");
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_TASKS_LIMIT);
                Ok(self.tool_get_tasks(project_gid, assignee, limit).await)
            }
            "asana_get_task_details" => {
                let task_gid = params::require_str(&params, "task_gid", name)?;
                Ok(self.tool_get_task_details(task_gid).await)
            }
            "asana_create_task" => {
                params::require_str(&params, "name", name)?;
                Ok(self.tool_create_task(&params).await)
            }
            "asana_update_task" => self.tool_update_task(&params).await,
            "asana_search_tasks" => {
                let workspace_gid = params::require_str(&params, "workspace_gid", name)?;
                let text = params::require_str(&params, "text", name)?;
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_SEARCH_LIMIT);
                Ok(self.tool_search_tasks(workspace_gid, text, limit).await)
            }
            "asana_get_user_info" => Ok(self.tool_get_user_info().await),
            "asana_get_portfolios" => {
                let workspace_gid = params::require_str(&params, "workspace_gid", name)?;
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_PORTFOLIOS_LIMIT);
                Ok(self.tool_get_portfolios(workspace_gid, limit).await)
            }
            "asana_get_portfolio_details" => {
                let portfolio_gid = params::require_str(&params, "portfolio_gid", name)?;
                Ok(self.tool_get_portfolio_details(portfolio_gid).await)
            }
            "asana_get_portfolio_items" => {
                let portfolio_gid = params::require_str(&params, "portfolio_gid", name)?;
                let limit =
                    params::opt_u64(&params, "limit").unwrap_or(DEFAULT_PORTFOLIO_ITEMS_LIMIT);
                Ok(self.tool_get_portfolio_items(portfolio_gid, limit).await)
            }
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "asana".to_string(),
            env_vars: vec!["ASANA_AUTH_TOKEN".to_string()],
        })
    }
}

impl AsanaAdapter {
    /// Missing task_gid or an empty update are caller mistakes and surface
    /// as hard errors; upstream failures come back as error envelopes.
    async fn tool_update_task(&self, params: &Value) -> Result<Value> {
        match self.update_task(params).await {
            Ok(task) => {
                info!(task_gid = %fields::str_or_empty(&task, "gid"), "updated Asana task");
                Ok(envelope::success(
                    "Successfully updated task",
                    vec![("task", task)],
                ))
            }
            Err(e @ AdapterError::InvalidParams { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "failed to update Asana task");
                Ok(envelope::failure(&e, vec![("task", json!({}))]))
            }
        }
    }
}

/// Adds a `formatted_custom_fields` object (name to display string) next to
/// a record's raw `custom_fields` list.
fn attach_formatted_custom_fields(record: &mut Value) {
    let Some(custom_fields) = record.get("custom_fields").and_then(Value::as_array) else {
        return;
    };
    if custom_fields.is_empty() {
        return;
    }
    let formatted = fields::format_custom_fields(custom_fields);
    if let Some(obj) = record.as_object_mut() {
        obj.insert("formatted_custom_fields".into(), Value::Object(formatted));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AsanaAdapter {
        AsanaAdapter::with_config(
            "asana-test",
            AsanaConfig {
                base_url: AsanaConfig::DEFAULT_BASE_URL.to_string(),
                auth_token: Some("pat".to_string()),
                disable_ssl_verify: false,
            },
        )
    }

    #[test]
    fn tools_cover_the_full_surface() {
        let names: Vec<String> = adapter().tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "asana_healthcheck",
            "asana_get_workspaces",
            "asana_get_projects",
            "asana_get_project_details",
            "asana_get_tasks",
            "asana_get_task_details",
            "asana_create_task",
            "asana_update_task",
            "asana_search_tasks",
            "asana_get_user_info",
            "asana_get_portfolios",
            "asana_get_portfolio_details",
            "asana_get_portfolio_items",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn formatted_custom_fields_are_attached() {
        let mut task = json!({
            "gid": "1",
            "name": "Ship it",
            "custom_fields": [
                {"name": "IS Status", "display_value": "On Track"},
                {"name": "Effort", "number_value": 0},
                {"name": "Stage", "enum_value": {"name": "Build"}},
                {"name": "Missing", "display_value": null}
            ]
        });
        attach_formatted_custom_fields(&mut task);
        let formatted = &task["formatted_custom_fields"];
        assert_eq!(formatted["IS Status"], "On Track");
        assert_eq!(formatted["Effort"], "0");
        assert_eq!(formatted["Stage"], "Build");
        assert_eq!(formatted["Missing"], "No value set");
    }

    #[test]
    fn records_without_custom_fields_are_left_alone() {
        let mut task = json!({"gid": "1", "name": "Plain"});
        attach_formatted_custom_fields(&mut task);
        assert!(task.get("formatted_custom_fields").is_none());

        let mut empty = json!({"gid": "2", "custom_fields": []});
        attach_formatted_custom_fields(&mut empty);
        assert!(empty.get("formatted_custom_fields").is_none());
    }

    #[tokio::test]
    async fn update_task_with_no_fields_is_invalid_params() {
        let err = adapter()
            .execute_tool("asana_update_task", json!({"task_gid": "99"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = adapter()
            .execute_tool("asana_delete_workspace", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_config_error() {
        let a = AsanaAdapter::with_config(
            "asana",
            AsanaConfig {
                base_url: AsanaConfig::DEFAULT_BASE_URL.to_string(),
                auth_token: None,
                disable_ssl_verify: false,
            },
        );
        let env = a
            .execute_tool("asana_get_workspaces", json!({}))
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["error_type"], "config_error");
        assert_eq!(env["workspaces"], json!([]));
    }
}
