//! Confluence documentation adapter.
//!
//! Search goes through CQL.  Page bodies come back as storage or view HTML,
//! so tools that return readable text also attach a `markdown_content`
//! rendering produced with html2text.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use worksuite_core::config::ConfluenceConfig;
use worksuite_core::http::urlencoding;
use worksuite_core::{AdapterError, Credential, HttpClient, Result, envelope, fields};

use crate::params;
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};

const DEFAULT_SEARCH_LIMIT: u64 = 25;
const DEFAULT_SPACES_LIMIT: u64 = 50;
const PAGES_PAGE_SIZE: u64 = 50;
const MARKDOWN_WIDTH: usize = 100;

/// Confluence Server/Data Center adapter.
pub struct ConfluenceAdapter {
    id: String,
    config: ConfluenceConfig,
    client: Option<HttpClient>,
}

impl ConfluenceAdapter {
    pub fn new(id: &str) -> Self {
        Self::with_config(id, ConfluenceConfig::from_env())
    }

    pub fn with_config(id: &str, config: ConfluenceConfig) -> Self {
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
            .ok_or_else(|| AdapterError::Config("CONFLUENCE_AUTH_TOKEN is not set".to_string()))?;
        Ok((client, base_url))
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    fn tool_healthcheck(&self) -> Value {
        match self.config.require() {
            Ok((base_url, _)) => envelope::success(
                "Confluence adapter is configured",
                vec![("configured", json!(true)), ("base_url", json!(base_url))],
            ),
            Err(e) => envelope::failure(
                &e,
                vec![
                    ("configured", json!(false)),
                    (
                        "instructions",
                        json!("Set CONFLUENCE_BASE_URL and CONFLUENCE_AUTH_TOKEN (bearer token, or user:password for basic auth)"),
                    ),
                ],
            ),
        }
    }

    async fn tool_search(&self, query: &str, space_key: Option<&str>, limit: u64) -> Value {
        match self.search(query, space_key, limit).await {
            Ok(results) => {
                let scope = space_key
                    .map(|key| format!(" in space {key}"))
                    .unwrap_or_default();
                envelope::success(
                    format!(
                        "Found {} pages matching '{query}'{scope}",
                        results.len()
                    ),
                    vec![("results", json!(results))],
                )
            }
            Err(e) => {
                warn!(query, error = %e, "Confluence search failed");
                envelope::failure(&e, vec![("results", json!([]))])
            }
        }
    }

    async fn search(&self, query: &str, space_key: Option<&str>, limit: u64) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let mut cql = format!("text ~ \"{}\"", query.replace('"', "\\\""));
        if let Some(key) = space_key {
            cql.push_str(&format!(" and space = \"{key}\""));
        }
        let url = format!(
            "{base_url}/rest/api/content/search?cql={}&limit={limit}&expand=version,space,body.view,metadata.labels",
            urlencoding::encode(&cql)
        );
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "results")
            .iter()
            .map(|page| self.map_search_result(base_url, page))
            .collect())
    }

    fn map_search_result(&self, base_url: &str, page: &Value) -> Value {
        let web_path = fields::str_or_empty(page, "_links.webui");
        json!({
            "id": fields::str_or_empty(page, "id"),
            "title": fields::str_or_unknown(page, "title"),
            "type": fields::str_or_empty(page, "type"),
            "space_key": fields::str_or_empty(page, "space.key"),
            "space_name": fields::str_or_empty(page, "space.name"),
            "url": format!("{base_url}{web_path}"),
            "created": fields::str_or_empty(page, "version.when"),
            "creator": fields::str_or_unknown(page, "version.by.displayName"),
            "excerpt": fields::str_or_empty(page, "excerpt"),
        })
    }

    async fn tool_get_spaces(&self, limit: u64) -> Value {
        match self.fetch_spaces(limit).await {
            Ok(spaces) => envelope::success(
                envelope::retrieved_message(spaces.len(), "spaces"),
                vec![("spaces", json!(spaces))],
            ),
            Err(e) => {
                warn!(error = %e, "failed to fetch Confluence spaces");
                envelope::failure(&e, vec![("spaces", json!([]))])
            }
        }
    }

    async fn fetch_spaces(&self, limit: u64) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!("{base_url}/rest/api/space?limit={limit}&expand=description.plain");
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "results")
            .iter()
            .map(|space| {
                json!({
                    "key": fields::str_or_empty(space, "key"),
                    "name": fields::str_or_unknown(space, "name"),
                    "type": fields::str_or_empty(space, "type"),
                    "description": fields::str_or_empty(space, "description.plain.value"),
                })
            })
            .collect())
    }

    async fn tool_get_page_by_title(&self, space_key: &str, title: &str) -> Value {
        match self.fetch_page_by_title(space_key, title).await {
            Ok(Some(page)) => envelope::success(
                format!("Successfully retrieved page '{title}' from space {space_key}"),
                vec![("page", page)],
            ),
            Ok(None) => envelope::success(
                format!("No page titled '{title}' found in space {space_key}"),
                vec![("page", Value::Null)],
            ),
            Err(e) => {
                warn!(space_key, title, error = %e, "failed to fetch page by title");
                envelope::failure(&e, vec![("page", Value::Null)])
            }
        }
    }

    async fn fetch_page_by_title(&self, space_key: &str, title: &str) -> Result<Option<Value>> {
        let (client, base_url) = self.connection()?;
        let url = format!(
            "{base_url}/rest/api/content?spaceKey={}&title={}&expand=version,space,body.storage",
            urlencoding::encode(space_key),
            urlencoding::encode(title)
        );
        let data = client.get_json(&url).await?;
        Ok(fields::array_or_empty(&data, "results")
            .first()
            .map(|page| self.map_page(base_url, page)))
    }

    fn map_page(&self, base_url: &str, page: &Value) -> Value {
        let web_path = fields::str_or_empty(page, "_links.webui");
        let html = fields::str_or_empty(page, "body.storage.value");
        json!({
            "id": fields::str_or_empty(page, "id"),
            "title": fields::str_or_unknown(page, "title"),
            "type": fields::str_or_empty(page, "type"),
            "space": fields::str_or_empty(page, "space.key"),
            "version": fields::i64_or_zero(page, "version.number"),
            "created": fields::str_or_empty(page, "version.when"),
            "creator": fields::str_or_unknown(page, "version.by.displayName"),
            "url": format!("{base_url}{web_path}"),
            "content": html,
            "markdown_content": render_markdown(html),
        })
    }

    async fn tool_get_pages(&self, params: &Value) -> Value {
        match self.fetch_pages(params).await {
            Ok(pages) => envelope::success(
                envelope::retrieved_message(pages.len(), "pages"),
                vec![("pages", json!(pages))],
            ),
            Err(e) => {
                warn!(error = %e, "failed to fetch pages");
                envelope::failure(&e, vec![("pages", json!([]))])
            }
        }
    }

    /// Fetches pages either by explicit id list or by walking a space.
    async fn fetch_pages(&self, params: &Value) -> Result<Vec<Value>> {
        let (client, base_url) = self.connection()?;
        if let Some(ids) = params.get("page_ids").and_then(Value::as_array) {
            let mut pages = Vec::with_capacity(ids.len());
            for id in ids.iter().filter_map(page_id_string) {
                let url = format!(
                    "{base_url}/rest/api/content/{id}?expand=version,space,body.storage"
                );
                let page = client.get_json(&url).await?;
                pages.push(self.map_page(base_url, &page));
            }
            return Ok(pages);
        }

        let space_key = params::require_str(params, "space_key", "confluence_get_pages")?;
        let mut pages = Vec::new();
        let mut start = 0;
        loop {
            let url = format!(
                "{base_url}/rest/api/content?spaceKey={}&type=page&start={start}&limit={PAGES_PAGE_SIZE}&expand=version,space,body.storage",
                urlencoding::encode(space_key)
            );
            let data = client.get_json(&url).await?;
            let batch = fields::array_or_empty(&data, "results");
            let batch_len = batch.len();
            pages.extend(batch.iter().map(|page| self.map_page(base_url, page)));
            if batch_len < PAGES_PAGE_SIZE as usize {
                break;
            }
            start += PAGES_PAGE_SIZE;
        }
        Ok(pages)
    }

    async fn tool_create_page(&self, params: &Value) -> Value {
        match self.create_page(params).await {
            Ok(page) => {
                info!(page_id = %page["id"], "created Confluence page");
                envelope::success("Successfully created page", vec![("page", page)])
            }
            Err(e) => {
                warn!(error = %e, "failed to create page");
                envelope::failure(&e, vec![("page", Value::Null)])
            }
        }
    }

    async fn create_page(&self, params: &Value) -> Result<Value> {
        let tool = "confluence_create_page";
        let (client, base_url) = self.connection()?;
        let space_key = params::require_str(params, "space_key", tool)?;
        let title = params::require_str(params, "title", tool)?;
        let content = params::require_str(params, "content", tool)?;

        let mut body = json!({
            "type": "page",
            "title": title,
            "space": {"key": space_key},
            "body": {
                "storage": {"value": content, "representation": "storage"}
            }
        });
        if let Some(parent_id) = params::opt_str(params, "parent_page_id")
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("ancestors".into(), json!([{"id": parent_id}]));
        }

        let url = format!("{base_url}/rest/api/content");
        let created = client.post_json(&url, &body).await?;
        let page_id = fields::str_or_empty(&created, "id").to_string();

        // Labels are best effort; a failure here does not undo the page.
        if let Some(labels) = params.get("labels").and_then(Value::as_array)
            && !labels.is_empty()
            && !page_id.is_empty()
        {
            let label_body: Vec<Value> = labels
                .iter()
                .filter_map(Value::as_str)
                .map(|name| json!({"prefix": "global", "name": name}))
                .collect();
            let label_url = format!("{base_url}/rest/api/content/{page_id}/label");
            if let Err(e) = client.post_json(&label_url, &json!(label_body)).await {
                warn!(page_id, error = %e, "page created but labels could not be added");
            }
        }

        Ok(self.map_page(base_url, &created))
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn build_tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "confluence_healthcheck".to_string(),
                description: "Check whether the Confluence adapter is configured".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: "confluence_search".to_string(),
                description: "Full-text search for pages, optionally scoped to a space".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "space_key": {"type": "string"},
                        "limit": {"type": "integer", "description": "Max results, default 25"}
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: "confluence_get_spaces".to_string(),
                description: "List available spaces".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "description": "Max results, default 50"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "confluence_get_page_by_title".to_string(),
                description: "Fetch a single page by exact title within a space".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "space_key": {"type": "string"},
                        "title": {"type": "string"}
                    },
                    "required": ["space_key", "title"]
                }),
            },
            ToolDefinition {
                name: "confluence_get_pages".to_string(),
                description: "Fetch pages by id list, or every page in a space".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "page_ids": {"type": "array", "items": {"type": "string"}},
                        "space_key": {"type": "string", "description": "Used when page_ids is absent"}
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "confluence_create_page".to_string(),
                description: "Create a page (storage format body) with optional parent and labels".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "space_key": {"type": "string"},
                        "title": {"type": "string"},
                        "content": {"type": "string", "description": "Body in Confluence storage format"},
                        "parent_page_id": {"type": "string"},
                        "labels": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["space_key", "title", "content"]
                }),
            },
        ]
    }
}

#[async_trait]
impl Adapter for ConfluenceAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Documentation
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Self::build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        match name {
            "confluence_healthcheck" => Ok(self.tool_healthcheck()),
            "confluence_search" => {
                let query = params::require_str(&params, "query", name)?;
                let space_key = params::opt_str(&params, "space_key");
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_SEARCH_LIMIT);
                Ok(self.tool_search(query, space_key, limit).await)
            }
            "confluence_get_spaces" => {
                let limit = params::opt_u64(&params, "limit").unwrap_or(DEFAULT_SPACES_LIMIT);
                Ok(self.tool_get_spaces(limit).await)
            }
            "confluence_get_page_by_title" => {
                let space_key = params::require_str(&params, "space_key", name)?;
                let title = params::require_str(&params, "title", name)?;
                Ok(self.tool_get_page_by_title(space_key, title).await)
            }
            "confluence_get_pages" => {
                if params.get("page_ids").and_then(Value::as_array).is_none()
                    && params::opt_str(&params, "space_key").is_none()
                {
                    return Err(AdapterError::InvalidParams {
                        tool_name: name.to_string(),
                        reason: "either `page_ids` or `space_key` is required".to_string(),
                    });
                }
                Ok(self.tool_get_pages(&params).await)
            }
            "confluence_create_page" => {
                for required in ["space_key", "title", "content"] {
                    params::require_str(&params, required, name)?;
                }
                Ok(self.tool_create_page(&params).await)
            }
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "confluence".to_string(),
            env_vars: vec![
                "CONFLUENCE_BASE_URL".to_string(),
                "CONFLUENCE_AUTH_TOKEN".to_string(),
            ],
        })
    }
}

fn render_markdown(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    html2text::from_read(html.as_bytes(), MARKDOWN_WIDTH).unwrap_or_default()
}

fn page_id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ConfluenceAdapter {
        ConfluenceAdapter::with_config(
            "confluence-test",
            ConfluenceConfig {
                base_url: Some("https://wiki.example.com".to_string()),
                auth_token: Some("token".to_string()),
            },
        )
    }

    #[test]
    fn tools_cover_the_full_surface() {
        let names: Vec<String> = adapter().tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "confluence_healthcheck",
            "confluence_search",
            "confluence_get_spaces",
            "confluence_get_page_by_title",
            "confluence_get_pages",
            "confluence_create_page",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn limit_descriptions_match_the_defaults() {
        let tools = adapter().tools();
        let description = |tool: &str| {
            tools
                .iter()
                .find(|t| t.name == tool)
                .map(|t| t.parameters["properties"]["limit"]["description"].clone())
                .unwrap()
        };
        assert!(
            description("confluence_search")
                .as_str()
                .unwrap()
                .contains(&DEFAULT_SEARCH_LIMIT.to_string())
        );
        assert!(
            description("confluence_get_spaces")
                .as_str()
                .unwrap()
                .contains(&DEFAULT_SPACES_LIMIT.to_string())
        );
    }

    #[test]
    fn search_result_mapping_reshapes_rows() {
        let a = adapter();
        let page = json!({
            "id": "12345",
            "title": "Release runbook",
            "type": "page",
            "space": {"key": "OPS", "name": "Operations"},
            "version": {"when": "2026-01-05T10:00:00.000Z", "by": {"displayName": "Ana"}},
            "_links": {"webui": "/display/OPS/Release+runbook"},
            "excerpt": "Deploy carefully"
        });
        let mapped = a.map_search_result("https://wiki.example.com", &page);
        assert_eq!(mapped["title"], "Release runbook");
        assert_eq!(mapped["type"], "page");
        assert_eq!(mapped["space_key"], "OPS");
        assert_eq!(mapped["space_name"], "Operations");
        assert_eq!(
            mapped["url"],
            "https://wiki.example.com/display/OPS/Release+runbook"
        );
        assert_eq!(mapped["created"], "2026-01-05T10:00:00.000Z");
        assert_eq!(mapped["creator"], "Ana");
        assert_eq!(mapped["excerpt"], "Deploy carefully");
    }

    #[test]
    fn page_mapping_keeps_raw_storage_content() {
        let a = adapter();
        let page = json!({
            "id": "9",
            "title": "Design notes",
            "space": {"key": "ENG"},
            "version": {"number": 4},
            "_links": {"webui": "/pages/9"},
            "body": {"storage": {"value": "<p>draft</p>"}}
        });
        let mapped = a.map_page("https://wiki.example.com", &page);
        assert_eq!(mapped["version"], 4);
        assert_eq!(mapped["content"], "<p>draft</p>");
        assert!(mapped["markdown_content"].as_str().unwrap().contains("draft"));
    }

    #[test]
    fn render_markdown_handles_empty_input() {
        assert_eq!(render_markdown(""), "");
    }

    #[test]
    fn page_id_string_accepts_numbers_and_strings() {
        assert_eq!(page_id_string(&json!("42")), Some("42".to_string()));
        assert_eq!(page_id_string(&json!(42)), Some("42".to_string()));
        assert_eq!(page_id_string(&json!("")), None);
        assert_eq!(page_id_string(&json!(null)), None);
    }

    #[tokio::test]
    async fn get_pages_requires_ids_or_space() {
        let err = adapter()
            .execute_tool("confluence_get_pages", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = adapter()
            .execute_tool("confluence_rename_space", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_config_error() {
        let a = ConfluenceAdapter::with_config(
            "confluence",
            ConfluenceConfig {
                base_url: None,
                auth_token: None,
            },
        );
        let env = a
            .execute_tool("confluence_get_spaces", json!({}))
            .await
            .unwrap();
        assert_eq!(env["status"], "error");
        assert_eq!(env["error_type"], "config_error");
        assert_eq!(env["spaces"], json!([]));
    }
}
