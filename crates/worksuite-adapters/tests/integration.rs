//! Integration tests for the worksuite-adapters crate.
//!
//! These tests exercise the adapter trait surface across all five services:
//! tool discovery, dispatch, parameter validation, and the configuration
//! error path.  Nothing here talks to a real upstream.

use serde_json::{Value, json};

use worksuite_adapters::{
    Adapter, AdapterError, AdapterType, AsanaAdapter, BitbucketAdapter, ConfluenceAdapter,
    JiraAdapter, TestRailAdapter,
};
use worksuite_core::config::{
    AsanaConfig, BitbucketConfig, ConfluenceConfig, JiraConfig, TestRailConfig,
};

fn all_adapters() -> Vec<Box<dyn Adapter>> {
    vec![
        Box::new(JiraAdapter::with_config(
            "jira",
            JiraConfig {
                base_url: None,
                auth_token: None,
            },
        )),
        Box::new(BitbucketAdapter::with_config(
            "bitbucket",
            BitbucketConfig {
                base_url: None,
                auth_token: None,
            },
        )),
        Box::new(ConfluenceAdapter::with_config(
            "confluence",
            ConfluenceConfig {
                base_url: None,
                auth_token: None,
            },
        )),
        Box::new(AsanaAdapter::with_config(
            "asana",
            AsanaConfig {
                base_url: AsanaConfig::DEFAULT_BASE_URL.to_string(),
                auth_token: None,
                disable_ssl_verify: false,
            },
        )),
        Box::new(TestRailAdapter::with_config(
            "testrail",
            TestRailConfig {
                base_url: None,
                username: None,
                api_key: None,
            },
        )),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
//  Tool discovery
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn every_adapter_exposes_namespaced_tools() {
    for adapter in all_adapters() {
        let tools = adapter.tools();
        assert!(!tools.is_empty(), "{} has no tools", adapter.id());
        let prefix = format!("{}_", adapter.id());
        for tool in &tools {
            assert!(
                tool.name.starts_with(&prefix),
                "tool {} is not namespaced under {}",
                tool.name,
                adapter.id()
            );
            assert!(!tool.description.is_empty(), "{} lacks a description", tool.name);
            assert_eq!(tool.parameters["type"], "object", "{} schema", tool.name);
            assert!(tool.parameters.get("properties").is_some());
            assert!(tool.parameters.get("required").is_some());
        }
    }
}

#[test]
fn tool_names_are_unique_across_adapters() {
    let mut seen = std::collections::HashSet::new();
    for adapter in all_adapters() {
        for tool in adapter.tools() {
            assert!(seen.insert(tool.name.clone()), "duplicate tool {}", tool.name);
        }
    }
}

#[test]
fn adapter_types_cover_each_service_category() {
    let types: Vec<AdapterType> = all_adapters().iter().map(|a| a.adapter_type()).collect();
    assert_eq!(
        types,
        vec![
            AdapterType::IssueTracking,
            AdapterType::CodeReview,
            AdapterType::Documentation,
            AdapterType::TaskManagement,
            AdapterType::TestManagement,
        ]
    );
}

#[test]
fn every_adapter_declares_auth_requirements() {
    for adapter in all_adapters() {
        let auth = adapter
            .required_auth()
            .unwrap_or_else(|| panic!("{} has no auth requirement", adapter.id()));
        assert_eq!(auth.provider, adapter.id());
        assert!(!auth.env_vars.is_empty());
        for var in &auth.env_vars {
            assert_eq!(*var, var.to_uppercase(), "{var} should be an env var name");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Dispatch and validation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_tools_are_hard_errors_everywhere() {
    for adapter in all_adapters() {
        let err = adapter
            .execute_tool("definitely_not_a_tool", json!({}))
            .await
            .unwrap_err();
        match err {
            AdapterError::ToolNotFound { adapter_id, tool_name } => {
                assert_eq!(adapter_id, adapter.id());
                assert_eq!(tool_name, "definitely_not_a_tool");
            }
            other => panic!("{}: expected ToolNotFound, got {other}", adapter.id()),
        }
    }
}

#[tokio::test]
async fn missing_required_params_are_hard_errors() {
    let cases: Vec<(Box<dyn Adapter>, &str)> = vec![
        (
            Box::new(JiraAdapter::with_config(
                "jira",
                JiraConfig {
                    base_url: Some("https://jira.example.com".into()),
                    auth_token: Some("t".into()),
                },
            )),
            "jira_get_ticket_details",
        ),
        (
            Box::new(BitbucketAdapter::with_config(
                "bitbucket",
                BitbucketConfig {
                    base_url: Some("https://stash.example.com".into()),
                    auth_token: Some("t".into()),
                },
            )),
            "bitbucket_get_pr_details",
        ),
        (
            Box::new(ConfluenceAdapter::with_config(
                "confluence",
                ConfluenceConfig {
                    base_url: Some("https://wiki.example.com".into()),
                    auth_token: Some("t".into()),
                },
            )),
            "confluence_search",
        ),
        (
            Box::new(AsanaAdapter::with_config(
                "asana",
                AsanaConfig {
                    base_url: AsanaConfig::DEFAULT_BASE_URL.to_string(),
                    auth_token: Some("t".into()),
                    disable_ssl_verify: false,
                },
            )),
            "asana_get_task_details",
        ),
        (
            Box::new(TestRailAdapter::with_config(
                "testrail",
                TestRailConfig {
                    base_url: Some("https://qa.example.com".into()),
                    username: Some("u".into()),
                    api_key: Some("k".into()),
                },
            )),
            "testrail_get_case",
        ),
    ];
    for (adapter, tool) in cases {
        let err = adapter.execute_tool(tool, json!({})).await.unwrap_err();
        assert!(
            matches!(err, AdapterError::InvalidParams { .. }),
            "{tool}: expected InvalidParams, got {err}"
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration error envelopes
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unconfigured_adapters_return_error_envelopes_not_panics() {
    let calls: Vec<(&str, &str, Value)> = vec![
        ("jira", "jira_get_projects", json!({})),
        (
            "bitbucket",
            "bitbucket_get_repository_info",
            json!({"workspace": "A", "repo_slug": "b"}),
        ),
        ("confluence", "confluence_get_spaces", json!({})),
        ("asana", "asana_get_workspaces", json!({})),
        ("testrail", "testrail_get_current_user", json!({})),
    ];
    for adapter in all_adapters() {
        for (id, tool, params) in &calls {
            if adapter.id() != *id {
                continue;
            }
            let env = adapter.execute_tool(tool, params.clone()).await.unwrap();
            assert_eq!(env["status"], "error", "{tool}");
            assert_eq!(env["error_type"], "config_error", "{tool}");
            assert!(
                !env["message"].as_str().unwrap().is_empty(),
                "{tool} has an empty message"
            );
        }
    }
}

#[tokio::test]
async fn healthchecks_never_touch_the_network() {
    // With no configuration at all, healthchecks still answer and carry
    // remediation instructions.
    for adapter in all_adapters() {
        let tool = format!("{}_healthcheck", adapter.id());
        let env = adapter.execute_tool(&tool, json!({})).await.unwrap();
        assert_eq!(env["status"], "error", "{tool}");
        assert_eq!(env["configured"], false, "{tool}");
        assert!(
            env["instructions"].as_str().unwrap().contains("Set "),
            "{tool} lacks instructions"
        );
    }
}

#[tokio::test]
async fn configured_healthchecks_report_success() {
    let adapter = ConfluenceAdapter::with_config(
        "confluence",
        ConfluenceConfig {
            base_url: Some("https://wiki.example.com".into()),
            auth_token: Some("t".into()),
        },
    );
    let env = adapter
        .execute_tool("confluence_healthcheck", json!({}))
        .await
        .unwrap();
    assert_eq!(env["status"], "success");
    assert_eq!(env["configured"], true);
    assert_eq!(env["base_url"], "https://wiki.example.com");
}
