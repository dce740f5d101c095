//! Sprint report generation.
//!
//! Pure functions over already-fetched sprint issue lists, so the bucketing
//! and health heuristics are testable without a live board.  The output key
//! names are consumed downstream and must stay stable.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use worksuite_core::fields;

/// Story points field on this Jira instance.
pub const STORY_POINTS_FIELD: &str = "fields.customfield_10121";

const DONE_STATUSES: &[&str] = &["done", "closed", "resolved"];
const IN_PROGRESS_STATUSES: &[&str] = &["in progress", "development", "in development"];
const IN_REVIEW_STATUSES: &[&str] = &["in review", "code review", "peer review"];
const IN_QA_STATUSES: &[&str] = &["in qa", "testing", "qa", "in test"];

const HIGH_PRIORITIES: &[&str] = &["highest", "critical", "high", "1-highest", "2-high"];

const FRONTEND_KEYWORDS: &[&str] = &["frontend", "fe", "ui", "react", "angular", "vue"];
const BACKEND_KEYWORDS: &[&str] = &["backend", "be", "api", "service", "database", "server"];
const TESTING_KEYWORDS: &[&str] = &["test", "qa", "automation", "regression"];
const DEVOPS_KEYWORDS: &[&str] = &["devops", "deploy", "infra", "pipeline", "ci/cd"];

/// Workflow bucket an issue status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBucket {
    Done,
    InProgress,
    InReview,
    InQa,
    ToDo,
}

impl StatusBucket {
    pub fn classify(status: &str) -> Self {
        let status = status.to_lowercase();
        if DONE_STATUSES.contains(&status.as_str()) {
            StatusBucket::Done
        } else if IN_PROGRESS_STATUSES.contains(&status.as_str()) {
            StatusBucket::InProgress
        } else if IN_REVIEW_STATUSES.contains(&status.as_str()) {
            StatusBucket::InReview
        } else if IN_QA_STATUSES.contains(&status.as_str()) {
            StatusBucket::InQa
        } else {
            StatusBucket::ToDo
        }
    }
}

/// Whether a priority name counts as high priority.
pub fn is_high_priority(priority: &str) -> bool {
    HIGH_PRIORITIES.contains(&priority.to_lowercase().as_str())
}

/// Tech area guessed from summary keywords.
pub fn tech_category(summary: &str) -> &'static str {
    let summary = summary.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| summary.contains(k));
    if matches(FRONTEND_KEYWORDS) {
        "Frontend"
    } else if matches(BACKEND_KEYWORDS) {
        "Backend"
    } else if matches(TESTING_KEYWORDS) {
        "Testing/QA"
    } else if matches(DEVOPS_KEYWORDS) {
        "DevOps/Infrastructure"
    } else {
        "Other"
    }
}

/// Age bucket label for a ticket created `age_days` ago.
pub fn age_bucket(age_days: i64) -> &'static str {
    if age_days > 30 {
        "30+ days"
    } else if age_days > 14 {
        "15-30 days"
    } else if age_days > 7 {
        "8-14 days"
    } else {
        "0-7 days"
    }
}

/// Parses the datetime format Jira emits (`2024-01-15T10:30:00.000+0000`),
/// falling back to RFC 3339.
pub fn parse_jira_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 { round1(part / total * 100.0) } else { 0.0 }
}

/// Builds the per-sprint report from the sprint descriptor and its issues.
///
/// `now` is injected so ticket aging is deterministic under test.
pub fn build_sprint_report(sprint: &Value, issues: &[Value], now: DateTime<Utc>) -> Value {
    let sprint_name = fields::str_or_unknown(sprint, "name");

    let mut points_done = 0.0;
    let mut points_in_progress = 0.0;
    let mut points_in_review = 0.0;
    let mut points_in_qa = 0.0;
    let mut points_to_do = 0.0;

    let mut high_priority: Vec<Value> = Vec::new();
    let mut bugs: Vec<&Value> = Vec::new();
    let mut stories = 0usize;
    let mut tasks = 0usize;

    let mut tech_categories: Map<String, Value> = Map::new();
    let mut aging: Map<String, Value> = Map::new();
    let mut unassigned_open = 0usize;
    let mut done_high_value_stories = 0usize;

    for issue in issues {
        let status = fields::str_or_empty(issue, "fields.status.name");
        let bucket = StatusBucket::classify(status);
        let issue_type = fields::str_or_empty(issue, "fields.issuetype.name").to_lowercase();
        let priority = fields::str_or_unknown(issue, "fields.priority.name");
        let assignee = fields::str_or_unassigned(issue, "fields.assignee.displayName");
        let summary = fields::str_or_empty(issue, "fields.summary");

        // Zero-point tickets are excluded from the point totals.
        let story_points = fields::f64_or_zero(issue, STORY_POINTS_FIELD);
        match bucket {
            StatusBucket::Done => points_done += story_points,
            StatusBucket::InProgress => points_in_progress += story_points,
            StatusBucket::InReview => points_in_review += story_points,
            StatusBucket::InQa => points_in_qa += story_points,
            StatusBucket::ToDo => points_to_do += story_points,
        }

        if is_high_priority(priority) {
            high_priority.push(json!({
                "key": issue.get("key").cloned().unwrap_or(Value::Null),
                "summary": summary,
                "priority": priority,
                "status": status,
                "assignee": assignee,
                "story_points": story_points,
                "done": bucket == StatusBucket::Done,
            }));
        }

        if issue_type.contains("bug") || issue_type.contains("defect") {
            bugs.push(issue);
        } else if issue_type.contains("story") {
            stories += 1;
            if bucket == StatusBucket::Done && story_points >= 5.0 {
                done_high_value_stories += 1;
            }
        } else if issue_type.contains("task") {
            tasks += 1;
        }

        let category = tech_category(summary);
        let count = tech_categories
            .get(category)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        tech_categories.insert(category.to_string(), json!(count + 1));

        if let Some(created) = fields::path(issue, "fields.created")
            .and_then(Value::as_str)
            .and_then(parse_jira_datetime)
        {
            let bucket_label = age_bucket((now - created).num_days());
            let status_key = if bucket == StatusBucket::Done {
                "Done"
            } else {
                "In Progress/Open"
            };
            let group = aging
                .entry(status_key.to_string())
                .or_insert_with(|| json!({}));
            if let Some(group) = group.as_object_mut() {
                let count = group.get(bucket_label).and_then(Value::as_u64).unwrap_or(0);
                group.insert(bucket_label.to_string(), json!(count + 1));
            }
        }

        if bucket != StatusBucket::Done && fields::path(issue, "fields.assignee").is_none() {
            unassigned_open += 1;
        }
    }

    let total_tickets = issues.len();
    let total_points =
        points_done + points_in_progress + points_in_review + points_in_qa + points_to_do;
    let completion_rate = percentage(points_done, total_points);
    let wip_rate = percentage(points_in_progress + points_in_review, total_points);
    let bug_rate = percentage(bugs.len() as f64, total_tickets as f64);

    let incomplete_high_priority: Vec<Value> = high_priority
        .iter()
        .filter(|hp| hp.get("done") != Some(&json!(true)))
        .map(|hp| {
            let mut item = hp.clone();
            if let Some(obj) = item.as_object_mut() {
                obj.remove("done");
            }
            item
        })
        .collect();
    let high_priority_incomplete_count = incomplete_high_priority.len();

    let production_bugs: Vec<Value> = bugs
        .iter()
        .filter(|bug| is_high_priority(fields::str_or_empty(bug, "fields.priority.name")))
        .map(|bug| {
            json!({
                "key": bug.get("key").cloned().unwrap_or(Value::Null),
                "summary": fields::str_or_empty(bug, "fields.summary"),
                "priority": fields::str_or_unknown(bug, "fields.priority.name"),
                "status": fields::str_or_unknown(bug, "fields.status.name"),
                "assignee": fields::str_or_unassigned(bug, "fields.assignee.displayName"),
            })
        })
        .collect();

    let mut recommendations = Vec::new();
    if completion_rate < 60.0 {
        recommendations
            .push("Low completion rate: consider reducing scope or extending the sprint".into());
    }
    if high_priority_incomplete_count > 0 {
        recommendations.push(format!(
            "{high_priority_incomplete_count} high priority items incomplete: focus team efforts"
        ));
    }
    if unassigned_open > 0 {
        recommendations.push(format!("{unassigned_open} unassigned tickets: assign ownership"));
    }
    if bug_rate > 15.0 {
        recommendations.push("High bug rate: consider quality improvement initiatives".into());
    }
    if wip_rate > 40.0 {
        recommendations.push(
            "High work in progress: encourage finishing current work before starting new tasks"
                .into(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("Sprint health looks good: maintain current momentum".into());
    }

    let mut key_achievements = Vec::new();
    if completion_rate >= 80.0 {
        key_achievements.push(format!(
            "High completion rate: {completion_rate}% of story points delivered"
        ));
    }
    if production_bugs.is_empty() {
        key_achievements.push("No production bugs identified in sprint".to_string());
    }
    if high_priority_incomplete_count == 0 {
        key_achievements.push("All high priority items completed".to_string());
    }
    if done_high_value_stories > 0 {
        key_achievements.push(format!(
            "Completed {done_high_value_stories} high-value stories (5+ points)"
        ));
    }

    let success_level = if completion_rate >= 80.0 {
        "Excellent"
    } else if completion_rate >= 60.0 {
        "Good"
    } else if completion_rate >= 40.0 {
        "Fair"
    } else {
        "Needs Improvement"
    };

    let tech_categorization: Map<String, Value> = tech_categories
        .iter()
        .map(|(category, count)| {
            let count = count.as_u64().unwrap_or(0);
            (
                category.clone(),
                json!({
                    "count": count,
                    "percentage": percentage(count as f64, total_tickets as f64),
                }),
            )
        })
        .collect();

    json!({
        "sprint_name": sprint_name,
        "story_points_breakdown": {
            "done": points_done,
            "in_progress": points_in_progress,
            "in_review": points_in_review,
            "in_qa": points_in_qa,
            "to_do": points_to_do,
            "total": total_points,
        },
        "aging_of_tickets": Value::Object(aging),
        "incomplete_high_priority_tickets": incomplete_high_priority,
        "sprint_health_indicators": {
            "completion_rate": completion_rate,
            "work_in_progress_rate": wip_rate,
            "high_priority_incomplete_count": high_priority_incomplete_count,
            "unassigned_work_count": unassigned_open,
            "bug_rate": bug_rate,
        },
        "recommendations": recommendations,
        "sprint_success_summary": {
            "success_level": success_level,
            "completion_rate": completion_rate,
            "total_tickets": total_tickets,
            "story_points_delivered": points_done,
        },
        "key_achievements": key_achievements,
        "tech_categorization": Value::Object(tech_categorization),
        "bugs_vs_story_task_count": {
            "bugs": bugs.len(),
            "stories": stories,
            "tasks": tasks,
            "bug_percentage": bug_rate,
        },
        "production_bugs": production_bugs,
    })
}

/// Aggregates per-sprint reports into board-level summary metrics.
pub fn summarize_sprint_reports(reports: &[Value]) -> Value {
    let valid: Vec<&Value> = reports
        .iter()
        .filter(|r| r.get("status").and_then(Value::as_str) != Some("error"))
        .collect();
    if valid.is_empty() {
        return json!({"note": "No valid sprint reports to summarize"});
    }

    let mut velocities = Vec::new();
    let mut completion_rates = Vec::new();
    let mut bug_rates = Vec::new();
    for report in &valid {
        velocities.push(fields::f64_or_zero(report, "story_points_breakdown.done"));
        completion_rates.push(fields::f64_or_zero(
            report,
            "sprint_health_indicators.completion_rate",
        ));
        bug_rates.push(fields::f64_or_zero(report, "sprint_health_indicators.bug_rate"));
    }

    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            round1(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    json!({
        "sprints_analyzed": valid.len(),
        "average_velocity": mean(&velocities),
        "average_completion_rate": mean(&completion_rates),
        "average_bug_rate": mean(&bug_rates),
        "completion_trend": if completion_rates.len() > 1
            && completion_rates.last() > completion_rates.first()
        {
            "improving"
        } else {
            "stable"
        },
    })
}
