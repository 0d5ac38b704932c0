//! Workflow templates and the built-in catalog
//!
//! A template document is a graph document with catalog metadata on top:
//! `{ id, name, description, category, timeSaved, nodes, edges }`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::builder::WorkflowBuilder;
use crate::error::{FlowEngineError, Result};
use crate::types::{GraphEdge, GraphNode, WorkflowGraph};

/// A ready-made workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Free-form estimate shown in the catalog, e.g. "2h/week"
    pub time_saved: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowTemplate {
    fn from_graph(
        id: &str,
        name: &str,
        description: &str,
        category: &str,
        time_saved: &str,
        graph: WorkflowGraph,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            time_saved: time_saved.to_string(),
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }

    /// The template's graph as a fresh copy
    pub fn graph(&self) -> WorkflowGraph {
        WorkflowGraph::from_parts(self.nodes.clone(), self.edges.clone())
    }

    /// Parse a template document
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| FlowEngineError::import(format!("malformed template document: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The built-in template catalog
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate::from_graph(
            "bug-triage",
            "Bug report triage",
            "Turn bug report emails into Jira tickets and notify the team on Slack",
            "Engineering",
            "3h/week",
            WorkflowBuilder::new()
                .add_node("gmail-1", "Watch for bug reports", "gmail")
                .with_function("watchInbox")
                .with_param("query", json!("subject:bug is:unread"))
                .add_node("jira-1", "Create ticket", "jira")
                .with_function("createIssue")
                .with_param("project", json!("BUG"))
                .with_param("issueType", json!("Bug"))
                .add_node("slack-1", "Notify channel", "slack")
                .with_function("postMessage")
                .with_param("channel", json!("#bugs"))
                .chain_all()
                .build(),
        ),
        WorkflowTemplate::from_graph(
            "lead-capture",
            "Lead capture",
            "Log inbound sales emails to a spreadsheet and alert the sales channel",
            "Sales",
            "2h/week",
            WorkflowBuilder::new()
                .add_node("gmail-1", "Read inbound leads", "gmail")
                .with_function("watchInbox")
                .with_param("query", json!("to:sales@ is:unread"))
                .add_node("sheets-1", "Append lead row", "sheets")
                .with_function("appendRow")
                .with_param("sheet", json!("Leads"))
                .add_node("slack-1", "Alert sales", "slack")
                .with_function("postMessage")
                .with_param("channel", json!("#sales"))
                .chain_all()
                .build(),
        ),
        WorkflowTemplate::from_graph(
            "release-notes",
            "Release announcement",
            "Collect resolved issues, publish notes and announce them in parallel",
            "Engineering",
            "1h/release",
            WorkflowBuilder::new()
                .add_node("github-1", "Fetch merged pull requests", "github")
                .with_function("listPullRequests")
                .with_param("state", json!("merged"))
                .add_node("jira-1", "Fetch resolved issues", "jira")
                .with_function("searchIssues")
                .with_param("jql", json!("status = Done AND fixVersion = latest"))
                .at(0.0, 200.0)
                .add_node("notion-1", "Publish release notes", "notion")
                .with_function("createPage")
                .at(250.0, 100.0)
                .add_node("slack-1", "Announce release", "slack")
                .with_function("postMessage")
                .with_param("channel", json!("#releases"))
                .at(500.0, 0.0)
                .add_node("gmail-1", "Email stakeholders", "gmail")
                .with_function("sendEmail")
                .at(500.0, 200.0)
                .connect("github-1", "notion-1")
                .connect("jira-1", "notion-1")
                .connect("notion-1", "slack-1")
                .connect("notion-1", "gmail-1")
                .build(),
        ),
        WorkflowTemplate::from_graph(
            "meeting-followup",
            "Meeting follow-up",
            "Create follow-up tasks from calendar events and email attendees",
            "Productivity",
            "30m/day",
            WorkflowBuilder::new()
                .add_node("calendar-1", "Watch ended meetings", "calendar")
                .with_function("watchEvents")
                .add_node("trello-1", "Create follow-up card", "trello")
                .with_function("createCard")
                .with_param("list", json!("Follow-ups"))
                .add_node("gmail-1", "Email attendees", "gmail")
                .with_function("sendEmail")
                .chain_all()
                .build(),
        ),
    ]
}

/// Look up a built-in template by id
pub fn find_template(id: &str) -> Result<WorkflowTemplate> {
    builtin_templates()
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| FlowEngineError::TemplateNotFound(id.to_string()))
}
