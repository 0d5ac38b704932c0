//! Keyword intent parsing and graph generation
//!
//! Free text such as "when a bug email arrives create a jira ticket and
//! notify slack" is matched against keyword tables to find the apps,
//! operations and conditions it mentions. The generator turns that into a
//! linear chain of nodes, one per app, in the order the apps appear.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FlowEngineError, Result};
use crate::types::{GraphEdge, GraphNode, NodeData, Position, WorkflowGraph};

const NODE_SPACING_X: f64 = 250.0;

/// An app the parser recognises
#[derive(Debug)]
struct AppKeywords {
    app: &'static str,
    keywords: &'static [&'static str],
    trigger: (&'static str, &'static str),
    action: (&'static str, &'static str),
}

const APPS: &[AppKeywords] = &[
    AppKeywords {
        app: "gmail",
        keywords: &["gmail", "email", "inbox", "mail"],
        trigger: ("Watch inbox", "watchInbox"),
        action: ("Send email", "sendEmail"),
    },
    AppKeywords {
        app: "slack",
        keywords: &["slack"],
        trigger: ("Watch channel", "watchChannel"),
        action: ("Post message", "postMessage"),
    },
    AppKeywords {
        app: "jira",
        keywords: &["jira", "ticket", "issue"],
        trigger: ("Watch issues", "watchIssues"),
        action: ("Create issue", "createIssue"),
    },
    AppKeywords {
        app: "github",
        keywords: &["github", "pull request", "commit"],
        trigger: ("Watch repository", "watchRepository"),
        action: ("Create issue", "createIssue"),
    },
    AppKeywords {
        app: "sheets",
        keywords: &["sheet", "spreadsheet"],
        trigger: ("Watch rows", "watchRows"),
        action: ("Append row", "appendRow"),
    },
    AppKeywords {
        app: "calendar",
        keywords: &["calendar", "meeting", "event"],
        trigger: ("Watch events", "watchEvents"),
        action: ("Create event", "createEvent"),
    },
    AppKeywords {
        app: "notion",
        keywords: &["notion", "page", "doc"],
        trigger: ("Watch pages", "watchPages"),
        action: ("Create page", "createPage"),
    },
    AppKeywords {
        app: "trello",
        keywords: &["trello", "card", "board"],
        trigger: ("Watch cards", "watchCards"),
        action: ("Create card", "createCard"),
    },
];

const OPERATIONS: &[(&str, &[&str])] = &[
    ("watch", &["when", "whenever", "watch", "receive", "arrives", "new"]),
    ("create", &["create", "add", "open", "make"]),
    ("notify", &["notify", "alert", "post", "send", "tell"]),
    ("update", &["update", "change", "edit"]),
    ("summarize", &["summarize", "summarise", "digest", "summary"]),
];

/// Words that start a condition clause
const CONDITION_MARKERS: &[&str] = &["only if", "if", "unless"];

/// Words that end a condition clause
const CLAUSE_BREAKS: &[&str] = &["then", "and", "create", "notify", "send", "post"];

/// What the parser found in a piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIntent {
    /// Apps in order of first mention
    pub apps: Vec<String>,
    /// Operations in order of first mention
    pub operations: Vec<String>,
    /// Condition clauses, marker included
    pub conditions: Vec<String>,
}

impl ParsedIntent {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Keyword matcher over the built-in app and operation tables
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentParser;

impl IntentParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> ParsedIntent {
        let lowered = text.to_lowercase();
        let words = tokenize(&lowered);
        let joined = words.join(" ");

        let mut apps: Vec<(usize, &str)> = APPS
            .iter()
            .filter_map(|entry| {
                entry
                    .keywords
                    .iter()
                    .filter_map(|k| find_phrase(&words, k))
                    .min()
                    .map(|pos| (pos, entry.app))
            })
            .collect();
        apps.sort_by_key(|(pos, _)| *pos);

        let mut operations: Vec<(usize, &str)> = OPERATIONS
            .iter()
            .filter_map(|(op, keywords)| {
                keywords
                    .iter()
                    .filter_map(|k| find_phrase(&words, k))
                    .min()
                    .map(|pos| (pos, *op))
            })
            .collect();
        operations.sort_by_key(|(pos, _)| *pos);

        let intent = ParsedIntent {
            apps: apps.into_iter().map(|(_, a)| a.to_string()).collect(),
            operations: operations.into_iter().map(|(_, o)| o.to_string()).collect(),
            conditions: extract_conditions(&words),
        };
        log::debug!("parsed intent from '{}': {:?}", joined, intent);
        intent
    }

    /// Parse `text` and generate a graph from it
    pub fn generate(&self, text: &str) -> Result<WorkflowGraph> {
        generate_graph(&self.parse(text))
    }
}

/// Build a linear graph from a parsed intent
///
/// The first app becomes the trigger, every later app an action, chained in
/// mention order. Conditions are attached to the trigger's params. Node
/// ids are `{app}-{n}`, numbered from 1 within the graph.
pub fn generate_graph(intent: &ParsedIntent) -> Result<WorkflowGraph> {
    if intent.is_empty() {
        return Err(FlowEngineError::invalid(
            "no known apps were mentioned; try naming Gmail, Slack, Jira, ...",
        ));
    }

    let mut nodes = Vec::with_capacity(intent.apps.len());
    for (index, app) in intent.apps.iter().enumerate() {
        let Some(entry) = APPS.iter().find(|e| e.app == app.as_str()) else {
            log::warn!("skipping unknown app '{}'", app);
            continue;
        };
        let (title, function) = if nodes.is_empty() {
            entry.trigger
        } else {
            entry.action
        };

        let mut data = NodeData::new(title, entry.app).with_function(function);
        if nodes.is_empty() && !intent.conditions.is_empty() {
            data = data.with_param("conditions", json!(intent.conditions));
        }
        let id = format!("{}-{}", entry.app, index + 1);
        let position = Position::new(nodes.len() as f64 * NODE_SPACING_X, 0.0);
        nodes.push(GraphNode::new(id, position, data));
    }

    let edges = nodes
        .windows(2)
        .map(|pair| GraphEdge::connect(&pair[0].id, &pair[1].id))
        .collect();

    Ok(WorkflowGraph::from_parts(nodes, edges))
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word index of the first match of a (possibly multi-word) phrase
///
/// Single words also match their plural, e.g. "tickets".
fn find_phrase(words: &[&str], phrase: &str) -> Option<usize> {
    let parts: Vec<&str> = phrase.split(' ').collect();
    if parts.len() == 1 {
        return words
            .iter()
            .position(|w| *w == phrase || w.strip_suffix('s') == Some(phrase));
    }
    words
        .windows(parts.len())
        .position(|window| window == parts.as_slice())
}

fn extract_conditions(words: &[&str]) -> Vec<String> {
    let mut conditions = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let marker = CONDITION_MARKERS.iter().find(|m| {
            let parts: Vec<&str> = m.split(' ').collect();
            words[i..].starts_with(&parts)
        });
        let Some(marker) = marker else {
            i += 1;
            continue;
        };

        let start = i + marker.split(' ').count();
        let end = words[start..]
            .iter()
            .position(|w| CLAUSE_BREAKS.contains(w))
            .map_or(words.len(), |offset| start + offset);
        if end > start {
            conditions.push(format!("{} {}", marker, words[start..end].join(" ")));
        }
        i = end.max(i + 1);
    }
    conditions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::topological_order;

    #[test]
    fn test_apps_in_mention_order() {
        let intent = IntentParser::new()
            .parse("When a bug email arrives, create a Jira ticket and notify Slack");

        assert_eq!(intent.apps, vec!["gmail", "jira", "slack"]);
        assert_eq!(intent.operations, vec!["watch", "create", "notify"]);
        assert!(intent.conditions.is_empty());
    }

    #[test]
    fn test_plural_keywords_match() {
        let intent = IntentParser::new().parse("Copy new tickets into a spreadsheet");
        assert_eq!(intent.apps, vec!["jira", "sheets"]);
    }

    #[test]
    fn test_conditions_extracted() {
        let intent = IntentParser::new()
            .parse("Post to slack only if the ticket priority is high, then email the lead");
        assert_eq!(
            intent.conditions,
            vec!["only if the ticket priority is high"]
        );
    }

    #[test]
    fn test_generate_linear_chain() {
        let graph = IntentParser::new()
            .generate("when an email arrives create a jira issue then post in slack")
            .unwrap();

        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["gmail-1", "jira-2", "slack-3"]);
        assert_eq!(graph.nodes[0].data.function_name.as_deref(), Some("watchInbox"));
        assert_eq!(graph.nodes[1].data.function_name.as_deref(), Some("createIssue"));
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(topological_order(&graph).order, ids);
    }

    #[test]
    fn test_conditions_land_on_trigger() {
        let graph = IntentParser::new()
            .generate("watch gmail if the sender is a customer and notify slack")
            .unwrap();
        assert_eq!(
            graph.nodes[0].data.params["conditions"],
            json!(["if the sender is a customer"])
        );
        assert!(graph.nodes[1].data.params.is_empty());
    }

    #[test]
    fn test_nothing_recognised() {
        let err = IntentParser::new().generate("make me a sandwich").unwrap_err();
        assert!(matches!(err, FlowEngineError::InvalidInput(_)));
    }
}
