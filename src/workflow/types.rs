/// Core workflow type definitions
///
/// Defines the node/edge graph a caller submits, the stored workflow definition,
/// and the per-node trace records produced by a run. Field names follow the
/// camelCase wire format used by the canvas front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stored workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Generated identifier, assigned when the workflow is first stored
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable workflow name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single typed unit of work in a workflow graph
///
/// Nodes are immutable inputs to a run; the engine never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the graph (e.g., "input-1")
    pub id: String,
    /// The type of node which determines execution behavior
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Canvas position, cosmetic only
    #[serde(default)]
    pub position: Position,
    /// Type-specific configuration bag
    #[serde(default)]
    pub data: NodeData,
}

/// Available node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Entry point, passes the run input through
    Input,
    /// Prompt template rendered and sent to the completion provider
    Llm,
    /// Calculator or a stub integration
    Tool,
    /// Evaluates a condition and tags the value with a branch
    Router,
    /// Bounds a sequence to a maximum iteration count
    Loop,
    /// JSON parsing, field extraction, text formatting or filtering
    Transform,
    /// Exit point, passes its input through
    Output,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Input => "input",
            NodeType::Llm => "llm",
            NodeType::Tool => "tool",
            NodeType::Router => "router",
            NodeType::Loop => "loop",
            NodeType::Transform => "transform",
            NodeType::Output => "output",
        };
        f.write_str(name)
    }
}

/// Node position on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Type-specific node configuration
///
/// Every field is optional; each node type reads only the fields it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // Input node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    // LLM node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    // Tool node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    /// Free-form settings shared by tool and transform nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,

    // Router node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_label: Option<String>,

    // Loop node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    // Transform node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_type: Option<String>,

    // Output node fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl NodeData {
    /// Read a string entry from the `config` map
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.as_ref()?.get(key)?.as_str()
    }
}

/// Directed dependency link from one node to another
///
/// Handles are cosmetic and never consulted during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    /// Upstream node ID
    pub source: String,
    /// Downstream node ID
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Terminal (or in-flight) status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Error,
    Running,
}

/// Trace record for one executed node
///
/// Produced exactly once per executed node per run. The ordered sequence of
/// these records is the observable trace of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: String,
    pub status: NodeStatus,
    /// Snapshot of the gathered input (success results only)
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    /// Wall time in milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
}

impl NodeResult {
    pub fn success(node_id: impl Into<String>, input: Value, output: Value, duration: u64) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Success,
            input: Some(input),
            output: Some(output),
            error: None,
            duration: Some(duration),
        }
    }

    pub fn failure(node_id: impl Into<String>, error: impl Into<String>, duration: Option<u64>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Error,
            input: None,
            output: None,
            error: Some(error.into()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }
}

/// Request to execute (or validate) a graph against one input value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub input: Value,
}

/// Buffered run response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    /// AND of all node statuses
    pub success: bool,
    pub results: Vec<NodeResult>,
    /// Output of the last successful result with a non-null output
    pub final_output: Option<Value>,
    /// Milliseconds spent on the whole run
    pub total_duration: u64,
}

impl ExecuteResponse {
    /// Summarize a finished trace
    pub fn from_results(results: Vec<NodeResult>, total_duration: u64) -> Self {
        let success = results.iter().all(NodeResult::is_success);
        let final_output = results
            .iter()
            .rev()
            .filter(|result| result.is_success())
            .find_map(|result| result.output.clone().filter(|output| !output.is_null()));

        Self {
            success,
            results,
            final_output,
            total_duration,
        }
    }

    /// Report a failure raised outside the per-node boundary
    pub fn run_failure(error: impl Into<String>, total_duration: u64) -> Self {
        Self {
            success: false,
            results: vec![NodeResult::failure("error", error, None)],
            final_output: None,
            total_duration,
        }
    }
}

/// Advisory pre-flight report for a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_deserializes_from_canvas_format() {
        let node: Node = serde_json::from_value(json!({
            "id": "llm-1",
            "type": "llm",
            "position": {"x": 100, "y": 0},
            "data": {"label": "LLM", "model": "claude-4-sonnet", "prompt": "Hi {{input}}", "maxTokens": 256}
        }))
        .unwrap();

        assert_eq!(node.node_type, NodeType::Llm);
        assert_eq!(node.data.prompt.as_deref(), Some("Hi {{input}}"));
        assert_eq!(node.data.max_tokens, Some(256));
    }

    #[test]
    fn node_without_position_or_data_is_accepted() {
        let node: Node = serde_json::from_value(json!({"id": "in", "type": "input"})).unwrap();
        assert_eq!(node.position, Position::default());
        assert!(node.data.label.is_empty());
    }

    #[test]
    fn response_picks_last_non_null_success_output() {
        let results = vec![
            NodeResult::success("a", json!(1), json!("first"), 0),
            NodeResult::success("b", json!("first"), Value::Null, 0),
            NodeResult::failure("c", "boom", Some(0)),
        ];
        let response = ExecuteResponse::from_results(results, 3);

        assert!(!response.success);
        assert_eq!(response.final_output, Some(json!("first")));
    }

    #[test]
    fn node_result_serializes_camel_case_with_nulls() {
        let value = serde_json::to_value(NodeResult::failure("x", "bad", Some(2))).unwrap();
        assert_eq!(
            value,
            json!({"nodeId": "x", "status": "error", "input": null, "output": null, "error": "bad", "duration": 2})
        );
    }
}
