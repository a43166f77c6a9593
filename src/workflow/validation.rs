/// Advisory pre-flight checks for a workflow graph
///
/// Validation never blocks execution; callers decide what to do with the
/// report. Structural checks (dangling edges, duplicate ids, cycles) build a
/// petgraph DiGraph over the well-formed edges and reuse its toposort.

use crate::workflow::types::{Edge, Node, NodeType, ValidationReport};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Validate a node/edge graph
pub fn validate_workflow(nodes: &[Node], edges: &[Edge]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if nodes.is_empty() {
        return ValidationReport {
            valid: true,
            errors,
            warnings,
        };
    }

    // Orphans only matter once there is something to connect to
    let connected: HashSet<&str> = edges
        .iter()
        .flat_map(|edge| [edge.source.as_str(), edge.target.as_str()])
        .collect();
    if nodes.len() > 1 {
        for node in nodes.iter().filter(|node| !connected.contains(node.id.as_str())) {
            warnings.push(format!("Node '{}' has no connections", display_label(node)));
        }
    }

    if !nodes.iter().any(|node| node.node_type == NodeType::Input) {
        errors.push("Workflow must have at least one Input node".to_string());
    }

    if !nodes.iter().any(|node| node.node_type == NodeType::Output) {
        warnings.push("Workflow has no Output node - results may not be visible".to_string());
    }

    for node in nodes.iter().filter(|node| node.node_type == NodeType::Llm) {
        let has_prompt = node
            .data
            .prompt
            .as_deref()
            .is_some_and(|prompt| !prompt.trim().is_empty());
        if !has_prompt {
            errors.push(format!("LLM node '{}' has no prompt configured", display_label(node)));
        }
    }

    errors.extend(structural_errors(nodes, edges));

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Duplicate ids, dangling edge endpoints and cycles
fn structural_errors(nodes: &[Node], edges: &[Edge]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut node_id_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in nodes {
        if node_id_to_index.contains_key(node.id.as_str()) {
            errors.push(format!("Duplicate node id '{}'", node.id));
            continue;
        }
        let index = graph.add_node(node.id.as_str());
        node_id_to_index.insert(node.id.as_str(), index);
    }

    for edge in edges {
        let from_index = node_id_to_index.get(edge.source.as_str());
        let to_index = node_id_to_index.get(edge.target.as_str());

        match (from_index, to_index) {
            (Some(from), Some(to)) => {
                graph.add_edge(*from, *to, ());
            }
            _ => {
                for endpoint in [&edge.source, &edge.target] {
                    if !node_id_to_index.contains_key(endpoint.as_str()) {
                        errors.push(format!(
                            "Edge '{}' references unknown node '{}'",
                            edge.id, endpoint
                        ));
                    }
                }
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        let node_id = graph[cycle.node_id()];
        tracing::debug!("🔁 Cycle detected through node '{}'", node_id);
        errors.push(format!("Workflow contains a cycle through node '{}'", node_id));
    }

    errors
}

fn display_label(node: &Node) -> &str {
    if node.data.label.is_empty() {
        &node.id
    } else {
        &node.data.label
    }
}
