/// Adjacency view of a node/edge graph plus the per-run work queue
///
/// Construction is permissive: dangling edge endpoints and duplicate ids are
/// accepted here and rejected (or tolerated) by the engine. Neighbor lists keep
/// edge insertion order so traversal is deterministic.

use crate::workflow::types::{Edge, Node};
use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};

/// Workflow graph with ordered outgoing/incoming neighbor lists
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    /// Nodes keyed by id; a later duplicate replaces an earlier one
    nodes: HashMap<String, Node>,
    /// Node ids in submission order, without duplicates
    order: Vec<String>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
    edges: Vec<Edge>,
    start_nodes: Vec<String>,
}

impl WorkflowGraph {
    /// Build adjacency from a flat node and edge list
    pub fn build(nodes: Vec<Node>, edges: &[Edge]) -> Self {
        tracing::debug!("🏗️ Building workflow graph with {} nodes and {} edges", nodes.len(), edges.len());

        let mut node_map = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<String>> = HashMap::new();

        for node in nodes {
            if !node_map.contains_key(&node.id) {
                order.push(node.id.clone());
            }
            outgoing.entry(node.id.clone()).or_default();
            incoming.entry(node.id.clone()).or_default();
            node_map.insert(node.id.clone(), node);
        }

        for edge in edges {
            outgoing.entry(edge.source.clone()).or_default().push(edge.target.clone());
            incoming.entry(edge.target.clone()).or_default().push(edge.source.clone());
            tracing::debug!("  🔗 Added edge: '{}' → '{}'", edge.source, edge.target);
        }

        let start_nodes = order
            .iter()
            .filter(|id| incoming.get(*id).map_or(true, Vec::is_empty))
            .cloned()
            .collect();

        Self {
            nodes: node_map,
            order,
            outgoing,
            incoming,
            edges: edges.to_vec(),
            start_nodes,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Upstream node ids, one entry per edge
    pub fn incoming(&self, id: &str) -> &[String] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Downstream node ids, one entry per edge
    pub fn outgoing(&self, id: &str) -> &[String] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes with no incoming edges, in submission order
    pub fn start_nodes(&self) -> &[String] {
        &self.start_nodes
    }

    /// Fail on the first edge naming a node that is not in the graph
    pub fn check_references(&self) -> Result<()> {
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !self.nodes.contains_key(endpoint) {
                    anyhow::bail!("Edge '{}' references unknown node '{}'", edge.id, endpoint);
                }
            }
        }
        Ok(())
    }

    /// Fresh ready queue for one run
    pub fn schedule(&self) -> Schedule<'_> {
        let remaining = self
            .order
            .iter()
            .map(|id| (id.clone(), self.incoming(id).len()))
            .collect();

        Schedule {
            graph: self,
            queue: self.start_nodes.iter().cloned().collect(),
            remaining,
            executed: HashSet::new(),
        }
    }
}

/// FIFO work queue with requeue of blocked nodes
///
/// Every completed node enqueues each downstream neighbor, once per edge. A
/// popped node with unfinished dependencies goes back to the end of the queue.
/// Dependencies count as finished on any terminal status (success or error),
/// tracked by a per-node remaining-dependency counter. When no queued node can
/// ever become ready (a cycle), the queue is abandoned.
#[derive(Debug)]
pub struct Schedule<'g> {
    graph: &'g WorkflowGraph,
    queue: VecDeque<String>,
    remaining: HashMap<String, usize>,
    executed: HashSet<String>,
}

impl Schedule<'_> {
    /// Next node whose dependencies have all finished
    pub fn next_ready(&mut self) -> Option<String> {
        while let Some(id) = self.queue.pop_front() {
            if self.executed.contains(&id) {
                continue;
            }
            if self.is_ready(&id) {
                return Some(id);
            }

            // Requeueing only helps if something queued can still run
            if !self.queue.iter().any(|queued| self.is_ready(queued)) {
                self.queue.clear();
                return None;
            }
            self.queue.push_back(id);
        }
        None
    }

    /// Record a terminal status for `id` and enqueue its dependents
    pub fn complete(&mut self, id: &str) {
        if !self.executed.insert(id.to_string()) {
            return;
        }

        for target in self.graph.outgoing(id) {
            if let Some(count) = self.remaining.get_mut(target) {
                *count = count.saturating_sub(1);
            }
            if !self.executed.contains(target) {
                self.queue.push_back(target.clone());
            }
        }
    }

    fn is_ready(&self, id: &str) -> bool {
        !self.executed.contains(id) && self.remaining.get(id).map_or(true, |count| *count == 0)
    }

    /// Nodes that never became ready, in submission order
    pub fn stalled(&self) -> Vec<&str> {
        self.graph
            .order
            .iter()
            .filter(|id| !self.executed.contains(*id))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> Node {
        serde_json::from_value(json!({"id": id, "type": "transform"})).unwrap()
    }

    fn edge(source: &str, target: &str) -> Edge {
        serde_json::from_value(json!({
            "id": format!("e-{}-{}", source, target),
            "source": source,
            "target": target
        }))
        .unwrap()
    }

    fn drain(graph: &WorkflowGraph) -> (Vec<String>, Vec<String>) {
        let mut schedule = graph.schedule();
        let mut visited = Vec::new();
        while let Some(id) = schedule.next_ready() {
            schedule.complete(&id);
            visited.push(id);
        }
        let stalled = schedule.stalled().into_iter().map(String::from).collect();
        (visited, stalled)
    }

    #[test]
    fn adjacency_defaults_to_empty_lists() {
        let graph = WorkflowGraph::build(vec![node("a"), node("b")], &[edge("a", "b")]);

        assert_eq!(graph.outgoing("a"), ["b".to_string()]);
        assert!(graph.outgoing("b").is_empty());
        assert_eq!(graph.incoming("b"), ["a".to_string()]);
        assert_eq!(graph.start_nodes(), ["a".to_string()]);
    }

    #[test]
    fn builder_accepts_dangling_edges_but_check_rejects_them() {
        let graph = WorkflowGraph::build(vec![node("a")], &[edge("a", "ghost")]);

        assert_eq!(graph.outgoing("a"), ["ghost".to_string()]);
        let err = graph.check_references().unwrap_err();
        assert_eq!(err.to_string(), "Edge 'e-a-ghost' references unknown node 'ghost'");
    }

    #[test]
    fn diamond_runs_join_after_both_branches() {
        let graph = WorkflowGraph::build(
            vec![node("d"), node("b"), node("c"), node("a")],
            &[edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
        );

        let (visited, stalled) = drain(&graph);
        assert_eq!(visited, vec!["a", "b", "c", "d"]);
        assert!(stalled.is_empty());
    }

    #[test]
    fn completion_enqueues_neighbors_behind_waiting_work() {
        let graph = WorkflowGraph::build(
            vec![node("a"), node("x"), node("b"), node("d"), node("y")],
            &[edge("a", "d"), edge("b", "d"), edge("x", "y")],
        );

        assert_eq!(graph.start_nodes(), ["a", "x", "b"].map(String::from));
        assert_eq!(drain(&graph).0, vec!["a", "x", "b", "d", "y"]);
    }

    #[test]
    fn blocked_node_is_requeued() {
        let graph = WorkflowGraph::build(
            vec![node("a"), node("b"), node("c")],
            &[edge("a", "c"), edge("a", "b"), edge("b", "c")],
        );

        assert_eq!(drain(&graph).0, vec!["a", "b", "c"]);
    }

    #[test]
    fn work_continues_past_a_node_blocked_by_a_cycle() {
        let graph = WorkflowGraph::build(
            vec![node("s"), node("p"), node("q"), node("z"), node("w")],
            &[edge("s", "z"), edge("p", "q"), edge("q", "p"), edge("q", "z"), edge("s", "w")],
        );

        let (visited, stalled) = drain(&graph);
        assert_eq!(visited, vec!["s", "w"]);
        assert_eq!(stalled, vec!["p", "q", "z"]);
    }

    #[test]
    fn cycle_members_never_run() {
        let graph = WorkflowGraph::build(
            vec![node("in"), node("x"), node("y"), node("out")],
            &[edge("in", "x"), edge("x", "y"), edge("y", "x"), edge("y", "out")],
        );

        let (visited, stalled) = drain(&graph);
        assert_eq!(visited, vec!["in"]);
        assert_eq!(stalled, vec!["x", "y", "out"]);
    }

    #[test]
    fn parallel_edges_count_separately() {
        let graph = WorkflowGraph::build(vec![node("a"), node("b")], &[edge("a", "b"), edge("a", "b")]);

        let (visited, _) = drain(&graph);
        assert_eq!(visited, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_ids_run_once() {
        let graph = WorkflowGraph::build(vec![node("a"), node("a")], &[]);

        assert_eq!(graph.len(), 1);
        assert_eq!(drain(&graph).0, vec!["a"]);
    }
}
