/// Graph execution engine
///
/// Drives one run of a node/edge graph over a single input value. Nodes run
/// sequentially in dependency order from a FIFO work queue; each node's
/// result is surfaced as soon as it completes. Buffered execution is the same
/// state machine collected into a list.

use crate::runtime::executor::{elapsed_millis, NodeExecutor};
use crate::runtime::graph::WorkflowGraph;
use crate::workflow::types::{Edge, ExecuteRequest, ExecuteResponse, Node, NodeResult};
use anyhow::Result;
use futures::stream::{BoxStream, TryStreamExt};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc, time::Instant};

/// Execution engine shared by every run
///
/// Holds no per-run state, so independent runs may proceed concurrently.
#[derive(Debug)]
pub struct ExecutionEngine {
    /// Node executor for handling individual node execution
    executor: Arc<NodeExecutor>,
}

/// Values visible to downstream nodes during one run
#[derive(Debug)]
struct RunState {
    /// The run's original input, seen by nodes without dependencies
    input: Value,
    /// Last successful output per node id
    outputs: HashMap<String, Value>,
}

impl RunState {
    fn new(input: Value) -> Self {
        Self {
            input,
            outputs: HashMap::new(),
        }
    }

    /// Assemble the input for a node from its upstream dependencies
    ///
    /// Failed dependencies contribute null. A multi-dependency map keeps
    /// incoming-edge order.
    fn gather(&self, dependencies: &[String]) -> Value {
        match dependencies {
            [] => self.input.clone(),
            [only] => self.outputs.get(only).cloned().unwrap_or(Value::Null),
            many => {
                let mut gathered = Map::new();
                for dependency in many {
                    let value = self.outputs.get(dependency).cloned().unwrap_or(Value::Null);
                    gathered.insert(dependency.clone(), value);
                }
                Value::Object(gathered)
            }
        }
    }

    fn record(&mut self, result: &NodeResult) {
        if let (true, Some(output)) = (result.is_success(), &result.output) {
            self.outputs.insert(result.node_id.clone(), output.clone());
        }
    }
}

impl ExecutionEngine {
    /// Create new execution engine with node executor
    pub fn new(executor: Arc<NodeExecutor>) -> Self {
        Self { executor }
    }

    /// Stream one result per executed node, in execution order
    ///
    /// An edge naming an unknown node fails the whole run before any node
    /// executes; that failure is the stream's only item. Dropping the stream
    /// abandons the run after the node currently in flight.
    pub fn execute_stream(
        &self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        input: Value,
    ) -> BoxStream<'static, Result<NodeResult>> {
        let executor = Arc::clone(&self.executor);

        Box::pin(async_stream::stream! {
            let graph = WorkflowGraph::build(nodes, &edges);
            if let Err(e) = graph.check_references() {
                yield Err(e);
                return;
            }

            tracing::debug!("📋 Start nodes: {:?}", graph.start_nodes());

            let mut state = RunState::new(input);
            let mut schedule = graph.schedule();
            let mut step = 0;

            while let Some(node_id) = schedule.next_ready() {
                let Some(node) = graph.node(&node_id) else {
                    continue;
                };
                step += 1;
                tracing::info!("📍 Step {}/{}: Executing node '{}'", step, graph.len(), node_id);

                let gathered = state.gather(graph.incoming(&node_id));
                let result = executor.execute_node(node, gathered).await;

                state.record(&result);
                schedule.complete(&node_id);
                yield Ok(result);
            }

            let stalled = schedule.stalled();
            if !stalled.is_empty() {
                tracing::warn!("⏸️ {} node(s) never became ready (cycle?): {:?}", stalled.len(), stalled);
            }
        })
    }

    /// Run to completion and return every result in execution order
    pub async fn execute(&self, nodes: Vec<Node>, edges: Vec<Edge>, input: Value) -> Result<Vec<NodeResult>> {
        self.execute_stream(nodes, edges, input).try_collect().await
    }

    /// Buffered run with timing and summary
    ///
    /// Run-level failures are reported as a single synthetic `"error"` result.
    pub async fn run(&self, request: ExecuteRequest) -> ExecuteResponse {
        let start_time = Instant::now();
        tracing::info!(
            "🚀 Starting workflow run with {} nodes and {} edges",
            request.nodes.len(),
            request.edges.len()
        );

        match self.execute(request.nodes, request.edges, request.input).await {
            Ok(results) => {
                let total_duration = elapsed_millis(start_time);
                let response = ExecuteResponse::from_results(results, total_duration);
                tracing::info!(
                    "🎉 Workflow run finished in {}ms (success: {}, {} results)",
                    total_duration,
                    response.success,
                    response.results.len()
                );
                response
            }
            Err(e) => {
                let total_duration = elapsed_millis(start_time);
                tracing::error!("❌ Workflow run failed in {}ms: {}", total_duration, e);
                ExecuteResponse::run_failure(e.to_string(), total_duration)
            }
        }
    }
}
