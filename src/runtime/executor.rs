/// Per-node execution boundary
///
/// Resolves a node's processor, runs it against the gathered input and turns
/// the outcome into a timed `NodeResult`. Every failure inside this boundary,
/// configuration problems included, becomes an error result for that node only.

use crate::config::LlmConfig;
use crate::runtime::llm::CompletionProvider;
use crate::runtime::processor::NodeProcessor;
use crate::workflow::types::{Node, NodeResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Node executor that dispatches to type-specific processors
///
/// Holds the injected completion provider and the LLM defaults applied when a
/// node leaves model, temperature or token limit unset.
pub struct NodeExecutor {
    provider: Arc<dyn CompletionProvider>,
    llm: LlmConfig,
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor")
            .field("default_model", &self.llm.default_model)
            .finish_non_exhaustive()
    }
}

impl NodeExecutor {
    /// Create new node executor around a ready completion provider
    pub fn new(provider: Arc<dyn CompletionProvider>, llm: LlmConfig) -> Self {
        Self { provider, llm }
    }

    /// Execute a single node against its gathered input
    pub async fn execute_node(&self, node: &Node, input: Value) -> NodeResult {
        tracing::info!("🚀 Starting node execution: {} (type: {})", node.id, node.node_type);
        tracing::debug!("📥 Input data: {}", input);

        let start_time = Instant::now();

        let outcome = match NodeProcessor::from_node(node) {
            Ok(processor) => processor.process(&input, self.provider.as_ref(), &self.llm).await,
            Err(e) => Err(e),
        };

        let duration = elapsed_millis(start_time);

        match outcome {
            Ok(output) => {
                tracing::info!("✅ Node execution completed: {} in {}ms", node.id, duration);
                tracing::debug!("📤 Output data: {}", output);
                NodeResult::success(node.id.clone(), input, output, duration)
            }
            Err(e) => {
                tracing::error!("❌ Node execution failed: {} in {}ms - Error: {}", node.id, duration, e);
                NodeResult::failure(node.id.clone(), e.to_string(), Some(duration))
            }
        }
    }
}

/// Whole milliseconds since `start`
pub(crate) fn elapsed_millis(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::llm::UnconfiguredProvider;
    use crate::workflow::types::NodeStatus;
    use serde_json::json;

    fn executor() -> NodeExecutor {
        NodeExecutor::new(Arc::new(UnconfiguredProvider), LlmConfig::default())
    }

    #[tokio::test]
    async fn success_records_input_snapshot() {
        let node: Node = serde_json::from_value(json!({"id": "in", "type": "input"})).unwrap();
        let result = executor().execute_node(&node, json!("Hello")).await;

        assert_eq!(result.status, NodeStatus::Success);
        assert_eq!(result.input, Some(json!("Hello")));
        assert_eq!(result.output, Some(json!("Hello")));
        assert!(result.duration.is_some());
    }

    #[tokio::test]
    async fn configuration_error_becomes_error_result() {
        let node: Node =
            serde_json::from_value(json!({"id": "t", "type": "tool", "data": {"toolType": "nope"}})).unwrap();
        let result = executor().execute_node(&node, json!(1)).await;

        assert_eq!(result.status, NodeStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Unknown tool type: nope"));
        assert_eq!(result.input, None);
        assert_eq!(result.output, None);
    }
}
