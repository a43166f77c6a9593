/// Runtime Execution Engine
///
/// This module runs workflow graphs. It handles:
/// - Building ordered adjacency and the per-run ready queue
/// - Sequential dependency-ordered execution, buffered or streamed
/// - Type-specific node processors and the completion provider seam
/// - Template rendering and the condition/arithmetic expression grammar

// Run driver: ready queue, input gathering, buffered and streamed results
pub mod engine;

// Per-node boundary: timing, logging and error capture
pub mod executor;

// Adjacency and remaining-dependency scheduling
pub mod graph;

// Type-specific processing for each node kind
pub mod processor;

// Completion providers used by LLM nodes
pub mod llm;

// `{{placeholder}}` substitution
pub mod template;

// Expression grammar for routers, filters and the calculator
pub mod expr;

// Re-export main types
pub use engine::ExecutionEngine;
pub use executor::NodeExecutor;
pub use graph::WorkflowGraph;
pub use llm::{provider_from_config, AnthropicProvider, CompletionProvider, CompletionRequest, UnconfiguredProvider};
pub use processor::NodeProcessor;
