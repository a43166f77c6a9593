/// AgentFlow: graph execution backend for visual AI workflows
///
/// This library executes small directed graphs of typed nodes (input, LLM,
/// tool, router, loop, transform, output) over a single input value, with
/// workflow storage and an HTTP API for the canvas front-end.

// Core configuration and setup
pub mod config;

// Workflow management layer - definitions, storage and validation
pub mod workflow;

// Runtime execution engine - scheduling, node processors and expressions
pub mod runtime;

// HTTP API layer - REST endpoints for workflows and execution
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use runtime::{CompletionProvider, ExecutionEngine, NodeExecutor};
pub use server::start_server;
pub use workflow::{Edge, ExecuteRequest, ExecuteResponse, Node, NodeResult, NodeType, Workflow};
