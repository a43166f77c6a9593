/// Workflow Management Layer
///
/// This module handles workflow definitions, persistence, and validation:
/// - Type definitions (Workflow, Node, Edge, NodeResult)
/// - `WorkflowStore` trait with SQLite (sqlx) and in-process (ArcSwap) backends
/// - Advisory graph validation

// Core workflow type definitions
pub mod types;

// Storage trait and SQLite persistence
pub mod storage;

// Lock-free in-process store
pub mod memory;

// Pre-flight validation report
pub mod validation;

// Re-export commonly used types
pub use memory::MemoryWorkflowStore;
pub use storage::{SqliteWorkflowStore, WorkflowPage, WorkflowStore};
pub use types::{
    Edge, ExecuteRequest, ExecuteResponse, Node, NodeData, NodeResult, NodeStatus, NodeType,
    ValidationReport, Workflow,
};
pub use validation::validate_workflow;
