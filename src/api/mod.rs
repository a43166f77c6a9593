/// HTTP API Layer
///
/// This module provides the REST API endpoints for the workflow canvas.
/// It handles:
/// - Workflow CRUD, duplication and pagination
/// - Buffered and streamed (SSE) graph execution
/// - Advisory graph validation

use crate::{runtime::ExecutionEngine, workflow::WorkflowStore};
use std::sync::Arc;

// Workflow management endpoints (POST/GET/PUT/DELETE)
pub mod workflows;

// Execution and validation endpoints
pub mod execute;

// Re-export router builders
pub use execute::create_execute_routes;
pub use workflows::create_workflow_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Workflow store backing the CRUD endpoints
    pub store: Arc<dyn WorkflowStore>,
    /// Execution engine shared by every run
    pub engine: Arc<ExecutionEngine>,
}
