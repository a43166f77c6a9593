/// Execution endpoints
///
/// Runs a submitted graph either buffered (one JSON response) or streamed as
/// Server-Sent Events, one event per node result. Also exposes the advisory
/// validator without executing anything.

use crate::{
    api::AppState,
    workflow::{
        types::{ExecuteRequest, ExecuteResponse, ValidationReport},
        validation::validate_workflow,
    },
};
use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::post,
    Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;

/// Create execution routes
pub fn create_execute_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/execute", post(execute_workflow))
        .route("/api/v1/execute/stream", post(execute_workflow_stream))
        .route("/api/v1/execute/validate", post(validate))
}

/// Execute a graph and return every result at once
///
/// POST /api/v1/execute
/// Body: { "nodes": [...], "edges": [...], "input": ... }
async fn execute_workflow(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Json<ExecuteResponse> {
    Json(state.engine.run(request).await)
}

/// Execute a graph, streaming each node result as it completes
///
/// POST /api/v1/execute/stream
/// Emits `data: <NodeResult>` per node, then `data: {"type":"complete"}`.
/// A run-level failure emits `data: {"type":"error","error":"..."}` instead
/// of the completion marker.
async fn execute_workflow_stream(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("📡 Streaming run with {} nodes", request.nodes.len());
    let mut results = state
        .engine
        .execute_stream(request.nodes, request.edges, request.input);

    let events = async_stream::stream! {
        while let Some(item) = results.next().await {
            match item {
                Ok(result) => yield sse_event(&result),
                Err(e) => {
                    tracing::error!("❌ Streaming run failed: {}", e);
                    yield sse_event(&json!({"type": "error", "error": e.to_string()}));
                    return;
                }
            }
        }
        yield sse_event(&json!({"type": "complete"}));
    };

    Sse::new(events)
}

fn sse_event<T: Serialize>(payload: &T) -> Result<Event, Infallible> {
    Ok(Event::default().data(serde_json::to_string(payload).unwrap_or_default()))
}

/// Validate a graph without executing it
///
/// POST /api/v1/execute/validate
/// Returns: { "valid": bool, "errors": [...], "warnings": [...] }
async fn validate(Json(request): Json<ExecuteRequest>) -> Json<ValidationReport> {
    let report = validate_workflow(&request.nodes, &request.edges);
    if !report.valid {
        tracing::warn!("⚠️ Validation rejected graph: {:?}", report.errors);
    }
    Json(report)
}
