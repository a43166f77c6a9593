/// Workflow management REST API endpoints
///
/// CRUD over stored workflow definitions plus duplication and paginated
/// listing. Identifiers are generated here; the store only persists them.

use crate::{api::AppState, workflow::types::Workflow};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Pagination parameters for listing
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/api/v1/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/v1/workflows/{id}/duplicate", post(duplicate_workflow))
}

/// List workflows
///
/// GET /api/v1/workflows?limit=10&offset=0
/// Returns: { "workflows": [...], "total": n, "limit": 10, "offset": 0 }
async fn list_workflows(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, StatusCode> {
    match state.store.list(params.limit, params.offset).await {
        Ok(page) => Ok(Json(json!({
            "workflows": page.workflows,
            "total": page.total,
            "limit": params.limit,
            "offset": params.offset,
        }))),
        Err(e) => {
            tracing::error!("Failed to list workflows: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get a specific workflow by ID
///
/// GET /api/v1/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, StatusCode> {
    match state.store.get(&id).await {
        Ok(Some(workflow)) => Ok(Json(workflow)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get workflow {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Create a new workflow with a generated ID
///
/// POST /api/v1/workflows
/// Body: { "name": "...", "nodes": [...], "edges": [...] }
async fn create_workflow(
    State(state): State<AppState>,
    Json(mut workflow): Json<Workflow>,
) -> Result<Json<Workflow>, StatusCode> {
    let now = Utc::now();
    workflow.id = Some(Uuid::new_v4().to_string());
    workflow.created_at = Some(now);
    workflow.updated_at = Some(now);

    if let Err(e) = state.store.put(&workflow).await {
        tracing::error!("Failed to save workflow: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("📝 Created workflow: {:?} ({})", workflow.id, workflow.name);
    Ok(Json(workflow))
}

/// Replace an existing workflow
///
/// PUT /api/v1/workflows/{id}
/// The path ID wins over any ID in the body.
async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut workflow): Json<Workflow>,
) -> Result<Json<Workflow>, StatusCode> {
    let existing = match state.store.get(&id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to load workflow {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    workflow.id = Some(id.clone());
    workflow.created_at = existing.created_at;
    workflow.updated_at = Some(Utc::now());

    if let Err(e) = state.store.put(&workflow).await {
        tracing::error!("Failed to update workflow {}: {}", id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("✏️ Updated workflow: {} ({})", id, workflow.name);
    Ok(Json(workflow))
}

/// Delete a workflow
///
/// DELETE /api/v1/workflows/{id}
/// Returns: { "deleted": true, "id": "..." }
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.store.delete(&id).await {
        Ok(true) => {
            tracing::info!("🗑️ Deleted workflow: {}", id);
            Ok(Json(json!({ "deleted": true, "id": id })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete workflow {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Copy a workflow under a new ID
///
/// POST /api/v1/workflows/{id}/duplicate
/// The copy's name gets a " (Copy)" suffix.
async fn duplicate_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, StatusCode> {
    let original = match state.store.get(&id).await {
        Ok(Some(original)) => original,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to load workflow {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let now = Utc::now();
    let duplicate = Workflow {
        id: Some(Uuid::new_v4().to_string()),
        name: format!("{} (Copy)", original.name),
        created_at: Some(now),
        updated_at: Some(now),
        ..original
    };

    if let Err(e) = state.store.put(&duplicate).await {
        tracing::error!("Failed to save duplicate of {}: {}", id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("📑 Duplicated workflow {} as {:?}", id, duplicate.id);
    Ok(Json(duplicate))
}
