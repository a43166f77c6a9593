/// Server setup and initialization
///
/// Wires together all components: workflow store, completion provider,
/// execution engine, and HTTP routes.

use crate::{
    api::{create_execute_routes, create_workflow_routes, AppState},
    config::{Config, StorageBackend, StorageConfig},
    runtime::{llm::provider_from_config, ExecutionEngine, NodeExecutor},
    workflow::{MemoryWorkflowStore, SqliteWorkflowStore, WorkflowStore},
};
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes and middleware
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📋 Initializing workflow store ({:?})", config.storage.backend);
    let store = open_store(&config.storage).await?;

    tracing::info!("⚙️ Initializing node executor");
    let provider = provider_from_config(&config.llm);
    let node_executor = Arc::new(NodeExecutor::new(provider, config.llm.clone()));

    tracing::info!("🚀 Initializing execution engine");
    let engine = Arc::new(ExecutionEngine::new(node_executor));

    let app = build_router(AppState { store, engine });
    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Open the configured workflow store
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn WorkflowStore>> {
    let store: Arc<dyn WorkflowStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryWorkflowStore::new()),
        StorageBackend::Sqlite => Arc::new(
            SqliteWorkflowStore::connect(&config.database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open workflow database: {}", e))?,
        ),
    };
    Ok(store)
}

/// Assemble routes around an existing state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(create_workflow_routes())
        .merge(create_execute_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // RUST_LOG overrides the default `info` level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting AgentFlow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "agentflow-api" }))
}

/// API info
async fn root() -> Json<Value> {
    Json(json!({ "name": "AgentFlow API", "version": env!("CARGO_PKG_VERSION") }))
}
