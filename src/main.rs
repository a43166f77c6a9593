/// AgentFlow: graph execution backend for visual AI workflows
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server.

use agentflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow management API at /api/v1/workflows/*
/// - Graph execution at /api/v1/execute (buffered, /stream, /validate)
/// - Health check at /health
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Defaults to 0.0.0.0:8000 with the in-memory store
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
