//! Intake HTTP/WebSocket API entry point (§6).

use research_core::config::Config;
use research_orchestrator::{Orchestrator, WorkerPool};
use research_progress::ProgressBus;
use research_server::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env());

    let gateway = research_provider::build_gateway(&config.provider);
    let persistence = research_persistence::build_backend(&config.persistence).await;
    let progress = Arc::new(ProgressBus::new());

    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        Arc::clone(&persistence),
        Arc::clone(&progress),
        config.orchestrator.clone(),
    ));
    let pool = Arc::new(WorkerPool::new(orchestrator, config.orchestrator.max_concurrent_tasks));

    let state = AppState {
        persistence,
        progress,
        pool,
        config: Arc::clone(&config),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "deep research intake API listening");

    axum::serve(listener, research_server::build(state)).await?;
    Ok(())
}
