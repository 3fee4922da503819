//! Shared application state threaded through every handler.

use research_core::config::Config;
use research_orchestrator::WorkerPool;
use research_persistence::PersistenceBackend;
use research_progress::ProgressBus;
use std::sync::Arc;

/// Everything a handler needs: the durable store, the progress bus, the
/// worker pool tasks are submitted to, and the frozen startup configuration.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend (durable or in-memory, already resolved at startup).
    pub persistence: Arc<dyn PersistenceBackend>,
    /// Per-task progress fan-out.
    pub progress: Arc<ProgressBus>,
    /// Fixed-size orchestrator worker pool.
    pub pool: Arc<WorkerPool>,
    /// Startup configuration snapshot, for read-only diagnostics (`/health`).
    pub config: Arc<Config>,
}
