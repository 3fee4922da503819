//! Persistence Layer (§4.4): durable task/report/log storage with an
//! automatic, one-way fallback to an in-memory backend if the durable store
//! is unreachable at startup.

pub mod backend;
pub mod in_memory;
pub mod mongo;

pub use backend::PersistenceBackend;
pub use in_memory::InMemoryBackend;
pub use mongo::MongoBackend;

use research_core::config::PersistenceConfig;
use std::sync::Arc;
use tracing::warn;

/// Build the configured persistence backend: MongoDB when
/// [`PersistenceConfig::url`] is set and reachable, in-memory otherwise.
/// A configured-but-unreachable durable store degrades to in-memory with a
/// warning rather than failing startup (§7 design note on graceful
/// persistence-outage degradation).
pub async fn build_backend(config: &PersistenceConfig) -> Arc<dyn PersistenceBackend> {
    if config.url.is_none() {
        return Arc::new(InMemoryBackend::new());
    }
    match MongoBackend::connect(config).await {
        Ok(backend) => Arc::new(backend),
        Err(error) => {
            warn!(%error, "durable persistence backend unreachable at startup; falling back to in-memory");
            Arc::new(InMemoryBackend::new())
        }
    }
}
