//! Provider Gateway (§4.1): uniform access to `complete-text` and
//! `search-web`, with mock mode as a first-class path rather than a
//! fallback after failure.

pub mod gateway;
pub mod live;
pub mod mock;
pub mod rate_limiter;
pub mod types;

pub use gateway::ProviderGateway;
pub use live::HttpProviderGateway;
pub use mock::MockProviderGateway;
pub use types::{CompleteTextRequest, CompleteTextResponse, SearchHit, SearchWebRequest};

use research_core::config::ProviderConfig;
use std::sync::Arc;

/// Build the appropriate gateway for the given configuration: live when both
/// capability credentials are present, mock otherwise (§4.1: "mock mode is a
/// first-class path, not a fallback after failure").
#[must_use]
pub fn build_gateway(config: &ProviderConfig) -> Arc<dyn ProviderGateway> {
    if config.is_mock_mode() {
        Arc::new(MockProviderGateway::new())
    } else {
        Arc::new(HttpProviderGateway::new(config.clone()))
    }
}
