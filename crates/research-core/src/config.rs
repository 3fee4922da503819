//! Centralized environment variable names and typed helpers, plus the
//! [`Config`] value constructed once at startup and threaded through every
//! component (see design note: "Singleton config / env-var globals ...
//! replace with a Config value constructed once at startup").

use std::time::Duration;

// =============================================================================
// Environment variable name constants
// =============================================================================

/// Text-completion provider API key. Absent => mock mode.
pub const PROVIDER_API_KEY_TEXT: &str = "PROVIDER_API_KEY_TEXT";
/// Web-search provider API key. Absent => mock mode.
pub const PROVIDER_API_KEY_SEARCH: &str = "PROVIDER_API_KEY_SEARCH";
/// Override endpoint for the text-completion provider.
pub const PROVIDER_BASE_URL_TEXT: &str = "PROVIDER_BASE_URL_TEXT";
/// Gateway connect timeout, seconds.
pub const PROVIDER_CONNECT_TIMEOUT_SEC: &str = "PROVIDER_CONNECT_TIMEOUT_SEC";
/// Gateway read timeout, seconds.
pub const PROVIDER_READ_TIMEOUT_SEC: &str = "PROVIDER_READ_TIMEOUT_SEC";
/// Gateway retry budget.
pub const PROVIDER_MAX_RETRIES: &str = "PROVIDER_MAX_RETRIES";
/// Durable persistence connection string; absent => in-memory backend.
pub const PERSISTENCE_URL: &str = "PERSISTENCE_URL";
/// Logical database name for the durable backend.
pub const PERSISTENCE_DB_NAME: &str = "PERSISTENCE_DB_NAME";
/// Maximum number of tasks running concurrently.
pub const RESEARCH_MAX_CONCURRENT_TASKS: &str = "RESEARCH_MAX_CONCURRENT_TASKS";
/// Default per-task deadline, seconds.
pub const RESEARCH_DEFAULT_TIMEOUT_SEC: &str = "RESEARCH_DEFAULT_TIMEOUT_SEC";
/// Default minimum completion score threshold.
pub const RESEARCH_QUALITY_THRESHOLD: &str = "RESEARCH_QUALITY_THRESHOLD";
/// Cap on evidence items collected per sub-task.
pub const RESEARCH_MAX_EVIDENCE_PER_SUBTASK: &str = "RESEARCH_MAX_EVIDENCE_PER_SUBTASK";
/// Gateway rate limit, requests per minute.
pub const RATE_LIMIT_PER_MINUTE: &str = "RATE_LIMIT_PER_MINUTE";
/// Gateway rate limit burst capacity.
pub const RATE_LIMIT_BURST: &str = "RATE_LIMIT_BURST";
/// HTTP bind host for the intake server.
pub const RESEARCH_SERVER_HOST: &str = "RESEARCH_SERVER_HOST";
/// HTTP bind port for the intake server.
pub const RESEARCH_SERVER_PORT: &str = "RESEARCH_SERVER_PORT";

// =============================================================================
// Typed helpers
// =============================================================================

/// Reads an environment variable as a string, returning `None` if unset.
#[must_use]
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Reads an environment variable as a `u64`, returning `default` if unset or invalid.
#[must_use]
pub fn env_u64_or_default(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Reads an environment variable as a `usize`, returning `default` if unset or invalid.
#[must_use]
pub fn env_usize_or_default(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Reads an environment variable as an `f64`, returning `default` if unset or invalid.
#[must_use]
pub fn env_f64_or_default(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

// =============================================================================
// Config value
// =============================================================================

/// Gateway retry/timeout/rate-limit policy.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Credential for the text-completion capability; `None` means mock mode.
    pub api_key_text: Option<String>,
    /// Credential for the web-search capability; `None` means mock mode.
    pub api_key_search: Option<String>,
    /// Optional override for the text-completion provider's base URL.
    pub base_url_text: Option<String>,
    /// Connect timeout applied to every provider call.
    pub connect_timeout: Duration,
    /// Read timeout applied to every provider call.
    pub read_timeout: Duration,
    /// Maximum retry attempts on transport errors / 5xx / 429.
    pub max_retries: u32,
    /// Requests-per-minute ceiling, per capability.
    pub rate_limit_per_minute: u32,
    /// Burst capacity for the rate limiter's token bucket.
    pub rate_limit_burst: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key_text: env_string(PROVIDER_API_KEY_TEXT),
            api_key_search: env_string(PROVIDER_API_KEY_SEARCH),
            base_url_text: env_string(PROVIDER_BASE_URL_TEXT),
            connect_timeout: Duration::from_secs(env_u64_or_default(
                PROVIDER_CONNECT_TIMEOUT_SEC,
                30,
            )),
            read_timeout: Duration::from_secs(env_u64_or_default(
                PROVIDER_READ_TIMEOUT_SEC,
                120,
            )),
            max_retries: env_u64_or_default(PROVIDER_MAX_RETRIES, 3) as u32,
            rate_limit_per_minute: env_u64_or_default(RATE_LIMIT_PER_MINUTE, 100) as u32,
            rate_limit_burst: env_u64_or_default(RATE_LIMIT_BURST, 20) as u32,
        }
    }
}

impl ProviderConfig {
    /// Whether the gateway has credentials for both capabilities; if either
    /// is absent the gateway operates in mock mode for that capability.
    #[must_use]
    pub fn is_mock_mode(&self) -> bool {
        self.api_key_text.is_none() || self.api_key_search.is_none()
    }
}

/// Persistence backend selection and connection details.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Connection string for the durable backend; `None` selects in-memory.
    pub url: Option<String>,
    /// Logical database name used by the durable backend.
    pub db_name: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            url: env_string(PERSISTENCE_URL),
            db_name: std::env::var(PERSISTENCE_DB_NAME)
                .unwrap_or_else(|_| "deep_research".to_string()),
        }
    }
}

/// Orchestrator-wide knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running tasks across the process.
    pub max_concurrent_tasks: usize,
    /// Default per-task deadline when a request does not override it.
    pub default_task_timeout: Duration,
    /// Default minimum completion score (`θ`).
    pub quality_threshold: f64,
    /// Cap on evidence items collected per sub-task in one Researcher pass.
    pub max_evidence_per_subtask: usize,
    /// Bounded concurrency used by the Researcher across sub-queries.
    pub researcher_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: env_usize_or_default(RESEARCH_MAX_CONCURRENT_TASKS, 10),
            default_task_timeout: Duration::from_secs(env_u64_or_default(
                RESEARCH_DEFAULT_TIMEOUT_SEC,
                300,
            )),
            quality_threshold: env_f64_or_default(RESEARCH_QUALITY_THRESHOLD, 0.75),
            max_evidence_per_subtask: env_usize_or_default(RESEARCH_MAX_EVIDENCE_PER_SUBTASK, 10),
            researcher_concurrency: env_usize_or_default("RESEARCH_CONCURRENCY", 5),
        }
    }
}

/// HTTP/WS intake server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind the intake API to.
    pub host: String,
    /// Port to bind the intake API to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var(RESEARCH_SERVER_HOST).unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_u64_or_default(RESEARCH_SERVER_PORT, 8080) as u16,
        }
    }
}

/// Top-level configuration, constructed once at process startup and passed
/// by value/reference into every component. No component reads environment
/// variables directly after this value is built.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Provider Gateway policy.
    pub provider: ProviderConfig,
    /// Persistence backend selection.
    pub persistence: PersistenceConfig,
    /// Orchestrator knobs.
    pub orchestrator: OrchestratorConfig,
    /// Intake server bind address.
    pub server: ServerConfig,
}

impl Config {
    /// Build configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quality_threshold_matches_spec() {
        // Isolated from the process environment so the test is deterministic
        // regardless of what the test runner's shell has exported.
        let cfg = OrchestratorConfig {
            quality_threshold: env_f64_or_default("RESEARCH_QUALITY_THRESHOLD_TEST_UNSET", 0.75),
            ..OrchestratorConfig::default()
        };
        assert!((cfg.quality_threshold - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn provider_config_defaults_to_mock_mode_without_keys() {
        let cfg = ProviderConfig {
            api_key_text: None,
            api_key_search: None,
            ..ProviderConfig::default()
        };
        assert!(cfg.is_mock_mode());
    }

    #[test]
    fn provider_config_not_mock_when_both_keys_present() {
        let cfg = ProviderConfig {
            api_key_text: Some("k1".into()),
            api_key_search: Some("k2".into()),
            ..ProviderConfig::default()
        };
        assert!(!cfg.is_mock_mode());
    }
}
