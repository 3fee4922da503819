//! Live HTTP-backed Provider Gateway: connect/read timeouts, exponential
//! backoff on transport errors and 5xx/429, structured-output repair
//! retries, and per-capability rate limiting.
//!
//! Grounded on the teacher's HTTP client conventions
//! (`dashflow-tavily::create_http_client`, `dashflow-openai::structured`)
//! trimmed to the two opaque capabilities this system's boundary contract
//! (§6) actually names.

use crate::gateway::{validate_complete_text, validate_search_web, ProviderGateway};
use crate::rate_limiter::{RateLimit, TokenBucket};
use crate::types::{CompleteTextRequest, CompleteTextResponse, SearchHit, SearchWebRequest};
use async_trait::async_trait;
use research_core::config::ProviderConfig;
use research_core::error::{ResearchError, Result};
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

/// Wraps a [`ResearchError`] so [`tokio_retry::RetryIf`] can tell a
/// worth-retrying failure (transport error, 429, 5xx) apart from one that
/// should surface immediately.
#[derive(Debug, Clone)]
struct Attempt(ResearchError, bool);

impl Attempt {
    fn retryable(error: ResearchError) -> Self {
        Self(error, true)
    }

    fn fatal(error: ResearchError) -> Self {
        Self(error, false)
    }
}

const DEFAULT_SEARCH_BASE_URL: &str = "https://api.search.example/v1/search";
const DEFAULT_TEXT_BASE_URL: &str = "https://api.text.example/v1/complete";

/// A Provider Gateway backed by real HTTP calls to the text-completion and
/// web-search providers.
pub struct HttpProviderGateway {
    client: reqwest::Client,
    config: ProviderConfig,
    text_bucket: TokenBucket,
    search_bucket: TokenBucket,
}

impl HttpProviderGateway {
    /// Build a live gateway from configuration. Panics are not possible: a
    /// client-build failure falls back to `reqwest::Client::new()`, mirroring
    /// `dashflow-tavily::create_http_client`.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let limit = RateLimit {
            per_minute: config.rate_limit_per_minute,
            burst: config.rate_limit_burst,
        };
        Self {
            client,
            text_bucket: TokenBucket::new(limit),
            search_bucket: TokenBucket::new(limit),
            config,
        }
    }

    fn text_base_url(&self) -> &str {
        self.config
            .base_url_text
            .as_deref()
            .unwrap_or(DEFAULT_TEXT_BASE_URL)
    }

    async fn post_json(&self, url: &str, api_key: &str, body: Value) -> Result<Value> {
        let strategy = ExponentialBackoff::from_millis(200)
            .map(jitter)
            .take(self.config.max_retries as usize);

        RetryIf::spawn(
            strategy,
            || self.post_json_once(url, api_key, &body),
            |attempt: &Attempt| attempt.1,
        )
        .await
        .map_err(|attempt| attempt.0)
    }

    async fn post_json_once(&self, url: &str, api_key: &str, body: &Value) -> std::result::Result<Value, Attempt> {
        let result = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<Value>().await.map_err(|e| {
                        Attempt::fatal(ResearchError::ProviderTransportError {
                            capability: url.to_string(),
                            message: format!("invalid JSON response: {e}"),
                        })
                    });
                }
                let error = ResearchError::ProviderTransportError {
                    capability: url.to_string(),
                    message: format!("HTTP {status}"),
                };
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(url, %status, "retrying provider call");
                    Err(Attempt::retryable(error))
                } else {
                    Err(Attempt::fatal(error))
                }
            }
            Err(e) => {
                let error = ResearchError::ProviderTransportError {
                    capability: url.to_string(),
                    message: e.to_string(),
                };
                warn!(url, error = %e, "retrying provider call after transport error");
                Err(Attempt::retryable(error))
            }
        }
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn complete_text(&self, request: CompleteTextRequest) -> Result<CompleteTextResponse> {
        validate_complete_text(&request)?;
        let Some(api_key) = self.config.api_key_text.as_deref() else {
            return Err(ResearchError::InternalError(
                "HttpProviderGateway::complete_text called without a configured credential; \
                 use build_gateway() to select mock mode automatically"
                    .into(),
            ));
        };

        let max_wait = self.config.read_timeout;
        if !self.text_bucket.acquire(max_wait).await {
            return Err(ResearchError::ProviderTransportError {
                capability: "complete-text".into(),
                message: "rate limit queue wait exceeded".into(),
            });
        }

        let mut prompt = request.prompt.clone();
        let repair_attempts = if request.schema.is_some() { 1 } else { 0 };

        for attempt in 0..=repair_attempts {
            let body = serde_json::json!({
                "role": request.role,
                "prompt": prompt,
                "schema": request.schema,
            });
            let value = self.post_json(self.text_base_url(), api_key, body).await?;
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let Some(schema) = &request.schema else {
                return Ok(CompleteTextResponse { text, parsed: None });
            };

            match value.get("parsed") {
                Some(parsed) if schema_is_satisfied(schema, parsed) => {
                    return Ok(CompleteTextResponse {
                        text,
                        parsed: Some(parsed.clone()),
                    });
                }
                _ if attempt < repair_attempts => {
                    prompt = format!(
                        "{prompt}\n\nYour previous response did not match the required JSON \
                         schema. Respond again with valid JSON matching the schema exactly."
                    );
                }
                _ => {
                    return Err(ResearchError::ProviderShapeError(format!(
                        "response did not match schema after {} repair attempt(s)",
                        repair_attempts
                    )));
                }
            }
        }
        unreachable!("loop always returns before exhausting its range")
    }

    async fn search_web(&self, request: SearchWebRequest) -> Result<Vec<SearchHit>> {
        validate_search_web(&request)?;
        let Some(api_key) = self.config.api_key_search.as_deref() else {
            return Err(ResearchError::InternalError(
                "HttpProviderGateway::search_web called without a configured credential; \
                 use build_gateway() to select mock mode automatically"
                    .into(),
            ));
        };

        let max_wait = self.config.read_timeout;
        if !self.search_bucket.acquire(max_wait).await {
            return Err(ResearchError::ProviderTransportError {
                capability: "search-web".into(),
                message: "rate limit queue wait exceeded".into(),
            });
        }

        let body = serde_json::json!({
            "query": request.query,
            "max_results": request.max_results,
        });
        let value = self
            .post_json(DEFAULT_SEARCH_BASE_URL, api_key, body)
            .await?;
        let results = value
            .get("results")
            .cloned()
            .unwrap_or(Value::Array(vec![]));
        serde_json::from_value(results).map_err(|e| ResearchError::ProviderShapeError(e.to_string()))
    }

    fn is_mock(&self) -> bool {
        false
    }
}

/// Minimal shape check used to decide whether a repair retry is needed: for
/// an object schema, every required property must be present. This is
/// intentionally shallow — full JSON Schema validation is out of scope for
/// this boundary (§1 Non-goals: no byte-wise payload reproduction).
fn schema_is_satisfied(schema: &Value, value: &Value) -> bool {
    if !value.is_object() && schema.get("type").and_then(Value::as_str) == Some("object") {
        return false;
    }
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return true;
    };
    required
        .iter()
        .filter_map(Value::as_str)
        .all(|key| value.get(key).is_some())
}
