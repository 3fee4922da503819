//! Request/response shapes for the two Provider Gateway capabilities.

use chrono::{DateTime, Utc};
use research_core::model::ModelRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `complete-text(prompt, model-role, schema?)` request.
#[derive(Debug, Clone)]
pub struct CompleteTextRequest {
    /// Non-empty prompt text.
    pub prompt: String,
    /// Which logical role this call plays (maps to a configured model).
    pub role: ModelRole,
    /// Optional JSON Schema the response must be parsed into.
    pub schema: Option<Value>,
}

impl CompleteTextRequest {
    /// Build a free-text request (no structured output required).
    #[must_use]
    pub fn free_text(prompt: impl Into<String>, role: ModelRole) -> Self {
        Self {
            prompt: prompt.into(),
            role,
            schema: None,
        }
    }

    /// Build a structured-output request.
    #[must_use]
    pub fn structured(prompt: impl Into<String>, role: ModelRole, schema: Value) -> Self {
        Self {
            prompt: prompt.into(),
            role,
            schema: Some(schema),
        }
    }
}

/// `complete-text` response: free text, plus the parsed value when a schema
/// was supplied and parsing succeeded.
#[derive(Debug, Clone)]
pub struct CompleteTextResponse {
    /// Raw model text.
    pub text: String,
    /// Parsed structured output, present iff a schema was requested.
    pub parsed: Option<Value>,
}

/// `search-web(query, max-results)` request.
#[derive(Debug, Clone)]
pub struct SearchWebRequest {
    /// Search query text.
    pub query: String,
    /// Desired result count, must be in `[1, 50]`.
    pub max_results: u32,
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL.
    pub url: String,
    /// Result title.
    pub title: String,
    /// Snippet/excerpt text.
    pub excerpt: String,
    /// Publish date, if the provider returned one.
    pub published: Option<DateTime<Utc>>,
}
