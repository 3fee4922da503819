//! Mock-mode Provider Gateway: deterministic synthetic output with the same
//! shape as the live gateway, selected when credentials are absent (§4.1,
//! §9 Open Question: mock output is seeded for reproducibility).

use crate::gateway::{validate_complete_text, validate_search_web, ProviderGateway};
use crate::types::{CompleteTextRequest, CompleteTextResponse, SearchHit, SearchWebRequest};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use research_core::error::Result;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Derive a stable 64-bit seed from arbitrary text, so the same prompt or
/// query always produces the same synthetic output across runs.
fn seed_from_text(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    u64::from_be_bytes(digest[0..8].try_into().unwrap_or([0; 8]))
}

/// Synthesize a value conforming to a (subset of) JSON Schema, used to
/// produce deterministic structured mock responses without depending on any
/// one stage's concrete schema shape.
fn synthesize_from_schema(schema: &Value, rng: &mut StdRng, path_hint: &str) -> Value {
    if let Some(enum_values) = schema.get("enum").and_then(Value::as_array) {
        if !enum_values.is_empty() {
            let idx = rng.gen_range(0..enum_values.len());
            return enum_values[idx].clone();
        }
    }

    let ty = schema.get("type").and_then(Value::as_str).unwrap_or("object");
    match ty {
        "object" => {
            let mut map = Map::new();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (key, sub_schema) in props {
                    let child_hint = format!("{path_hint}.{key}");
                    map.insert(
                        key.clone(),
                        synthesize_from_schema(sub_schema, rng, &child_hint),
                    );
                }
            }
            Value::Object(map)
        }
        "array" => {
            let item_schema = schema.get("items").cloned().unwrap_or(Value::Bool(true));
            let min_items = schema
                .get("minItems")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .max(1) as usize;
            let max_items = schema
                .get("maxItems")
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .unwrap_or(min_items + 1)
                .max(min_items);
            let count = rng.gen_range(min_items..=max_items);
            (0..count)
                .map(|i| synthesize_from_schema(&item_schema, rng, &format!("{path_hint}[{i}]")))
                .collect()
        }
        "integer" => {
            let min = schema.get("minimum").and_then(Value::as_i64).unwrap_or(0);
            let max = schema.get("maximum").and_then(Value::as_i64).unwrap_or(min + 10);
            Value::from(if max > min { rng.gen_range(min..=max) } else { min })
        }
        "number" => {
            let min = schema.get("minimum").and_then(Value::as_f64).unwrap_or(0.0);
            let max = schema.get("maximum").and_then(Value::as_f64).unwrap_or(1.0);
            let value = if max > min { rng.gen_range(min..max) } else { min };
            Value::from(value)
        }
        "boolean" => Value::Bool(rng.gen_bool(0.5)),
        _ => Value::String(format!("mock-{path_hint}")),
    }
}

/// A Provider Gateway operating without credentials: deterministic,
/// network-free, same response shape as the live gateway.
#[derive(Debug, Default, Clone)]
pub struct MockProviderGateway;

impl MockProviderGateway {
    /// Construct a mock gateway.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderGateway for MockProviderGateway {
    async fn complete_text(&self, request: CompleteTextRequest) -> Result<CompleteTextResponse> {
        validate_complete_text(&request)?;
        let seed = seed_from_text(&request.prompt);
        let mut rng = StdRng::seed_from_u64(seed);

        if let Some(schema) = &request.schema {
            let parsed = synthesize_from_schema(schema, &mut rng, "root");
            let text = serde_json::to_string(&parsed).unwrap_or_default();
            return Ok(CompleteTextResponse {
                text,
                parsed: Some(parsed),
            });
        }

        let text = format!(
            "Mock {role:?} response for prompt of {len} characters (seed {seed}).",
            role = request.role,
            len = request.prompt.len(),
        );
        Ok(CompleteTextResponse { text, parsed: None })
    }

    async fn search_web(&self, request: SearchWebRequest) -> Result<Vec<SearchHit>> {
        validate_search_web(&request)?;
        let seed = seed_from_text(&request.query);
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Utc::now();
        let hits = (0..request.max_results)
            .map(|i| {
                let age_days = rng.gen_range(0..600);
                SearchHit {
                    url: format!("https://mock-source-{i}.example/{seed:x}"),
                    title: format!("Mock result {i} for \"{}\"", request.query),
                    excerpt: format!(
                        "Synthetic excerpt discussing {} in a way relevant to result {i}.",
                        request.query
                    ),
                    published: Some(now - chrono::Duration::days(age_days)),
                }
            })
            .collect();
        Ok(hits)
    }

    fn is_mock(&self) -> bool {
        true
    }
}
