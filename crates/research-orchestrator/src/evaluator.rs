//! Evaluator stage (§4.7): score accumulated evidence against the query
//! across five equal-weighted dimensions (SPEC_FULL.md §9 Open Question 2),
//! and surface named gaps with candidate refinement queries.

use research_core::error::Result;
use research_core::model::{CompletionLevel, DimensionScores, Evidence, EvaluationResult, ModelRole};
use research_provider::{CompleteTextRequest, ProviderGateway};

fn schema() -> serde_json::Value {
    let dim = serde_json::json!({"type": "number", "minimum": 0.0, "maximum": 1.0});
    serde_json::json!({
        "type": "object",
        "required": ["dimensions", "gaps", "refinements"],
        "properties": {
            "dimensions": {
                "type": "object",
                "required": ["factual_coverage", "source_diversity", "temporal_coverage", "perspective_balance", "depth"],
                "properties": {
                    "factual_coverage": dim,
                    "source_diversity": dim,
                    "temporal_coverage": dim,
                    "perspective_balance": dim,
                    "depth": dim,
                }
            },
            "gaps": {"type": "array", "items": {"type": "string"}, "minItems": 0, "maxItems": 5},
            "refinements": {"type": "array", "items": {"type": "string"}, "minItems": 0, "maxItems": 5}
        }
    })
}

fn prompt(query: &str, evidence: &[Evidence]) -> String {
    let bullets: Vec<String> = evidence
        .iter()
        .map(|e| format!("- [{}] {}", e.citation_key, e.excerpt))
        .collect();
    format!(
        "Query: {query}\n\nEvaluate how completely the following evidence answers the query, \
         scoring five dimensions in [0,1] and listing any gaps with refinement queries to close \
         them.\n\nEvidence:\n{}",
        bullets.join("\n")
    )
}

fn parse_dimensions(value: &serde_json::Value) -> DimensionScores {
    let get = |key: &str| value.get(key).and_then(serde_json::Value::as_f64).unwrap_or(0.5);
    DimensionScores {
        factual_coverage: get("factual_coverage"),
        source_diversity: get("source_diversity"),
        temporal_coverage: get("temporal_coverage"),
        perspective_balance: get("perspective_balance"),
        depth: get("depth"),
    }
}

fn parse_strings(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Score the current evidence set against `query`.
pub async fn evaluate(gateway: &dyn ProviderGateway, query: &str, evidence: &[Evidence]) -> Result<EvaluationResult> {
    let request = CompleteTextRequest::structured(prompt(query, evidence), ModelRole::Evaluator, schema());
    let response = gateway.complete_text(request).await?;
    let parsed = response.parsed.unwrap_or(serde_json::json!({}));

    let dimensions = parsed
        .get("dimensions")
        .map(parse_dimensions)
        .unwrap_or(DimensionScores {
            factual_coverage: 0.5,
            source_diversity: 0.5,
            temporal_coverage: 0.5,
            perspective_balance: 0.5,
            depth: 0.5,
        });
    let score = dimensions.overall();

    Ok(EvaluationResult {
        score,
        level: CompletionLevel::from_score(score),
        dimensions,
        gaps: parse_strings(&parsed, "gaps"),
        refinements: parse_strings(&parsed, "refinements"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research_core::model::EvidenceSource;
    use research_provider::MockProviderGateway;
    use uuid::Uuid;

    fn sample_evidence() -> Vec<Evidence> {
        vec![Evidence {
            id: Uuid::new_v4(),
            source: EvidenceSource {
                url: "https://example.com".into(),
                title: "Title".into(),
                fetched_at: Utc::now(),
                published_at: None,
            },
            excerpt: "Some evidence excerpt.".into(),
            content_hash: "hash".into(),
            tool_call_id: None,
            quality_score: 0.7,
            tags: vec![],
            citation_key: "S1".into(),
        }]
    }

    #[tokio::test]
    async fn evaluate_returns_score_in_unit_interval() {
        let gateway = MockProviderGateway::new();
        let result = evaluate(&gateway, "a query", &sample_evidence()).await.unwrap();
        assert!((0.0..=1.0).contains(&result.score));
        assert_eq!(result.level, CompletionLevel::from_score(result.score));
    }

    #[tokio::test]
    async fn evaluate_on_empty_evidence_still_parses() {
        let gateway = MockProviderGateway::new();
        let result = evaluate(&gateway, "a query", &[]).await.unwrap();
        assert!((0.0..=1.0).contains(&result.score));
    }
}
