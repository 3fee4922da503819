//! Writer stage (§4.8): synthesize the final markdown report body via
//! `complete-text(role=writer, ...)`. The bibliography is assembled
//! deterministically from the evidence snapshot's citation keys rather than
//! left to the model, so `[key]` markers in the body always resolve.

use research_core::error::Result;
use research_core::model::{Evidence, ModelRole, QualityMetrics, Report, ResearchSummary};
use research_provider::{CompleteTextRequest, ProviderGateway};
use std::collections::HashSet;

fn prompt(query: &str, evidence: &[Evidence]) -> String {
    let bullets: Vec<String> = evidence
        .iter()
        .map(|e| format!("- [{}] {}", e.citation_key, e.excerpt))
        .collect();
    format!(
        "Write a well-organized markdown report answering the query below, citing sources \
         inline with their bracketed key (e.g. [S1]). Do not include a bibliography section; \
         one will be appended separately. Only cite keys listed below; do not invent others.\n\n\
         Query: {query}\n\nEvidence:\n{}",
        bullets.join("\n")
    )
}

fn render_bibliography(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return String::new();
    }
    let mut lines = vec!["## Sources".to_string()];
    for item in evidence {
        lines.push(format!("- [{}] {} — {}", item.citation_key, item.source.title, item.source.url));
    }
    lines.join("\n")
}

/// Strip `[key]` mentions that don't resolve against `valid_keys`, so the
/// model can never cite a source outside the closed vocabulary it was given
/// (§4.8). Returns the cleaned body plus the list of keys that were removed.
fn strip_unresolved_citations(body: &str, valid_keys: &HashSet<&str>) -> (String, Vec<String>) {
    let mut result = String::with_capacity(body.len());
    let mut stripped = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find('[') {
        result.push_str(&rest[..start]);
        let after_bracket = &rest[start + 1..];
        let Some(end) = after_bracket.find(']') else {
            result.push('[');
            rest = after_bracket;
            continue;
        };
        let key = &after_bracket[..end];
        let is_key_shaped = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_key_shaped {
            result.push('[');
            rest = after_bracket;
            continue;
        }
        if valid_keys.contains(key) {
            result.push('[');
            result.push_str(key);
            result.push(']');
        } else {
            stripped.push(key.to_string());
        }
        rest = &after_bracket[end + 1..];
    }
    result.push_str(rest);
    (result, stripped)
}

/// Synthesize the final report for a completed or gracefully-degraded task.
/// Returns the report alongside any citation keys stripped from the body
/// because they didn't resolve against the evidence snapshot, so the caller
/// can emit a warning event.
pub async fn write(
    gateway: &dyn ProviderGateway,
    query: &str,
    evidence: &[Evidence],
    summary: Option<ResearchSummary>,
    metrics: Option<QualityMetrics>,
) -> Result<(Report, Vec<String>)> {
    let response = gateway
        .complete_text(CompleteTextRequest::free_text(prompt(query, evidence), ModelRole::Writer))
        .await?;

    let valid_keys: HashSet<&str> = evidence.iter().map(|e| e.citation_key.as_str()).collect();
    let (markdown_body, stripped) = strip_unresolved_citations(&response.text, &valid_keys);

    let report = Report {
        task_id: uuid::Uuid::nil(), // overwritten by the caller, which owns the task id
        markdown_body,
        bibliography: render_bibliography(evidence),
        summary,
        metrics,
    };
    Ok((report, stripped))
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
                url: "https://example.com/a".into(),
                title: "Example".into(),
                fetched_at: Utc::now(),
                published_at: None,
            },
            excerpt: "excerpt text".into(),
            content_hash: "hash".into(),
            tool_call_id: None,
            quality_score: 0.8,
            tags: vec![],
            citation_key: "S1".into(),
        }]
    }

    #[tokio::test]
    async fn write_produces_nonempty_body_and_matching_bibliography() {
        let gateway = MockProviderGateway::new();
        let evidence = sample_evidence();
        let (report, stripped) = write(&gateway, "a query", &evidence, None, None).await.unwrap();
        assert!(!report.markdown_body.is_empty());
        assert!(report.bibliography.contains("S1"));
        assert!(report.bibliography.contains("https://example.com/a"));
        assert!(stripped.is_empty());
    }

    #[tokio::test]
    async fn write_on_empty_evidence_has_empty_bibliography() {
        let gateway = MockProviderGateway::new();
        let (report, _stripped) = write(&gateway, "a query", &[], None, None).await.unwrap();
        assert!(report.bibliography.is_empty());
    }

    #[test]
    fn strip_unresolved_citations_removes_unknown_keys_only() {
        let valid: HashSet<&str> = ["S1"].into_iter().collect();
        let body = "Fact one [S1]. Fabricated fact [S9]. Also see [not-a-key-shape still text.";
        let (cleaned, stripped) = strip_unresolved_citations(body, &valid);
        assert!(cleaned.contains("[S1]"));
        assert!(!cleaned.contains("[S9]"));
        assert_eq!(stripped, vec!["S9".to_string()]);
    }

    #[test]
    fn strip_unresolved_citations_is_a_no_op_on_fully_resolved_body() {
        let valid: HashSet<&str> = ["S1", "S2"].into_iter().collect();
        let body = "See [S1] and [S2] for details.";
        let (cleaned, stripped) = strip_unresolved_citations(body, &valid);
        assert_eq!(cleaned, body);
        assert!(stripped.is_empty());
    }
}
