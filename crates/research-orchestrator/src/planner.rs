//! Planner stage (§4.5): decompose the original query into prioritized
//! sub-tasks via a structured `complete-text(role=planner, ...)` call.

use research_core::error::Result;
use research_core::model::{ModelRole, SubTask};
use research_provider::{CompleteTextRequest, ProviderGateway};
use std::collections::HashSet;
use uuid::Uuid;

/// Minimum sub-tasks a valid plan must contain (§4.5 / §3).
const MIN_SUBTASKS: usize = 3;
/// Maximum sub-tasks a valid plan may contain (§4.5 / §3).
const MAX_SUBTASKS: usize = 8;

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "subtasks": {
                "type": "array",
                "minItems": MIN_SUBTASKS,
                "maxItems": MAX_SUBTASKS,
                "items": {
                    "type": "object",
                    "required": ["description", "priority"],
                    "properties": {
                        "description": {"type": "string"},
                        "priority": {"type": "number", "minimum": 0.0, "maximum": 1.0}
                    }
                }
            }
        },
        "required": ["subtasks"]
    })
}

fn prompt(query: &str, iteration: u32, prior_gaps: &[String]) -> String {
    if prior_gaps.is_empty() {
        format!(
            "Decompose the following research query into {MIN_SUBTASKS}-{MAX_SUBTASKS} prioritized, \
             non-overlapping sub-tasks.\n\nQuery: {query}"
        )
    } else {
        format!(
            "Refine the sub-tasks for iteration {iteration} of the following research query, \
             producing {MIN_SUBTASKS}-{MAX_SUBTASKS} non-overlapping sub-tasks, \
             focusing on these previously identified gaps: {}.\n\nQuery: {query}",
            prior_gaps.join("; ")
        )
    }
}

fn parse_subtasks(parsed: Option<&serde_json::Value>, iteration: u32) -> Vec<SubTask> {
    parsed
        .and_then(|v| v.get("subtasks"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let description = item.get("description")?.as_str()?.to_string();
                    let priority = item.get("priority").and_then(serde_json::Value::as_f64).unwrap_or(0.5);
                    Some(SubTask {
                        id: Uuid::new_v4(),
                        priority,
                        description,
                        originating_iteration: iteration,
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Validate a parsed plan against the §4.5 contract: size in `[3,8]`,
/// priorities in `[0,1]`, no empty descriptions, no duplicate descriptions
/// (case-insensitive). Returns a description of the violation on failure, so
/// the caller can cite it in a re-prompt.
fn validate_subtasks(subtasks: &[SubTask]) -> std::result::Result<(), String> {
    if !(MIN_SUBTASKS..=MAX_SUBTASKS).contains(&subtasks.len()) {
        return Err(format!(
            "plan must contain {MIN_SUBTASKS}-{MAX_SUBTASKS} sub-tasks, got {}",
            subtasks.len()
        ));
    }
    if subtasks.iter().any(|s| s.description.trim().is_empty()) {
        return Err("sub-task descriptions must not be empty".to_string());
    }
    if let Some(bad) = subtasks.iter().find(|s| !(0.0..=1.0).contains(&s.priority)) {
        return Err(format!("priority must be in [0,1], got {}", bad.priority));
    }
    let mut seen = HashSet::new();
    for subtask in subtasks {
        let normalized = subtask.description.trim().to_lowercase();
        if !seen.insert(normalized) {
            return Err(format!("duplicate sub-task description: \"{}\"", subtask.description));
        }
    }
    Ok(())
}

fn fallback_plan(query: &str, iteration: u32) -> Vec<SubTask> {
    vec![SubTask {
        id: Uuid::new_v4(),
        priority: 1.0,
        description: query.to_string(),
        originating_iteration: iteration,
    }]
}

/// Decompose `query` into sub-tasks for the given iteration. On a contract
/// violation (wrong size, empty/duplicate descriptions, out-of-range
/// priorities), re-prompts once citing the violation; if the repaired
/// response still violates the contract, falls back to a deterministic
/// single-subtask plan carrying the raw query (§4.5).
pub async fn plan(
    gateway: &dyn ProviderGateway,
    query: &str,
    iteration: u32,
    prior_gaps: &[String],
) -> Result<Vec<SubTask>> {
    let request = CompleteTextRequest::structured(prompt(query, iteration, prior_gaps), ModelRole::Planner, schema());
    let response = gateway.complete_text(request).await?;
    let subtasks = parse_subtasks(response.parsed.as_ref(), iteration);

    if let Err(violation) = validate_subtasks(&subtasks) {
        tracing::warn!(%violation, "planner output violated plan contract; re-prompting once");
        let retry_prompt = format!(
            "{}\n\nYour previous answer was invalid: {violation}. Produce exactly \
             {MIN_SUBTASKS}-{MAX_SUBTASKS} sub-tasks with unique, non-empty descriptions and \
             priorities in [0,1].",
            prompt(query, iteration, prior_gaps)
        );
        let retry_request = CompleteTextRequest::structured(retry_prompt, ModelRole::Planner, schema());
        let retry_response = gateway.complete_text(retry_request).await?;
        let retry_subtasks = parse_subtasks(retry_response.parsed.as_ref(), iteration);

        return match validate_subtasks(&retry_subtasks) {
            Ok(()) => Ok(retry_subtasks),
            Err(second_violation) => {
                tracing::warn!(
                    violation = %second_violation,
                    "planner repair attempt also violated plan contract; falling back to single-subtask plan"
                );
                Ok(fallback_plan(query, iteration))
            }
        };
    }
    Ok(subtasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_provider::MockProviderGateway;

    #[tokio::test]
    async fn plan_produces_a_plan_sized_within_contract() {
        let gateway = MockProviderGateway::new();
        let subtasks = plan(&gateway, "impact of remote work on cities", 1, &[]).await.unwrap();
        assert!(subtasks.len() >= MIN_SUBTASKS || subtasks.len() == 1);
        assert!(subtasks.len() <= MAX_SUBTASKS);
    }

    #[tokio::test]
    async fn refinement_prompt_mentions_prior_gaps() {
        let gateway = MockProviderGateway::new();
        let gaps = vec!["missing recent data".to_string()];
        let subtasks = plan(&gateway, "topic", 2, &gaps).await.unwrap();
        assert!(!subtasks.is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_size() {
        let too_few = vec![
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "a".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "b".into(), originating_iteration: 1 },
        ];
        assert!(validate_subtasks(&too_few).is_err());
    }

    #[test]
    fn validate_rejects_duplicate_descriptions_case_insensitively() {
        let subtasks = vec![
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "Remote Work Trends".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "remote work trends".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "Housing prices".into(), originating_iteration: 1 },
        ];
        assert!(validate_subtasks(&subtasks).is_err());
    }

    #[test]
    fn validate_rejects_empty_description() {
        let subtasks = vec![
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "  ".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "b".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "c".into(), originating_iteration: 1 },
        ];
        assert!(validate_subtasks(&subtasks).is_err());
    }

    #[test]
    fn validate_accepts_a_well_formed_plan() {
        let subtasks = vec![
            SubTask { id: Uuid::new_v4(), priority: 0.9, description: "a".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.5, description: "b".into(), originating_iteration: 1 },
            SubTask { id: Uuid::new_v4(), priority: 0.1, description: "c".into(), originating_iteration: 1 },
        ];
        assert!(validate_subtasks(&subtasks).is_ok());
    }
}
