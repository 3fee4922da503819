//! Researcher stage (§4.6): for each sub-task, search the web, summarize
//! each hit via `complete-text(role=researcher, ...)`, score it, and add it
//! to the task's [`EvidenceStore`] with content-hash deduplication.

use chrono::Utc;
use futures::future::try_join_all;
use research_core::error::Result;
use research_core::evidence::{content_hash, quality_score};
use research_core::model::{Evidence, EvidenceSource, ModelRole, SubTask};
use research_provider::{CompleteTextRequest, ProviderGateway, SearchWebRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

/// Cost in budget units of one `search-web` call (§4.6).
const SEARCH_COST: u32 = 1;
/// Cost in budget units of one `complete-text` call (§4.6).
const SUMMARY_COST: u32 = 2;

/// Shared, atomically-decremented view of the Researcher's remaining
/// provider-call budget, so concurrently running sub-queries never spend
/// more than `B` units between them.
struct SharedBudget(AtomicU32);

impl SharedBudget {
    fn new(budget: u32) -> Self {
        Self(AtomicU32::new(budget))
    }

    /// Reserve `cost` units if available; returns `false` (and reserves
    /// nothing) if the remaining budget is insufficient.
    fn try_spend(&self, cost: u32) -> bool {
        loop {
            let current = self.0.load(Ordering::Acquire);
            if current < cost {
                return false;
            }
            if self
                .0
                .compare_exchange_weak(current, current - cost, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn remaining(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of one Researcher pass over a set of sub-tasks, enough for the
/// orchestrator to decrement `B` and judge whether the iteration was
/// `unproductive` (§4.9 step 5).
#[derive(Debug, Clone, Copy)]
pub struct ResearchOutcome {
    /// Evidence items newly added to the store this pass.
    pub added: usize,
    /// Whether at least one sub-query returned hits.
    pub any_succeeded: bool,
    /// Budget remaining after this pass.
    pub remaining_budget: u32,
}

fn summarize_prompt(query: &str, title: &str, excerpt: &str) -> String {
    format!(
        "Query: {query}\n\nSummarize the following source in 2-3 sentences, retaining facts \
         relevant to the query.\n\nTitle: {title}\nExcerpt: {excerpt}"
    )
}

/// Run the Researcher stage over every sub-task, bounded by `concurrency`
/// simultaneous sub-queries and by `budget` provider-call units. Stops
/// issuing new sub-queries once the remaining budget is less than the cost
/// of one `search-web` call (§4.6).
pub async fn research(
    gateway: Arc<dyn ProviderGateway>,
    query: Arc<str>,
    subtasks: Vec<SubTask>,
    store: Arc<Mutex<research_core::evidence::EvidenceStore>>,
    concurrency: usize,
    max_evidence_per_subtask: usize,
    budget: u32,
) -> Result<ResearchOutcome> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let shared_budget = Arc::new(SharedBudget::new(budget));

    let mut handles = Vec::new();
    for subtask in subtasks {
        if shared_budget.remaining() < SEARCH_COST {
            break;
        }
        let gateway = Arc::clone(&gateway);
        let query = Arc::clone(&query);
        let store = Arc::clone(&store);
        let semaphore = Arc::clone(&semaphore);
        let shared_budget = Arc::clone(&shared_budget);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            research_one_subtask(&gateway, &query, &subtask, &store, max_evidence_per_subtask, &shared_budget).await
        }));
    }

    let results = try_join_all(handles).await.map_err(|join_error| {
        research_core::error::ResearchError::InternalError(format!("researcher task panicked: {join_error}"))
    })?;

    let added = results.iter().map(|(added, _)| added).sum();
    let any_succeeded = results.iter().any(|(_, succeeded)| *succeeded);
    Ok(ResearchOutcome {
        added,
        any_succeeded,
        remaining_budget: shared_budget.remaining(),
    })
}

/// Run one sub-query. A `search-web` or `complete-text` failure is logged
/// and the sub-query is skipped rather than failing the whole pass (§4.6
/// "Failure handling"). Returns `(evidence added, whether hits came back)`.
async fn research_one_subtask(
    gateway: &Arc<dyn ProviderGateway>,
    query: &str,
    subtask: &SubTask,
    store: &Arc<Mutex<research_core::evidence::EvidenceStore>>,
    max_evidence: usize,
    budget: &SharedBudget,
) -> (usize, bool) {
    if !budget.try_spend(SEARCH_COST) {
        return (0, false);
    }

    let max_results = max_evidence.min(budget.remaining() as usize + 1).clamp(1, 50);
    let hits = match gateway
        .search_web(SearchWebRequest {
            query: subtask.description.clone(),
            max_results: max_results as u32,
        })
        .await
    {
        Ok(hits) => hits,
        Err(error) => {
            tracing::warn!(subtask = %subtask.description, %error, "search-web failed; sub-query skipped");
            return (0, false);
        }
    };
    let succeeded = !hits.is_empty();

    let mut added = 0usize;
    for hit in hits {
        if added >= max_evidence {
            break;
        }
        if !budget.try_spend(SUMMARY_COST) {
            break;
        }
        let summary = match gateway
            .complete_text(CompleteTextRequest::free_text(
                summarize_prompt(query, &hit.title, &hit.excerpt),
                ModelRole::Researcher,
            ))
            .await
        {
            Ok(response) => response.text,
            Err(error) => {
                tracing::warn!(url = %hit.url, %error, "complete-text failed; hit skipped");
                continue;
            }
        };

        let hash = content_hash(&summary, &hit.url);
        let mut guard = store.lock().await;
        if guard.snapshot().iter().any(|e| e.content_hash == hash) {
            continue;
        }

        let source = EvidenceSource {
            url: hit.url.clone(),
            title: hit.title.clone(),
            fetched_at: Utc::now(),
            published_at: hit.published,
        };
        let score = quality_score(query, &source, &summary, Utc::now());
        let citation_key = format!("S{}", guard.count() + 1);
        let evidence = Evidence {
            id: Uuid::new_v4(),
            source,
            excerpt: summary,
            content_hash: hash,
            tool_call_id: None,
            quality_score: score,
            tags: Vec::new(),
            citation_key,
        };
        if guard.add(evidence) {
            added += 1;
        }
    }
    (added, succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::evidence::EvidenceStore;
    use research_provider::MockProviderGateway;

    #[tokio::test]
    async fn research_adds_evidence_bounded_by_max_per_subtask() {
        let gateway: Arc<dyn ProviderGateway> = Arc::new(MockProviderGateway::new());
        let store = Arc::new(Mutex::new(EvidenceStore::new()));
        let subtasks = vec![SubTask {
            id: Uuid::new_v4(),
            priority: 1.0,
            description: "rust async runtimes".into(),
            originating_iteration: 1,
        }];
        let outcome = research(
            gateway,
            Arc::from("rust async runtimes"),
            subtasks,
            Arc::clone(&store),
            2,
            3,
            100,
        )
        .await
        .unwrap();

        let guard = store.lock().await;
        assert!(guard.count() <= 3);
        assert!(guard.count() > 0);
        assert_eq!(outcome.added, guard.count());
        assert!(outcome.any_succeeded);
    }

    #[tokio::test]
    async fn research_runs_multiple_subtasks_concurrently_without_losing_evidence() {
        let gateway: Arc<dyn ProviderGateway> = Arc::new(MockProviderGateway::new());
        let store = Arc::new(Mutex::new(EvidenceStore::new()));
        let subtasks = (0..4)
            .map(|i| SubTask {
                id: Uuid::new_v4(),
                priority: 0.5,
                description: format!("distinct sub-query {i}"),
                originating_iteration: 1,
            })
            .collect();
        research(gateway, Arc::from("topic"), subtasks, Arc::clone(&store), 2, 2, 100)
            .await
            .unwrap();
        let guard = store.lock().await;
        assert!(guard.count() >= 4);
    }

    #[tokio::test]
    async fn zero_budget_stops_before_any_sub_query_runs() {
        let gateway: Arc<dyn ProviderGateway> = Arc::new(MockProviderGateway::new());
        let store = Arc::new(Mutex::new(EvidenceStore::new()));
        let subtasks = vec![SubTask {
            id: Uuid::new_v4(),
            priority: 1.0,
            description: "anything".into(),
            originating_iteration: 1,
        }];
        let outcome = research(gateway, Arc::from("topic"), subtasks, Arc::clone(&store), 2, 3, 0)
            .await
            .unwrap();
        assert_eq!(outcome.added, 0);
        assert!(!outcome.any_succeeded);
        assert_eq!(outcome.remaining_budget, 0);
    }

    #[tokio::test]
    async fn tight_budget_limits_number_of_subqueries_serviced() {
        let gateway: Arc<dyn ProviderGateway> = Arc::new(MockProviderGateway::new());
        let store = Arc::new(Mutex::new(EvidenceStore::new()));
        let subtasks = (0..5)
            .map(|i| SubTask {
                id: Uuid::new_v4(),
                priority: 0.5,
                description: format!("sub-query {i}"),
                originating_iteration: 1,
            })
            .collect();
        // Budget only covers one search-web call; no sub-query can afford
        // even a single complete-text summary on top of it.
        let outcome = research(gateway, Arc::from("topic"), subtasks, Arc::clone(&store), 5, 2, 1)
            .await
            .unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.remaining_budget, 0);
    }
}
