//! The Orchestrator (§4.9): drives one task through
//! [`OrchestratorState`] from `Init` to `Done`/`Failed`, persisting status
//! transitions and publishing progress events at each stage boundary.

use crate::state::OrchestratorState;
use crate::{evaluator, planner, researcher, writer};
use chrono::Utc;
use research_core::config::OrchestratorConfig;
use research_core::error::{ResearchError, Result};
use research_core::evidence::EvidenceStore;
use research_core::model::{EvaluationResult, EventKind, QualityMetrics, ResearchSummary, ResearchTask, TaskKind, TaskStatus};
use research_persistence::PersistenceBackend;
use research_progress::ProgressBus;
use research_provider::ProviderGateway;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Owns the stage implementations and drives the state machine for tasks
/// handed to it by [`crate::pool::WorkerPool`].
pub struct Orchestrator {
    gateway: Arc<dyn ProviderGateway>,
    persistence: Arc<dyn PersistenceBackend>,
    progress: Arc<ProgressBus>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Construct an orchestrator from its three collaborators and knobs.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        persistence: Arc<dyn PersistenceBackend>,
        progress: Arc<ProgressBus>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            persistence,
            progress,
            config,
        }
    }

    /// Run one task to completion or failure, honoring `cancelled` and the
    /// configured per-task deadline. Never panics: all stage errors are
    /// caught and translated into a `Failed` task record plus a `failed`
    /// progress event.
    pub async fn run(&self, mut task: ResearchTask, cancelled: Arc<AtomicBool>) {
        let deadline = self.config.default_task_timeout;
        match tokio::time::timeout(deadline, self.run_inner(&mut task, cancelled.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.fail(&mut task, error).await,
            Err(_elapsed) => self.fail(&mut task, ResearchError::DeadlineExceeded).await,
        }
    }

    fn check_cancelled(&self, cancelled: &AtomicBool) -> Result<()> {
        if cancelled.load(Ordering::Acquire) {
            Err(ResearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn publish(&self, task_id: Uuid, kind: EventKind, message: impl Into<String>) {
        self.progress.publish(task_id, kind, message, None);
    }

    async fn run_inner(&self, task: &mut ResearchTask, cancelled: &AtomicBool) -> Result<()> {
        let started_at = Utc::now();
        task.status = TaskStatus::Running;
        task.started_at = Some(started_at);
        self.persistence.update_task(task.clone()).await?;
        self.publish(task.id, EventKind::Started, "orchestration started");

        let mut state = OrchestratorState::Init;
        let mut budget = task.config.budget;
        let evidence_store = Arc::new(Mutex::new(EvidenceStore::new()));
        let mut gaps: Vec<String> = Vec::new();
        let mut gaps_identified_overall: Vec<String> = Vec::new();
        let mut last_evaluation: Option<EvaluationResult> = None;
        let mut unproductive = false;

        loop {
            self.check_cancelled(cancelled)?;
            state = match state {
                OrchestratorState::Init => OrchestratorState::Planning,

                OrchestratorState::Planning => {
                    if budget == 0 {
                        OrchestratorState::Writing
                    } else {
                        OrchestratorState::Iteration(1)
                    }
                }

                OrchestratorState::Iteration(k) => {
                    self.publish(task.id, EventKind::Iteration, format!("iteration {k}"));
                    let subtasks = planner::plan(self.gateway.as_ref(), &task.query, k, &gaps).await?;

                    let outcome = researcher::research(
                        Arc::clone(&self.gateway),
                        Arc::from(task.query.as_str()),
                        subtasks,
                        Arc::clone(&evidence_store),
                        self.config.researcher_concurrency,
                        self.config.max_evidence_per_subtask,
                        budget,
                    )
                    .await?;
                    budget = outcome.remaining_budget;
                    unproductive = outcome.added == 0 && !outcome.any_succeeded;

                    let count = evidence_store.lock().await.count();
                    self.publish(task.id, EventKind::Evidence, format!("{count} evidence items retained"));

                    if budget == 0 {
                        OrchestratorState::Writing
                    } else {
                        OrchestratorState::Evaluating(k)
                    }
                }

                OrchestratorState::Evaluating(k) => {
                    self.publish(task.id, EventKind::Evaluation, "scoring accumulated evidence");
                    let snapshot = evidence_store.lock().await.snapshot().to_vec();
                    let evaluation = evaluator::evaluate(self.gateway.as_ref(), &task.query, &snapshot).await?;
                    let converged = task.kind == TaskKind::Simple
                        || evaluation.score >= task.config.min_completion_score
                        || k >= task.config.max_iterations
                        || unproductive;
                    last_evaluation = Some(evaluation);
                    if converged {
                        OrchestratorState::Writing
                    } else {
                        OrchestratorState::GapAnalysis(k)
                    }
                }

                OrchestratorState::GapAnalysis(k) => {
                    let evaluation = last_evaluation.clone().ok_or_else(|| {
                        ResearchError::InternalError("gap analysis reached without a prior evaluation".into())
                    })?;
                    self.publish(task.id, EventKind::GapAnalysis, format!("{} gaps identified", evaluation.gaps.len()));
                    gaps_identified_overall.extend(evaluation.gaps);
                    OrchestratorState::Refinement(k)
                }

                OrchestratorState::Refinement(k) => {
                    let evaluation = last_evaluation.clone().ok_or_else(|| {
                        ResearchError::InternalError("refinement reached without a prior evaluation".into())
                    })?;
                    // Resolved Open Question: refinement queries replace the
                    // prior iteration's queries rather than accumulating.
                    gaps = evaluation.refinements;
                    self.publish(task.id, EventKind::Refinement, format!("{} refinement queries chosen", gaps.len()));
                    OrchestratorState::Iteration(k + 1)
                }

                OrchestratorState::Writing => {
                    self.publish(task.id, EventKind::ReportGeneration, "synthesizing report");
                    self.finish(task, &evidence_store, last_evaluation.as_ref(), &gaps_identified_overall, started_at)
                        .await?;
                    OrchestratorState::Done
                }

                OrchestratorState::Done | OrchestratorState::Failed => break,
            };
        }
        Ok(())
    }

    async fn finish(
        &self,
        task: &mut ResearchTask,
        evidence_store: &Arc<Mutex<EvidenceStore>>,
        last_evaluation: Option<&EvaluationResult>,
        gaps_identified_overall: &[String],
        started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let guard = evidence_store.lock().await;
        let snapshot = guard.snapshot().to_vec();
        let sources_summary = guard.sources_summary();
        drop(guard);

        let is_deep = task.kind == TaskKind::Deep;
        let summary = is_deep.then(|| ResearchSummary {
            iterations_completed: last_evaluation.map_or(1, |_| 1).max(1),
            gaps_identified: gaps_identified_overall.to_vec(),
            key_findings: snapshot.iter().take(5).map(|e| e.excerpt.clone()).collect(),
        });
        let duration_secs = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;
        let metrics = is_deep
            .then(|| last_evaluation.map(|evaluation| QualityMetrics {
                completion_score: evaluation.score,
                evidence_count: snapshot.len() as u32,
                execution_duration_secs: duration_secs,
            }))
            .flatten();

        let (mut report, stripped_citations) =
            writer::write(self.gateway.as_ref(), &task.query, &snapshot, summary, metrics).await?;
        report.task_id = task.id;

        if !stripped_citations.is_empty() {
            self.publish(
                task.id,
                EventKind::Warning,
                format!("stripped {} unresolved citation(s) from report: {}", stripped_citations.len(), stripped_citations.join(", ")),
            );
        }

        let degraded = self.persistence.create_report(report).await.is_err();
        if degraded {
            tracing::warn!(task_id = %task.id, "failed to persist report; marking task completed-degraded");
        }

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.evidence_count = Some(snapshot.len() as u32);
        task.sources_summary = Some(sources_summary);
        task.details = degraded.then(|| "completed-degraded".to_string());
        let _ = self.persistence.update_task(task.clone()).await;

        self.publish(task.id, EventKind::Completed, "orchestration finished");
        Ok(())
    }

    async fn fail(&self, task: &mut ResearchTask, error: ResearchError) {
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now());
        task.details = Some(error.reason_code().to_string());
        let _ = self.persistence.update_task(task.clone()).await;
        self.publish(task.id, EventKind::Failed, error.to_string());
    }
}
