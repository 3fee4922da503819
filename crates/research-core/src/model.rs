//! Data model shared by every component: [`ResearchTask`], [`SubTask`],
//! [`Evidence`], [`EvaluationResult`], [`ProgressEvent`], [`Report`], and
//! [`LogRecord`], matching the design's data-model section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Kind of research task: `simple` always runs exactly one iteration,
/// `deep` iterates up to `max_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// One-iteration research request.
    Simple,
    /// Iterative research request, up to `max_iterations` passes.
    Deep,
}

/// Task lifecycle status. No transitions out of a terminal state
/// (`Completed` / `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created on intake, not yet picked up by a worker.
    Accepted,
    /// Orchestrator is actively driving the state machine.
    Running,
    /// Report generated and persisted.
    Completed,
    /// Terminal error; no report was written.
    Failed,
}

impl TaskStatus {
    /// Whether this status accepts no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Configuration snapshot captured at intake time and frozen for the life
/// of the task (§3: "configuration snapshot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// `K_max`: maximum iterations. Always 1 for `simple` tasks.
    pub max_iterations: u32,
    /// `θ`: minimum completion score that ends iteration early.
    pub min_completion_score: f64,
    /// `B`: starting provider-call budget.
    pub budget: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            min_completion_score: 0.75,
            budget: 100,
        }
    }
}

/// A researched task tracked from intake through completion or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTask {
    /// Stable unique identifier.
    pub id: Uuid,
    /// Original natural-language query.
    pub query: String,
    /// `simple` or `deep`.
    pub kind: TaskKind,
    /// Frozen configuration snapshot.
    pub config: TaskConfig,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// When the task record was created.
    pub created_at: DateTime<Utc>,
    /// When the task record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When the orchestrator began running the task, if it has started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal evidence count, populated once the task finishes.
    pub evidence_count: Option<u32>,
    /// Terminal sources summary, populated once the task finishes.
    pub sources_summary: Option<String>,
    /// Free-form detail for terminal states: degradation markers
    /// (`completed-degraded`) or failure reasons (`cancelled`,
    /// `deadline-exceeded`, …).
    pub details: Option<String>,
}

impl ResearchTask {
    /// Construct a new task in the `Accepted` state.
    #[must_use]
    pub fn new(query: String, kind: TaskKind, config: TaskConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            kind,
            config,
            status: TaskStatus::Accepted,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            evidence_count: None,
            sources_summary: None,
            details: None,
        }
    }
}

/// One decomposition leaf of the original query produced by the Planner.
/// Lives only in memory for a single orchestration; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Stable identifier within the owning task.
    pub id: Uuid,
    /// Relative priority in `[0.0, 1.0]`.
    pub priority: f64,
    /// Textual description of the sub-task's research goal.
    pub description: String,
    /// Iteration (1-based) that produced this sub-task.
    pub originating_iteration: u32,
}

/// A source reference attached to an [`Evidence`] item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    /// Source URL.
    pub url: String,
    /// Source title, if the provider returned one.
    pub title: String,
    /// When the evidence was fetched (not the source's publish date).
    pub fetched_at: DateTime<Utc>,
    /// Source's own published timestamp, if known.
    pub published_at: Option<DateTime<Utc>>,
}

/// A single retained `{source, excerpt, score}` record about the query.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Stable identifier within the owning task.
    pub id: Uuid,
    /// Where this evidence came from.
    pub source: EvidenceSource,
    /// The retained excerpt text.
    pub excerpt: String,
    /// Digest of the normalized excerpt, used for deduplication.
    pub content_hash: String,
    /// Identifier of the provider call that produced this excerpt, if any.
    pub tool_call_id: Option<String>,
    /// Quality score in `[0.0, 1.0]`, computed once at insertion.
    pub quality_score: f64,
    /// Unordered set of free-form tags.
    pub tags: Vec<String>,
    /// Key used to cite this evidence in the final report, e.g. `"S3"`.
    pub citation_key: String,
}

/// Narrative completion band derived from [`EvaluationResult::score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionLevel {
    /// score < 0.5
    Insufficient,
    /// 0.5 <= score < 0.75
    Partial,
    /// 0.75 <= score < 0.9
    Substantial,
    /// 0.9 <= score <= 1.0
    Comprehensive,
}

impl CompletionLevel {
    /// Classify a raw completion score into its narrative band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            CompletionLevel::Comprehensive
        } else if score >= 0.75 {
            CompletionLevel::Substantial
        } else if score >= 0.5 {
            CompletionLevel::Partial
        } else {
            CompletionLevel::Insufficient
        }
    }
}

/// Per-dimension sub-scores the Evaluator reports alongside the overall
/// completion score. Equal-weighted by default (Open Question resolved in
/// SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Coverage of the facts a complete answer would need.
    pub factual_coverage: f64,
    /// Diversity of sources backing the evidence.
    pub source_diversity: f64,
    /// Coverage across time (recency and historical context).
    pub temporal_coverage: f64,
    /// Balance across differing viewpoints, where applicable.
    pub perspective_balance: f64,
    /// Depth of detail beyond surface-level facts.
    pub depth: f64,
}

impl DimensionScores {
    /// Equal-weighted mean of the five dimensions (resolved Open Question:
    /// equal weights per spec default).
    #[must_use]
    pub fn overall(&self) -> f64 {
        (self.factual_coverage
            + self.source_diversity
            + self.temporal_coverage
            + self.perspective_balance
            + self.depth)
            / 5.0
    }
}

/// Output of the Evaluator stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Overall completion score in `[0.0, 1.0]`.
    pub score: f64,
    /// Narrative band derived from `score`.
    pub level: CompletionLevel,
    /// Per-dimension sub-scores.
    pub dimensions: DimensionScores,
    /// Named gaps in the accumulated evidence.
    pub gaps: Vec<String>,
    /// Refinement sub-queries proposed to close the gaps.
    pub refinements: Vec<String>,
}

/// Closed set of progress event kinds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Orchestration started.
    Started,
    /// Planner is decomposing the query.
    Planning,
    /// A research iteration began.
    Iteration,
    /// Evidence was added to the store.
    Evidence,
    /// Evaluator produced a score.
    Evaluation,
    /// Gaps were identified.
    GapAnalysis,
    /// Refinement queries were chosen.
    Refinement,
    /// Writer is synthesizing the report.
    ReportGeneration,
    /// Task finished successfully.
    Completed,
    /// Task finished with an error.
    Failed,
    /// Non-fatal anomaly surfaced mid-task (e.g. an unresolved citation
    /// stripped from the report body).
    Warning,
}

/// One immutable, ordered progress notification for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Owning task.
    pub task_id: Uuid,
    /// Monotonic per-task sequence number (publication order).
    pub sequence: u64,
    /// Wall-clock timestamp, RFC-3339 at the wire boundary.
    pub timestamp: DateTime<Utc>,
    /// Event kind, from the closed set.
    pub event_type: EventKind,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    pub data: Option<BTreeMap<String, serde_json::Value>>,
}

/// Optional iteration/gap summary attached to a [`Report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSummary {
    /// Number of iterations completed.
    pub iterations_completed: u32,
    /// Names of gaps identified across the run.
    pub gaps_identified: Vec<String>,
    /// Short bullet list of key findings.
    pub key_findings: Vec<String>,
}

/// Optional quality metrics attached to a [`Report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Final completion score.
    pub completion_score: f64,
    /// Total evidence items retained.
    pub evidence_count: u32,
    /// Wall-clock duration of the whole orchestration, in seconds.
    pub execution_duration_secs: f64,
}

/// The final synthesized report, one-to-one with completed tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Owning task.
    pub task_id: Uuid,
    /// Markdown body, with `[key]` citation markers resolved against the
    /// evidence snapshot's citation keys.
    pub markdown_body: String,
    /// Bibliography block rendered from the evidence snapshot.
    pub bibliography: String,
    /// Iteration/gap summary, present for deep tasks.
    pub summary: Option<ResearchSummary>,
    /// Quality metrics, present for deep tasks.
    pub metrics: Option<QualityMetrics>,
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained diagnostic detail.
    Debug,
    /// Normal operational message.
    Info,
    /// Recoverable anomaly.
    Warning,
    /// Failure.
    Error,
}

/// An append-only log line associated with a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Owning task.
    pub task_id: Uuid,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// When the line was recorded.
    pub timestamp: DateTime<Utc>,
}

/// The model role a `complete-text` call is being made on behalf of.
/// `Researcher` is added beyond the three roles §4.1 names explicitly
/// because §4.6 requires a `complete-text(role=researcher, ...)` call for
/// excerpt summarization (see SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Planner decomposition calls.
    Planner,
    /// Writer synthesis calls.
    Writer,
    /// Evaluator scoring calls.
    Evaluator,
    /// Researcher excerpt-summarization calls.
    Researcher,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_level_boundaries() {
        assert_eq!(CompletionLevel::from_score(0.0), CompletionLevel::Insufficient);
        assert_eq!(CompletionLevel::from_score(0.49), CompletionLevel::Insufficient);
        assert_eq!(CompletionLevel::from_score(0.5), CompletionLevel::Partial);
        assert_eq!(CompletionLevel::from_score(0.74), CompletionLevel::Partial);
        assert_eq!(CompletionLevel::from_score(0.75), CompletionLevel::Substantial);
        assert_eq!(CompletionLevel::from_score(0.89), CompletionLevel::Substantial);
        assert_eq!(CompletionLevel::from_score(0.9), CompletionLevel::Comprehensive);
        assert_eq!(CompletionLevel::from_score(1.0), CompletionLevel::Comprehensive);
    }

    #[test]
    fn dimension_scores_overall_is_equal_weighted_mean() {
        let dims = DimensionScores {
            factual_coverage: 1.0,
            source_diversity: 0.5,
            temporal_coverage: 0.5,
            perspective_balance: 0.5,
            depth: 0.5,
        };
        assert!((dims.overall() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn task_status_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Accepted.is_terminal());
    }

    #[test]
    fn new_task_starts_accepted_with_matching_timestamps() {
        let now = Utc::now();
        let task = ResearchTask::new("q".into(), TaskKind::Simple, TaskConfig::default(), now);
        assert_eq!(task.status, TaskStatus::Accepted);
        assert_eq!(task.created_at, now);
        assert_eq!(task.updated_at, now);
        assert!(task.started_at.is_none());
    }
}
