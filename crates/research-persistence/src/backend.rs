//! Persistence Layer contract (§4.4): durable storage for tasks, reports,
//! and append-only logs, with a uniform interface across the in-memory and
//! MongoDB-backed implementations.

use async_trait::async_trait;
use research_core::error::Result;
use research_core::model::{LogLevel, LogRecord, Report, ResearchTask, TaskStatus};
use uuid::Uuid;

/// Abstract persistence backend. Implementations must treat `task.id` and
/// `report.task_id` as unique keys: a second `create_task`/`create_report`
/// call with an id already present is a `PersistenceError`, not a silent
/// overwrite (§3: "never mutated after creation" for reports; tasks are
/// mutated only through `update_task`).
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Insert a new task record. Errors if `task.id` already exists.
    async fn create_task(&self, task: ResearchTask) -> Result<()>;

    /// Overwrite an existing task record in place (status transitions,
    /// terminal fields). Upserts if the id is somehow missing rather than
    /// erroring, since the orchestrator is the sole writer of a task it
    /// already created.
    async fn update_task(&self, task: ResearchTask) -> Result<()>;

    /// Fetch one task by id.
    async fn get_task(&self, id: Uuid) -> Result<Option<ResearchTask>>;

    /// List tasks, optionally filtered by status, newest first, capped at
    /// `limit`.
    async fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ResearchTask>>;

    /// Insert the one-and-only report for a task. Errors if a report for
    /// `report.task_id` already exists.
    async fn create_report(&self, report: Report) -> Result<()>;

    /// Fetch the report for a task, if the task has completed.
    async fn get_report(&self, task_id: Uuid) -> Result<Option<Report>>;

    /// Append one log line. Logs are never mutated or deleted.
    async fn append_log(&self, record: LogRecord) -> Result<()>;

    /// List a task's log lines in chronological order, optionally filtered
    /// to one severity.
    async fn list_logs(&self, task_id: Uuid, level: Option<LogLevel>) -> Result<Vec<LogRecord>>;

    /// Cheap connectivity probe used at startup and by `/health`.
    async fn health_check(&self) -> Result<()>;

    /// `"durable"` or `"memory"`, reflecting the backend actually resolved
    /// at startup (after any unreachable-durable-store fallback), for the
    /// `/health` diagnostic (§6).
    fn kind(&self) -> &'static str;
}
