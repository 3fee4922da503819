//! In-memory [`PersistenceBackend`], selected when no durable connection
//! string is configured, and as the automatic fallback target if the
//! MongoDB backend is unreachable at startup (§4.4, §7). Built on the
//! teacher's ubiquitous `dashmap` + `parking_lot` combination for
//! concurrent in-process state.

use crate::backend::PersistenceBackend;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use research_core::error::{ResearchError, Result};
use research_core::model::{LogLevel, LogRecord, Report, ResearchTask, TaskStatus};
use uuid::Uuid;

/// Volatile, process-local persistence backend.
#[derive(Default)]
pub struct InMemoryBackend {
    tasks: DashMap<Uuid, ResearchTask>,
    reports: DashMap<Uuid, Report>,
    logs: DashMap<Uuid, Mutex<Vec<LogRecord>>>,
}

impl InMemoryBackend {
    /// Construct an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn create_task(&self, task: ResearchTask) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(ResearchError::PersistenceError(format!(
                "task {} already exists",
                task.id
            )));
        }
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn update_task(&self, task: ResearchTask) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<ResearchTask>> {
        Ok(self.tasks.get(&id).map(|r| r.clone()))
    }

    async fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ResearchTask>> {
        let mut tasks: Vec<ResearchTask> = self
            .tasks
            .iter()
            .map(|r| r.value().clone())
            .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn create_report(&self, report: Report) -> Result<()> {
        if self.reports.contains_key(&report.task_id) {
            return Err(ResearchError::PersistenceError(format!(
                "report for task {} already exists",
                report.task_id
            )));
        }
        self.reports.insert(report.task_id, report);
        Ok(())
    }

    async fn get_report(&self, task_id: Uuid) -> Result<Option<Report>> {
        Ok(self.reports.get(&task_id).map(|r| r.clone()))
    }

    async fn append_log(&self, record: LogRecord) -> Result<()> {
        self.logs
            .entry(record.task_id)
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .push(record);
        Ok(())
    }

    async fn list_logs(&self, task_id: Uuid, level: Option<LogLevel>) -> Result<Vec<LogRecord>> {
        let Some(entry) = self.logs.get(&task_id) else {
            return Ok(Vec::new());
        };
        let records = entry.lock();
        Ok(records
            .iter()
            .filter(|r| level.map(|l| r.level == l).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research_core::model::{TaskConfig, TaskKind};

    fn sample_task() -> ResearchTask {
        ResearchTask::new("test query".into(), TaskKind::Simple, TaskConfig::default(), Utc::now())
    }

    #[tokio::test]
    async fn create_task_rejects_duplicate_id() {
        let backend = InMemoryBackend::new();
        let task = sample_task();
        backend.create_task(task.clone()).await.unwrap();
        let err = backend.create_task(task).await.unwrap_err();
        assert!(matches!(err, ResearchError::PersistenceError(_)));
    }

    #[tokio::test]
    async fn update_task_overwrites_status() {
        let backend = InMemoryBackend::new();
        let mut task = sample_task();
        backend.create_task(task.clone()).await.unwrap();
        task.status = TaskStatus::Running;
        backend.update_task(task.clone()).await.unwrap();
        let fetched = backend.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn list_tasks_filters_by_status_and_limit() {
        let backend = InMemoryBackend::new();
        for _ in 0..3 {
            let mut t = sample_task();
            t.status = TaskStatus::Running;
            backend.create_task(t).await.unwrap();
        }
        let mut done = sample_task();
        done.status = TaskStatus::Completed;
        backend.create_task(done).await.unwrap();

        let running = backend.list_tasks(Some(TaskStatus::Running), 10).await.unwrap();
        assert_eq!(running.len(), 3);

        let capped = backend.list_tasks(None, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn create_report_rejects_duplicate_task_id() {
        let backend = InMemoryBackend::new();
        let report = Report {
            task_id: Uuid::new_v4(),
            markdown_body: "body".into(),
            bibliography: String::new(),
            summary: None,
            metrics: None,
        };
        backend.create_report(report.clone()).await.unwrap();
        let err = backend.create_report(report).await.unwrap_err();
        assert!(matches!(err, ResearchError::PersistenceError(_)));
    }

    #[tokio::test]
    async fn logs_are_returned_in_append_order_and_filterable() {
        let backend = InMemoryBackend::new();
        let task_id = Uuid::new_v4();
        for (level, msg) in [
            (LogLevel::Info, "starting"),
            (LogLevel::Warning, "slow provider"),
            (LogLevel::Info, "finished"),
        ] {
            backend
                .append_log(LogRecord {
                    task_id,
                    level,
                    message: msg.into(),
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
        let all = backend.list_logs(task_id, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "starting");

        let warnings = backend.list_logs(task_id, Some(LogLevel::Warning)).await.unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
