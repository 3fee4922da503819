//! Durable [`PersistenceBackend`] over MongoDB, grounded on the teacher's
//! `dashflow-mongodb` dependency choice. Collections are typed directly over
//! the `research-core` model types rather than hand-rolled BSON documents.

use crate::backend::PersistenceBackend;
use async_trait::async_trait;
use bson::doc;
use futures::stream::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use research_core::config::PersistenceConfig;
use research_core::error::{ResearchError, Result};
use research_core::model::{LogLevel, LogRecord, Report, ResearchTask, TaskStatus};
use uuid::Uuid;

const TASKS_COLLECTION: &str = "tasks";
const REPORTS_COLLECTION: &str = "reports";
const LOGS_COLLECTION: &str = "logs";

/// MongoDB-backed persistence. `connect` is the only fallible constructor;
/// callers that want automatic fallback to [`crate::InMemoryBackend`] on
/// connection failure should use [`crate::build_backend`].
pub struct MongoBackend {
    #[allow(dead_code)]
    client: Client,
    db: Database,
}

fn to_persistence_error(e: mongodb::error::Error) -> ResearchError {
    ResearchError::PersistenceError(e.to_string())
}

/// Whether a MongoDB write error is a duplicate-key violation (error code
/// 11000), used to translate unique-index violations into
/// `ResearchError::PersistenceError` with a stable, testable message.
fn is_duplicate_key_error(error: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    matches!(error.kind.as_ref(), ErrorKind::Write(write_error)
        if matches!(write_error, mongodb::error::WriteFailure::WriteError(we) if we.code == 11000))
}

impl MongoBackend {
    /// Connect, ping to verify reachability, and ensure indexes exist. This
    /// is the single point where a misconfigured or unreachable durable
    /// store surfaces as an error; the caller decides whether to fall back.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| ResearchError::PersistenceError("PERSISTENCE_URL is not set".into()))?;
        let client = Client::with_uri_str(url).await.map_err(to_persistence_error)?;
        let db = client.database(&config.db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(to_persistence_error)?;

        let backend = Self { client, db };
        backend.ensure_indexes().await?;
        Ok(backend)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.tasks()
            .create_index(IndexModel::builder().keys(doc! {"id": 1}).options(unique.clone()).build())
            .await
            .map_err(to_persistence_error)?;
        self.tasks()
            .create_index(IndexModel::builder().keys(doc! {"status": 1}).build())
            .await
            .map_err(to_persistence_error)?;
        self.tasks()
            .create_index(IndexModel::builder().keys(doc! {"created_at": -1}).build())
            .await
            .map_err(to_persistence_error)?;

        self.reports()
            .create_index(IndexModel::builder().keys(doc! {"task_id": 1}).options(unique).build())
            .await
            .map_err(to_persistence_error)?;

        self.logs()
            .create_index(IndexModel::builder().keys(doc! {"task_id": 1, "timestamp": 1}).build())
            .await
            .map_err(to_persistence_error)?;
        self.logs()
            .create_index(IndexModel::builder().keys(doc! {"level": 1}).build())
            .await
            .map_err(to_persistence_error)?;

        Ok(())
    }

    fn tasks(&self) -> Collection<ResearchTask> {
        self.db.collection(TASKS_COLLECTION)
    }

    fn reports(&self) -> Collection<Report> {
        self.db.collection(REPORTS_COLLECTION)
    }

    fn logs(&self) -> Collection<LogRecord> {
        self.db.collection(LOGS_COLLECTION)
    }
}

#[async_trait]
impl PersistenceBackend for MongoBackend {
    async fn create_task(&self, task: ResearchTask) -> Result<()> {
        self.tasks().insert_one(task).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                ResearchError::PersistenceError("task already exists".into())
            } else {
                to_persistence_error(e)
            }
        })?;
        Ok(())
    }

    async fn update_task(&self, task: ResearchTask) -> Result<()> {
        self.tasks()
            .replace_one(doc! {"id": task.id.to_string()}, task)
            .await
            .map_err(to_persistence_error)?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<ResearchTask>> {
        self.tasks()
            .find_one(doc! {"id": id.to_string()})
            .await
            .map_err(to_persistence_error)
    }

    async fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ResearchTask>> {
        let filter = match status {
            Some(status) => doc! {"status": status_to_str(status)},
            None => doc! {},
        };
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1})
            .limit(limit as i64)
            .build();
        let cursor = self
            .tasks()
            .find(filter)
            .with_options(options)
            .await
            .map_err(to_persistence_error)?;
        cursor.try_collect().await.map_err(to_persistence_error)
    }

    async fn create_report(&self, report: Report) -> Result<()> {
        self.reports().insert_one(report).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                ResearchError::PersistenceError("report already exists".into())
            } else {
                to_persistence_error(e)
            }
        })?;
        Ok(())
    }

    async fn get_report(&self, task_id: Uuid) -> Result<Option<Report>> {
        self.reports()
            .find_one(doc! {"task_id": task_id.to_string()})
            .await
            .map_err(to_persistence_error)
    }

    async fn append_log(&self, record: LogRecord) -> Result<()> {
        self.logs().insert_one(record).await.map_err(to_persistence_error)?;
        Ok(())
    }

    async fn list_logs(&self, task_id: Uuid, level: Option<LogLevel>) -> Result<Vec<LogRecord>> {
        let mut filter = doc! {"task_id": task_id.to_string()};
        if let Some(level) = level {
            filter.insert("level", level_to_str(level));
        }
        let options = FindOptions::builder().sort(doc! {"timestamp": 1}).build();
        let cursor = self
            .logs()
            .find(filter)
            .with_options(options)
            .await
            .map_err(to_persistence_error)?;
        cursor.try_collect().await.map_err(to_persistence_error)
    }

    async fn health_check(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(to_persistence_error)?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "durable"
    }
}

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Accepted => "accepted",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

fn level_to_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warning => "warning",
        LogLevel::Error => "error",
    }
}
