//! Fixed-size worker pool consuming tasks from a bounded channel (§9 design
//! note: "Background task launched from request handler with implicit
//! context ... use an explicit worker-pool with a task-submission channel").

use crate::orchestrator::Orchestrator;
use dashmap::DashMap;
use research_core::model::ResearchTask;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

const SUBMISSION_QUEUE_CAPACITY: usize = 1024;

/// Fixed-size pool of orchestrator workers. The intake API submits accepted
/// tasks here; workers pull from a shared channel so the number of
/// concurrently running tasks never exceeds `max_concurrent_tasks`
/// regardless of how many requests arrive at once.
pub struct WorkerPool {
    sender: mpsc::Sender<ResearchTask>,
    cancel_flags: Arc<DashMap<Uuid, Arc<AtomicBool>>>,
}

impl WorkerPool {
    /// Spawn `max_concurrent_tasks` worker loops sharing one orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent_tasks: usize) -> Self {
        let (sender, receiver) = mpsc::channel(SUBMISSION_QUEUE_CAPACITY);
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel_flags: Arc<DashMap<Uuid, Arc<AtomicBool>>> = Arc::new(DashMap::new());

        for _ in 0..max_concurrent_tasks.max(1) {
            let receiver = Arc::clone(&receiver);
            let orchestrator = Arc::clone(&orchestrator);
            let cancel_flags = Arc::clone(&cancel_flags);
            tokio::spawn(async move {
                loop {
                    let task = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(task) = task else { break };
                    let task_id = task.id;
                    let flag = cancel_flags
                        .entry(task_id)
                        .or_insert_with(|| Arc::new(AtomicBool::new(false)))
                        .clone();
                    orchestrator.run(task, flag).await;
                    cancel_flags.remove(&task_id);
                }
            });
        }

        Self { sender, cancel_flags }
    }

    /// Enqueue a task for execution. Returns `false` if the pool has been
    /// shut down (its workers have exited).
    pub async fn submit(&self, task: ResearchTask) -> bool {
        self.sender.send(task).await.is_ok()
    }

    /// Request cancellation of a running or queued task. A no-op if the
    /// task id is unknown (already finished, or never submitted).
    pub fn cancel(&self, task_id: Uuid) {
        if let Some(flag) = self.cancel_flags.get(&task_id) {
            flag.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research_core::config::OrchestratorConfig;
    use research_core::model::{TaskConfig, TaskKind, TaskStatus};
    use research_persistence::{InMemoryBackend, PersistenceBackend};
    use research_progress::ProgressBus;
    use research_provider::MockProviderGateway;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_task_eventually_completes() {
        let gateway = Arc::new(MockProviderGateway::new());
        let persistence: Arc<dyn PersistenceBackend> = Arc::new(InMemoryBackend::new());
        let progress = Arc::new(ProgressBus::new());
        let orchestrator = Arc::new(Orchestrator::new(
            gateway,
            Arc::clone(&persistence),
            progress,
            OrchestratorConfig {
                max_concurrent_tasks: 2,
                default_task_timeout: Duration::from_secs(10),
                quality_threshold: 0.75,
                max_evidence_per_subtask: 2,
                researcher_concurrency: 2,
            },
        ));
        let pool = WorkerPool::new(orchestrator, 2);

        let task = ResearchTask::new("a query".into(), TaskKind::Simple, TaskConfig::default(), Utc::now());
        let task_id = task.id;
        persistence.create_task(task.clone()).await.unwrap();
        assert!(pool.submit(task).await);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stored = persistence.get_task(task_id).await.unwrap().unwrap();
            if stored.status.is_terminal() {
                assert_eq!(stored.status, TaskStatus::Completed);
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "task did not complete in time");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
