//! Route handlers for the Intake API (§6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{http::StatusCode, Json};
use chrono::Utc;
use research_core::model::{LogLevel, ResearchTask, TaskConfig, TaskKind, TaskStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /research` and `POST /deep-research` request body.
#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    /// Natural-language research query; must be non-empty.
    pub query: String,
    /// Deep-research only: maximum iterations, default 5.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Deep-research only: minimum completion score that ends iteration early.
    #[serde(default)]
    pub min_completion_score: Option<f64>,
    /// Starting provider-call budget.
    #[serde(default)]
    pub budget: Option<u32>,
}

/// Response body for both intake endpoints.
#[derive(Debug, Serialize)]
pub struct ResearchAccepted {
    /// Id the caller uses to poll status, fetch the report, or attach to
    /// the progress WebSocket.
    pub task_id: Uuid,
    /// Always `"accepted"`; tasks are queued, not run inline.
    pub status: &'static str,
}

fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.trim().is_empty() {
        return Err(ApiError(research_core::error::ResearchError::InputError(
            "query must not be empty".into(),
        )));
    }
    Ok(())
}

/// Deep-research parameter ranges (§6): `max_iterations:1..5`,
/// `min_completion_score:0.5..1.0`, `budget:50..300`. Violations are
/// rejected as `InputError` (§7 "out-of-range parameters") rather than
/// silently clamped.
fn validate_deep_research_ranges(request: &ResearchRequest) -> Result<(), ApiError> {
    if let Some(max_iterations) = request.max_iterations {
        if !(1..=5).contains(&max_iterations) {
            return Err(ApiError(research_core::error::ResearchError::InputError(format!(
                "max_iterations must be in [1,5], got {max_iterations}"
            ))));
        }
    }
    if let Some(min_completion_score) = request.min_completion_score {
        if !(0.5..=1.0).contains(&min_completion_score) {
            return Err(ApiError(research_core::error::ResearchError::InputError(format!(
                "min_completion_score must be in [0.5,1.0], got {min_completion_score}"
            ))));
        }
    }
    if let Some(budget) = request.budget {
        if !(50..=300).contains(&budget) {
            return Err(ApiError(research_core::error::ResearchError::InputError(format!(
                "budget must be in [50,300], got {budget}"
            ))));
        }
    }
    Ok(())
}

async fn intake(state: &AppState, request: ResearchRequest, kind: TaskKind) -> Result<ResearchAccepted, ApiError> {
    validate_query(&request.query)?;
    if kind == TaskKind::Deep {
        validate_deep_research_ranges(&request)?;
    }
    let defaults = TaskConfig::default();
    let config = TaskConfig {
        max_iterations: if kind == TaskKind::Simple {
            1
        } else {
            request.max_iterations.unwrap_or(5)
        },
        min_completion_score: request.min_completion_score.unwrap_or(defaults.min_completion_score),
        budget: request.budget.unwrap_or(if kind == TaskKind::Simple { defaults.budget } else { 200 }),
    };
    let task = ResearchTask::new(request.query, kind, config, Utc::now());
    let task_id = task.id;
    state
        .persistence
        .create_task(task.clone())
        .await
        .map_err(ApiError::from)?;
    state.pool.submit(task).await;
    Ok(ResearchAccepted { task_id, status: "accepted" })
}

/// `POST /research`: always a single-iteration task.
pub async fn research(State(state): State<AppState>, Json(request): Json<ResearchRequest>) -> Result<Json<ResearchAccepted>, ApiError> {
    intake(&state, request, TaskKind::Simple).await.map(Json)
}

/// `POST /deep-research`: iterative task, up to `max_iterations` passes.
pub async fn deep_research(State(state): State<AppState>, Json(request): Json<ResearchRequest>) -> Result<Json<ResearchAccepted>, ApiError> {
    intake(&state, request, TaskKind::Deep).await.map(Json)
}

/// `GET /tasks/{id}/status`.
pub async fn task_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    match state.persistence.get_task(id).await.map_err(ApiError::from)? {
        Some(task) => Ok((StatusCode::OK, Json(task)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// `GET /reports/{id}` and `GET /deep-research/{id}`: returns 200 even for
/// a failed task (§7: the task's terminal detail is returned rather than a
/// 404), since the id itself was valid and its outcome is known.
pub async fn report(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    if let Some(report) = state.persistence.get_report(id).await.map_err(ApiError::from)? {
        return Ok((StatusCode::OK, Json(report)).into_response());
    }
    match state.persistence.get_task(id).await.map_err(ApiError::from)? {
        Some(task) if task.status == TaskStatus::Failed => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "task_id": task.id,
                "status": "failed",
                "details": task.details,
            })),
        )
            .into_response()),
        Some(task) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"task_id": task.id, "status": status_str(task.status)})),
        )
            .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Accepted => "accepted",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

/// `GET /traces/{id}`: newline-delimited JSON log lines, oldest first.
pub async fn traces(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let logs = state
        .persistence
        .list_logs(id, None::<LogLevel>)
        .await
        .map_err(ApiError::from)?;
    let body = logs
        .iter()
        .filter_map(|record| serde_json::to_string(record).ok())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(([("content-type", "application/x-ndjson")], body))
}

/// `GET /health`: liveness plus non-secret diagnostic configuration. Reports
/// credential *presence*, never the credentials themselves (§6).
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "providers": {
            "text": state.config.provider.api_key_text.is_some(),
            "search": state.config.provider.api_key_search.is_some(),
        },
        "persistence": state.persistence.kind(),
        "max_concurrent_tasks": state.config.orchestrator.max_concurrent_tasks,
        "rate_limit_per_minute": state.config.provider.rate_limit_per_minute,
        "rate_limit_burst": state.config.provider.rate_limit_burst,
    }))
}
