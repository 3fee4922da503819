//! End-to-end exercise of the Intake API against the mock Provider Gateway
//! and an in-memory persistence backend, so the suite never touches the
//! network (mirrors the teacher's pattern of testing against mock
//! providers rather than live ones).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use research_core::config::{Config, OrchestratorConfig, PersistenceConfig, ProviderConfig, ServerConfig};
use research_orchestrator::{Orchestrator, WorkerPool};
use research_persistence::InMemoryBackend;
use research_progress::ProgressBus;
use research_provider::MockProviderGateway;
use research_server::AppState;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state() -> AppState {
    let config = Arc::new(Config {
        provider: ProviderConfig {
            api_key_text: None,
            api_key_search: None,
            ..ProviderConfig::default()
        },
        persistence: PersistenceConfig { url: None, db_name: "test".into() },
        orchestrator: OrchestratorConfig {
            max_concurrent_tasks: 2,
            default_task_timeout: Duration::from_secs(10),
            quality_threshold: 0.75,
            max_evidence_per_subtask: 2,
            researcher_concurrency: 2,
        },
        server: ServerConfig { host: "127.0.0.1".into(), port: 0 },
    });
    let gateway = Arc::new(MockProviderGateway::new());
    let persistence: Arc<dyn research_persistence::PersistenceBackend> = Arc::new(InMemoryBackend::new());
    let progress = Arc::new(ProgressBus::new());
    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        Arc::clone(&persistence),
        Arc::clone(&progress),
        config.orchestrator.clone(),
    ));
    let pool = Arc::new(WorkerPool::new(orchestrator, config.orchestrator.max_concurrent_tasks));
    AppState { persistence, progress, pool, config }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["persistence"], "memory");
    assert_eq!(body["providers"]["text"], false);
    assert_eq!(body["providers"]["search"], false);
}

#[tokio::test]
async fn deep_research_rejects_out_of_range_budget() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deep-research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "a query", "budget": 10}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deep_research_rejects_out_of_range_max_iterations() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deep-research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "a query", "max_iterations": 9}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deep_research_rejects_out_of_range_min_completion_score() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deep-research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "a query", "min_completion_score": 0.1}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn research_rejects_empty_query() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn research_accepts_and_eventually_completes() {
    let state = test_state();
    let app = research_server::build(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "what is rust ownership"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let id: uuid::Uuid = task_id.parse().unwrap();
        let task = state.persistence.get_task(id).await.unwrap().unwrap();
        if task.status.is_terminal() {
            assert_eq!(task.status, research_core::model::TaskStatus::Completed);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "task did not finish in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn task_status_for_unknown_id_is_not_found() {
    let app = research_server::build(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/tasks/{}/status", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
