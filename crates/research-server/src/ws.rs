//! `GET /ws/progress/{id}`: streams a task's progress events as JSON text
//! frames, grounded on the teacher's `dashflow-observability` websocket
//! server's resume/keepalive protocol.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

/// Upgrade to a WebSocket and attach to the task's progress channel. If the
/// channel has already delivered its terminal event, the connection is
/// accepted and then closed immediately with no events (§8).
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state, id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, task_id: Uuid) {
    let Some(mut observer) = state.progress.subscribe(task_id) else {
        let _ = socket.close().await;
        return;
    };

    loop {
        tokio::select! {
            event = observer.events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(event.as_ref()) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = observer.keepalive.recv() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text == "ping" => {
                        if socket.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
    let _ = socket.close().await;
}
