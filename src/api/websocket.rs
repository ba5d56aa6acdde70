//! WebSocket feed for live crash rounds.
//!
//! Forwards the round's multiplier snapshots to the client as they tick,
//! sends the terminal snapshot, then closes. The feed is read-only; cash-out
//! goes through the HTTP endpoint.

use super::handlers::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

/// GET /ws/crash/:round_id
pub async fn crash_ws_handler(
    Path(round_id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_crash_socket(socket, round_id, state))
}

async fn handle_crash_socket(socket: WebSocket, round_id: String, state: Arc<AppState>) {
    state.metrics.websocket_opened();
    stream_round(socket, round_id, &state).await;
    state.metrics.websocket_closed();
}

async fn stream_round(socket: WebSocket, round_id: String, state: &Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(mut updates) = state.service.crash.subscribe(&round_id) else {
        let _ = sender
            .send(Message::Text(
                serde_json::json!({
                    "error": format!("Crash round {} is not live", round_id),
                })
                .to_string(),
            ))
            .await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    // Current state first, then every change until the round is terminal.
    let snapshot = updates.borrow_and_update().clone();
    if send_snapshot(&mut sender, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    // Worker finished and dropped the channel.
                    break;
                }
                let snapshot = updates.borrow().clone();
                let terminal = matches!(
                    snapshot.state,
                    crate::games::crash::CrashState::CashedOut
                        | crate::games::crash::CrashState::Crashed
                );
                if send_snapshot(&mut sender, &snapshot).await.is_err() {
                    return;
                }
                if terminal {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        debug!(round_id = %round_id, "websocket client left round feed");
                        return;
                    }
                    // The feed is one-way; ignore other client messages.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

async fn send_snapshot(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    snapshot: &crate::games::crash::CrashSnapshot,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(snapshot).unwrap_or_default();
    sender.send(Message::Text(payload)).await
}
