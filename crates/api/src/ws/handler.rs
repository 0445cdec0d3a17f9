use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use vinspect_core::types::InspectionId;
use vinspect_live::InspectionService;

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::heartbeat::{Liveness, HEARTBEAT_INTERVAL};

/// HTTP handler that upgrades the connection to a live update stream.
///
/// The inspection must exist; unknown ids are rejected with 404 before the
/// upgrade.
pub async fn inspection_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<InspectionId>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    state.service.get_inspection(id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, id, state.service)))
}

/// Serve one subscriber connection.
///
/// Subscribes before reading the snapshot, so nothing accepted in between
/// is missed; updates already contained in the snapshot are skipped.
async fn handle_socket(socket: WebSocket, id: InspectionId, service: Arc<InspectionService>) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(conn_id = %conn_id, inspection_id = %id, "WebSocket connected");

    let mut subscription = service.subscribe(id);
    let (mut sink, mut stream) = socket.split();

    let snapshot = match service.get_inspection(id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "Snapshot unavailable, closing");
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    let snapshot_version = snapshot.version;
    let frame = json!({ "type": "snapshot", "inspection": snapshot });
    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
        return;
    }

    let mut liveness = Liveness::new(HEARTBEAT_INTERVAL);
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if liveness.is_dead() {
                    tracing::info!(conn_id = %conn_id, "WebSocket peer unresponsive, closing");
                    break;
                }
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "Ping failed, WebSocket sink closed");
                    break;
                }
            }
            update = subscription.recv() => {
                let Some(update) = update else {
                    // Channel closed (shutdown).
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if update.version.is_some_and(|v| v <= snapshot_version) {
                    continue;
                }
                let text = match serde_json::to_string(&update) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode update");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                    break;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    liveness.touch();
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                // Mutations go through the HTTP API; other frames only
                // prove the peer is alive.
                Some(Ok(_)) => liveness.touch(),
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    tracing::info!(
        conn_id = %conn_id,
        inspection_id = %id,
        dropped = subscription.dropped(),
        "WebSocket disconnected"
    );
}
