use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use callpilot_orchestrator::Subscriber;

use crate::state::AppState;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub call_id: String,
    pub viewer: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.call_id.trim().is_empty() {
        return Response::builder()
            .status(400)
            .body("Missing call_id".into())
            .unwrap();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: WsParams) {
    let connection_id = Uuid::new_v4().to_string();
    let viewer = params
        .viewer
        .unwrap_or_else(|| format!("viewer-{}", &connection_id[..8]));
    info!(call_id = %params.call_id, %connection_id, %viewer, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let (subscriber, mut room_rx) = Subscriber::new(connection_id.clone());
    state.orchestrator.join(&params.call_id, subscriber).await;

    send_json(
        &sender,
        &serde_json::json!({
            "type": "connected",
            "call_id": params.call_id,
            "connection_id": connection_id,
        }),
    )
    .await;

    // Forward room events to the socket until the room channel closes.
    let forward = {
        let sender = sender.clone();
        let call_id = params.call_id.clone();
        tokio::spawn(async move {
            while let Some(event) = room_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%call_id, %e, "failed to encode room event");
                        continue;
                    }
                };
                let mut guard = sender.lock().await;
                if guard.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => {
                handle_client_message(&state, &params.call_id, &sender, &text).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    state.orchestrator.leave(&params.call_id, &connection_id).await;
    info!(call_id = %params.call_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(state: &AppState, call_id: &str, sender: &WsSender, text: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        debug!(%call_id, "ignoring malformed WS message");
        return;
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("request_suggestion") => {
            let orchestrator = state.orchestrator.clone();
            let call_id = call_id.to_string();
            tokio::spawn(async move {
                orchestrator.request_manual(&call_id).await;
            });
        }
        Some("ping") => {
            send_json(sender, &serde_json::json!({ "type": "pong" })).await;
        }
        other => {
            debug!(%call_id, message_type = ?other, "unknown WS message type");
        }
    }
}

async fn send_json(sender: &WsSender, message: &serde_json::Value) {
    let text = message.to_string();
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%e, "failed to send WS message");
    }
}
