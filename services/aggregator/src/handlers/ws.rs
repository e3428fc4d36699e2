use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::hub::SESSION_OUTBOX_CAPACITY;
use crate::state::AppState;

/// `GET /ws`: upgrade into the subscription protocol.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<String>(SESSION_OUTBOX_CAPACITY);
    let session_id = state.hub.connect(outbox_tx);

    // Immediate data push with default preferences, before any subscribe
    state.hub.send_initial_data(&session_id).await;

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(json) = outbox_rx.recv().await {
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Inbound messages are processed in arrival order for this session
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                state.hub.handle_message(&session_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary and control frames carry no protocol messages
            }
            Err(err) => {
                debug!(session = %session_id, error = %err, "Socket error");
                break;
            }
        }
    }

    // Errors and disconnects only ever tear down this session
    state.hub.disconnect(&session_id);
    send_task.abort();
}
