//! Observer WebSocket: retained SDP envelopes, then live envelopes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::ApiState;

/// `GET /observer`
pub async fn observer_upgrade(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

async fn handle_observer(socket: WebSocket, state: ApiState) {
    let connection_id = uuid::Uuid::new_v4();
    let (backlog, mut live) = state.observer.subscribe();
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(
        connection_id = %connection_id,
        retained = backlog.len(),
        "Observer connected"
    );

    for message in backlog {
        if sender.send(Message::Text(message.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            published = live.recv() => match published {
                Ok(message) => {
                    if sender.send(Message::Text(message.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        skipped,
                        "Observer lagging, messages skipped"
                    );
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!(connection_id = %connection_id, "Observer disconnected");
}
