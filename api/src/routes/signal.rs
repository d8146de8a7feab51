//! Signaling WebSocket: carries the single offer in and the single answer out.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use reflect_webrtc::SignalBridge;

use crate::{
    error::{ApiError, ApiResult},
    state::ApiState,
};

/// Frame type of the inbound message, echoed on the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Text,
    Binary,
}

/// `GET /signal`
///
/// Refuses the upgrade once the session has stopped listening for an offer.
pub async fn signal_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> ApiResult<Response> {
    if !state.bridge.is_open() {
        return Err(ApiError::Conflict(
            "session has already accepted its offer".to_string(),
        ));
    }

    Ok(ws
        .max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_signal(socket, state.bridge)))
}

async fn handle_signal(socket: WebSocket, bridge: SignalBridge) {
    let connection_id = uuid::Uuid::new_v4();
    tracing::info!(connection_id = %connection_id, "Signaling client connected");

    let (mut sender, mut receiver) = socket.split();

    while let Some(incoming) = receiver.next().await {
        let (text, kind) = match incoming {
            Ok(Message::Text(text)) => (text.to_string(), FrameKind::Text),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => (text, FrameKind::Binary),
                Err(_) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Ignoring non-UTF-8 signaling frame"
                    );
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    error = %e,
                    "Signaling socket error"
                );
                break;
            }
        };

        match bridge.exchange(text).await {
            Ok(answer) => {
                let reply = match kind {
                    FrameKind::Text => Message::Text(answer.into()),
                    FrameKind::Binary => Message::Binary(answer.into_bytes().into()),
                };
                if sender.send(reply).await.is_err() {
                    break;
                }
                tracing::info!(connection_id = %connection_id, "Answer delivered");
            }
            Err(e) => {
                let err = ApiError::from(e);
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %err,
                    "Signaling exchange failed"
                );
                let _ = sender.send(Message::Close(Some(err.close_frame()))).await;
                break;
            }
        }
    }

    tracing::info!(connection_id = %connection_id, "Signaling client disconnected");
}
