//! WebSocket handler for `/ws/image/predict`.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header::ORIGIN, HeaderMap},
    response::IntoResponse,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use mapaction_common::PredictRequest;

use crate::AppState;

/// Close reasons are limited to 123 bytes by the protocol.
const MAX_CLOSE_REASON: usize = 123;

#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error("WebSocket error: {0}")]
    Transport(#[from] axum::Error),

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pipeline(#[from] crate::error::Error),
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match origin {
        Some(origin) if origin_allowed(&origin, &state.config.websocket.allowed_origins) => {
            tracing::info!(origin = %origin, "Prediction session connection attempt");
            ws.on_upgrade(move |socket| handle_session(socket, state, origin))
        }
        other => {
            tracing::warn!(origin = ?other, "Rejecting WebSocket from disallowed origin");
            ws.on_upgrade(reject)
        }
    }
}

fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    let origin = origin.trim_end_matches('/');
    allowed
        .iter()
        .any(|a| a.trim_end_matches('/').eq_ignore_ascii_case(origin))
}

async fn reject(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(close_frame(
            close_code::POLICY,
            "Origin not allowed",
        ))))
        .await;
}

/// Handle one accepted session until the client leaves or a message fails.
async fn handle_session(socket: WebSocket, state: Arc<AppState>, origin: String) {
    let session_id = state.connections.connect(origin).await;
    tracing::info!(session_id = %session_id, "Prediction session opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    match serve(&mut ws_tx, &mut ws_rx, &state).await {
        Ok(()) => {
            tracing::info!(session_id = %session_id, "Prediction session closed by client");
            // Flushes the close reply queued when the client's frame was read.
            if let Err(e) = ws_tx.close().await {
                tracing::debug!(session_id = %session_id, "Close handshake not completed: {}", e);
            }
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, "Closing prediction session: {}", e);
            let frame = close_frame(close_code::ERROR, &e.to_string());
            if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                tracing::debug!(session_id = %session_id, "Failed to send close frame: {}", e);
            }
        }
    }

    state.connections.disconnect(&session_id).await;
}

/// Process messages in order. Returns `Ok` when the client closes.
async fn serve(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    ws_rx: &mut SplitStream<WebSocket>,
    state: &AppState,
) -> Result<(), SessionError> {
    while let Some(message) = ws_rx.next().await {
        match message? {
            Message::Text(text) => {
                let request: PredictRequest = serde_json::from_str(&text)?;
                tracing::debug!(image = %request.image_name, "Prediction requested over WebSocket");

                let response = state.pipeline.run_direct(&request).await?;
                ws_tx
                    .send(Message::Text(serde_json::to_string(&response)?))
                    .await?;
            }
            Message::Ping(data) => ws_tx.send(Message::Pong(data)).await?,
            Message::Close(_) => break,
            Message::Binary(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}

fn close_frame(code: u16, reason: &str) -> CloseFrame<'static> {
    CloseFrame {
        code,
        reason: Cow::Owned(truncate_reason(reason).to_string()),
    }
}

fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn allowed() -> Vec<String> {
        vec![
            "http://localhost:3000".to_string(),
            "https://app.map-action.com/".to_string(),
        ]
    }

    #[rstest]
    #[case("http://localhost:3000", true)]
    #[case("http://localhost:3000/", true)]
    #[case("https://app.map-action.com", true)]
    #[case("HTTP://LOCALHOST:3000", true)]
    #[case("http://localhost:3001", false)]
    #[case("http://evil.example", false)]
    #[case("", false)]
    fn test_origin_allowed(#[case] origin: &str, #[case] expected: bool) {
        assert_eq!(origin_allowed(origin, &allowed()), expected);
    }

    #[test]
    fn test_no_allowed_origins_rejects_everything() {
        assert!(!origin_allowed("http://localhost:3000", &[]));
    }

    #[test]
    fn test_truncate_reason_respects_char_boundaries() {
        let short = "Prediction failed";
        assert_eq!(truncate_reason(short), short);

        let long = "é".repeat(100);
        let truncated = truncate_reason(&long);
        assert!(truncated.len() <= MAX_CLOSE_REASON);
        assert_eq!(truncated.len(), 122);
    }
}
