//! WebSocket camera stream.
//!
//! Each text frame carries the same JSON envelope as the POST
//! endpoint and receives the same response envelope as a text frame.
//! When the request sets `acceptBinary` and a subset was produced,
//! the envelope goes out first (with `encoding = "binary"` and no
//! inline data) followed by one binary frame holding the raw archive
//! bytes.
//!
//! Protocol-level concerns are handled by the WebSocket layer:
//! oversize and unmasked client frames terminate the connection, and
//! ping frames are answered with pongs carrying the same payload.

use super::{AppState, MAX_WS_MESSAGE_BYTES};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use tracing::debug;

/// One outbound WebSocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// `GET /ws/camera` - upgrade and run the frame loop.
pub async fn ws_camera(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_WS_MESSAGE_BYTES)
        .max_frame_size(MAX_WS_MESSAGE_BYTES)
        .on_upgrade(move |socket| run_camera_loop(socket, state))
}

async fn run_camera_loop(mut socket: WebSocket, state: AppState) {
    debug!("websocket connection upgraded");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            // Protocol violations (unmasked or oversize frames)
            // surface here; drop the connection
            Err(_) => break,
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by the protocol layer; binary and
            // pong frames from the client are ignored
            _ => continue,
        };

        for frame in handle_text_frame(&text, &state) {
            let outcome = match frame {
                WsFrame::Text(payload) => socket.send(Message::Text(payload)).await,
                WsFrame::Binary(payload) => socket.send(Message::Binary(payload)).await,
            };
            if outcome.is_err() {
                return;
            }
        }
    }
}

/// Process one inbound text frame into its outbound frames.
fn handle_text_frame(text: &str, state: &AppState) -> Vec<WsFrame> {
    let request = match serde_json::from_str::<crate::viewport::CameraRequest>(text) {
        Ok(request) => request,
        Err(err) => return vec![error_frame(err.to_string())],
    };
    let accept_binary = request.accept_binary;

    match crate::viewport::process_camera_state(
        &request,
        &state.bvh,
        state.reader.as_deref(),
        &state.camera,
    ) {
        Ok(processed) => outbound_frames(processed, accept_binary),
        Err(err) => vec![error_frame(err.to_string())],
    }
}

/// Decide the outbound frames for a processed response.
///
/// The binary path activates only when the client asked for it and a
/// subset was actually produced; the raw bytes travel by value, so
/// nothing is staged across frame boundaries.
pub fn outbound_frames(
    processed: crate::viewport::ProcessedResponse,
    accept_binary: bool,
) -> Vec<WsFrame> {
    let mut envelope = processed.envelope;

    if accept_binary {
        if let (Some(subset), Some(raw)) = (envelope.pmtiles_subset.as_mut(), processed.raw_subset)
        {
            subset.encoding = "binary".to_string();
            subset.data = None;
            let meta = serde_json::to_string(&envelope).expect("envelope serializes");
            return vec![WsFrame::Text(meta), WsFrame::Binary(raw)];
        }
    }

    let body = serde_json::to_string(&envelope).expect("envelope serializes");
    vec![WsFrame::Text(body)]
}

fn error_frame(message: String) -> WsFrame {
    WsFrame::Text(json!({"status": "error", "message": message}).to_string())
}
