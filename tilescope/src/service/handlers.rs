//! HTTP request handlers and CORS middleware.

use super::AppState;
use crate::viewport::{self, CameraRequest};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header::HeaderValue, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::debug;

/// Append the permissive CORS headers to every response.
pub async fn cors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// `OPTIONS /api/camera-state` - CORS preflight.
pub async fn camera_state_preflight() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Access-Control-Max-Age", HeaderValue::from_static("86400"));
    (StatusCode::NO_CONTENT, headers).into_response()
}

/// `POST /api/camera-state`
///
/// Parses the JSON envelope, runs the viewport pipeline, and returns
/// the response envelope. Parse and reprojection failures map to 400
/// with a JSON error body.
pub async fn camera_state(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CameraRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(err.to_string()),
    };

    debug!(zoom = request.zoom, "camera state request");

    match viewport::process_camera_state(
        &request,
        &state.bvh,
        state.reader.as_deref(),
        &state.camera,
    ) {
        Ok(processed) => Json(processed.envelope).into_response(),
        Err(err) => error_response(err.to_string()),
    }
}

/// Any unrecognized method/path combination.
pub async fn unsupported() -> Response {
    error_response("Unsupported endpoint".to_string())
}

fn error_response(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}
