//! Per-request driver.
//!
//! ```text
//! head ──> Request ──> ingest body (not GET/HEAD) ──> middleware ──> route ──> handler
//!                          │ 413                          │ Err              │ 404 / 405
//!                          └──────────────────────────────┴──────────────────┴──> default response
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use http::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use super::app::ServerState;
use super::pipeline::Next;
use super::request::Request;
use super::response::Response;
use crate::body::{parse_body, read_limited};
use crate::error::DispatchError;

/// Whether the method's body is ingested before the pipeline runs.
pub fn expects_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Fallback service driving every request through the pipeline.
pub(crate) async fn handle(
    State(state): State<Arc<ServerState>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let mut req = Request::from_parts(parts);
    let wants_json = req.wants_json();
    let debug_errors = state.config.debug;

    if expects_body(&req.method) {
        match read_limited(body, state.config.max_body_bytes).await {
            Ok(raw) => {
                let parsed = parse_body(req.content_type(), &raw);
                req.body = parsed.body;
                req.files = parsed.files;
            }
            Err(err) => {
                warn!(method = %req.method, url = %req.url, "Rejecting request: {}", err);
                return error_response(&err, wants_json, debug_errors).into_response();
            }
        }
    } else {
        debug!(method = %req.method, "Skipping body ingestion");
    }

    let method = req.method.clone();
    let url = req.url.clone();

    match Next::new(Arc::clone(&state.pipeline)).run(req).await {
        Ok(res) => res.into_response(),
        Err(error) => {
            error!(method = %method, url = %url, "Handler failed: {}", error.chain());
            let err = DispatchError::Handler { method, url, error };
            error_response(&err, wants_json, debug_errors).into_response()
        }
    }
}

/// Default response for a dispatch failure.
///
/// 404 and 405 answer in JSON when the client sent JSON; 413 and 500 are
/// always plain text. With `debug` set, a 500 carries the error chain instead
/// of the generic message.
pub fn error_response(err: &DispatchError, wants_json: bool, debug: bool) -> Response {
    match err {
        DispatchError::NotFound { .. } | DispatchError::MethodNotAllowed { .. } => {
            let status = match err {
                DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::METHOD_NOT_ALLOWED,
            };
            let message = err.to_string();
            if wants_json {
                if let Ok(res) = Response::json(&json!({ "message": message })) {
                    return res.with_status(status);
                }
            }
            Response::text(message).with_status(status)
        }
        DispatchError::PayloadTooLarge { .. } => {
            Response::text(err.to_string()).with_status(StatusCode::PAYLOAD_TOO_LARGE)
        }
        DispatchError::Handler { method, url, error } => {
            let body = if debug {
                error.chain()
            } else {
                format!(
                    "Server error.\nRoute: {}\nMethod: {}\nTimestamp: {}\n",
                    url,
                    method,
                    now_millis()
                )
            };
            Response::text(body).with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        error_response(&self, false, false).into_response()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
