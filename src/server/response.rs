//! Response surface handed back by middleware and handlers.
//!
//! A [`Response`] is a plain value: status, headers and a fully buffered
//! body. Handlers build one with the constructors below and the dispatcher
//! converts it into an HTTP response exactly once.

use axum::body::Body;
use axum::response::IntoResponse;
use bytes::Bytes;
use http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::cookie::Cookie;
use crate::error::{InvalidStatus, ViewError};
use crate::static_files::StaticFiles;
use crate::views::Views;

// =============================================================================
// Response
// =============================================================================

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Empty 200 response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Plain-text response.
    ///
    /// An empty message is treated as a failure and becomes a 500 with the
    /// body `Server error`.
    pub fn text(message: impl Into<String>) -> Self {
        let mut message = message.into();
        let mut status = StatusCode::OK;
        if message.is_empty() {
            status = StatusCode::INTERNAL_SERVER_ERROR;
            message = "Server error".to_string();
        }
        Self::new()
            .with_status(status)
            .with_body("text/plain", Bytes::from(message))
    }

    /// JSON response.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new().with_body("application/json", Bytes::from(body)))
    }

    /// Render `template` with `data` and send it as HTML.
    pub async fn html(views: &Views, template: &str, data: &Value) -> Result<Self, ViewError> {
        let rendered = views.render(template, data).await?;
        Ok(Self::new().with_body("text/html", Bytes::from(rendered)))
    }

    /// Send a file from the static root.
    ///
    /// A missing file (or a path that escapes the root) yields a 404 with a
    /// JSON `{"message": "<name> not found."}` body; other I/O failures are
    /// returned to the caller.
    pub async fn file(files: &StaticFiles, path: &str) -> Result<Self, std::io::Error> {
        match files.load(path).await {
            Ok((bytes, content_type)) => {
                let mut res = Self::new().with_body(content_type, bytes);
                res.headers
                    .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                Ok(res)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let message = format!("{} not found.", file_label(path));
                let mut res = Self::json(&serde_json::json!({ "message": message }))
                    .map_err(std::io::Error::other)?
                    .with_status(StatusCode::NOT_FOUND);
                res.headers
                    .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                Ok(res)
            }
            Err(e) => Err(e),
        }
    }

    /// Set the status from a numeric code, rejecting anything outside 100-599.
    pub fn status(self, code: u16) -> Result<Self, InvalidStatus> {
        if !(100..=599).contains(&code) {
            return Err(InvalidStatus(code));
        }
        let status = StatusCode::from_u16(code).map_err(|_| InvalidStatus(code))?;
        Ok(self.with_status(status))
    }

    /// Set the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set (replace) a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a `Set-Cookie` header.
    pub fn cookie(mut self, cookie: &Cookie) -> Self {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = cookie.name(), "Dropping cookie with invalid header value"),
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn with_body(mut self, content_type: &str, body: Bytes) -> Self {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = body;
        self
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut res = axum::response::Response::new(Body::from(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Last path segment of a requested file, query removed.
fn file_label(path: &str) -> &str {
    let path = crate::router::strip_query(path).trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

// =============================================================================
// Error Response
// =============================================================================

/// JSON error body used by the bearer guard.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "unauthorized", "token_expired")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }

    /// Render as a JSON [`Response`] carrying `status` (500 if unset).
    pub fn into_json_response(self) -> Response {
        let status = self
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match Response::json(&self) {
            Ok(res) => res.with_status(status),
            Err(_) => Response::text(self.message).with_status(status),
        }
    }
}
