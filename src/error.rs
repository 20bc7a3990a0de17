//! Error types for routing, dispatch, tokens and views.

use std::fmt;

use http::Method;
use thiserror::Error;

/// Boxed error type accepted from handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while compiling a route template at registration time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// Template is not a usable path pattern
    #[error("Invalid route template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The same placeholder name appears twice in one template
    #[error("Duplicate parameter :{name} in route template {template:?}")]
    DuplicateParam { template: String, name: String },
}

/// Per-request failures surfaced by the dispatcher.
///
/// Each variant maps to exactly one HTTP status; see
/// [`crate::server::dispatch::error_response`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered pattern matches the url (404)
    #[error("Route {url} not found for method {method}.")]
    NotFound { method: Method, url: String },

    /// A pattern matches but has no handler for the method (405)
    #[error("Method {method} not allowed by route {url}.")]
    MethodNotAllowed { method: Method, url: String },

    /// Body ingestion exceeded the configured cap (413)
    #[error("Payload Too Large")]
    PayloadTooLarge { limit: usize, received: usize },

    /// A middleware or route handler failed (500)
    #[error("Server error.")]
    Handler {
        method: Method,
        url: String,
        error: HandlerError,
    },
}

/// Errors produced by the signed-token module.
///
/// Signature mismatches and undecodable segments deliberately share
/// [`TokenError::InvalidSignature`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TokenError {
    /// Token is not three non-empty dot-separated segments
    #[error("Invalid token format")]
    Format,

    /// MAC mismatch, wrong secret, or a segment that failed to decode
    #[error("Invalid signature")]
    InvalidSignature,

    /// Verifying clock is behind the token's generation time beyond tolerance
    #[error("System clock appears to have moved backward, token rejected (generated at {generated_at}, now {current_time})")]
    ClockRollback { generated_at: i64, current_time: i64 },

    /// The `exp` claim has passed
    #[error("Token expired")]
    Expired { expired_at: f64 },

    /// The `exp` claim is present but not numeric
    #[error("Expiry must be numeric.")]
    InvalidExpiry,

    /// Payload handed to `sign` is not a key/value object
    #[error("Payload to sign must be an object, got {found}")]
    PayloadType { found: &'static str },

    /// Secret is empty
    #[error("Secret must be a non-empty string")]
    EmptySecret,

    /// Claims could not be serialized
    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Errors from rendering an HTML view.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Status code outside the 100-599 range.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid status code {0}")]
pub struct InvalidStatus(pub u16);

/// Error returned by a failing handler or middleware.
///
/// Any `std::error::Error` converts into it, so handlers can use `?` freely.
/// It intentionally does not implement `std::error::Error` itself.
pub struct HandlerError {
    inner: BoxError,
}

impl HandlerError {
    /// Wrap an existing error.
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self {
            inner: error.into(),
        }
    }

    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: message.into().into(),
        }
    }

    /// Borrow the underlying error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Render the full source chain, one cause per line.
    pub fn chain(&self) -> String {
        let mut out = self.inner.to_string();
        let mut source = self.inner.source();
        while let Some(cause) = source {
            out.push_str("\nCaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self {
            inner: Box::new(error),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
