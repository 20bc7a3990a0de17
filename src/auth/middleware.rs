//! Bearer-token guard.
//!
//! [`BearerAuth`] is a [`Middleware`] that reads `Authorization: Bearer
//! <token>`, verifies it, and exposes the claims to later middleware and
//! handlers through [`Claims`] in the request extensions. Requests without a
//! valid token are answered with a 401 JSON body and never reach the route.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::token::TokenAuth;
use crate::error::TokenError;
use crate::server::{ErrorResponse, HandlerResult, Middleware, Next, Request};

/// Verified claims, stored in [`Request::extensions`].
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A string claim.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Middleware that requires a valid bearer token.
#[derive(Clone)]
pub struct BearerAuth {
    auth: Arc<TokenAuth>,
    secret: String,
    prefixes: Vec<String>,
}

impl BearerAuth {
    /// Guard every request.
    pub fn new(auth: Arc<TokenAuth>, secret: impl Into<String>) -> Self {
        Self {
            auth,
            secret: secret.into(),
            prefixes: Vec::new(),
        }
    }

    /// Only guard paths starting with one of `prefixes`.
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn protects(&self, path: &str) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(&self, mut req: Request, next: Next) -> HandlerResult {
        if !self.protects(req.path()) {
            return next.run(req).await;
        }

        let Some(token) = bearer_token(&req) else {
            debug!(path = req.path(), "Missing bearer token");
            return Ok(ErrorResponse::with_status(
                "missing_token",
                "Missing bearer token",
                StatusCode::UNAUTHORIZED,
            )
            .into_json_response());
        };

        match self.auth.verify(token, &self.secret) {
            Ok(claims) => {
                req.extensions.insert(Claims(claims));
                next.run(req).await
            }
            Err(err) => Ok(rejection(&err, req.path())),
        }
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn rejection(err: &TokenError, path: &str) -> crate::server::Response {
    let error_type = match err {
        TokenError::Format => "invalid_token_format",
        TokenError::InvalidSignature => "invalid_signature",
        TokenError::ClockRollback { .. } => "clock_rollback",
        TokenError::Expired { .. } => "token_expired",
        TokenError::InvalidExpiry => "invalid_expiry",
        _ => "invalid_token",
    };

    // Signature and clock problems may be an attack; the rest is routine.
    match err {
        TokenError::InvalidSignature | TokenError::ClockRollback { .. } => {
            warn!(error_type, path, "Authentication failed: {}", err);
        }
        _ => {
            debug!(error_type, path, "Authentication failed: {}", err);
        }
    }

    ErrorResponse::with_status(error_type, err.to_string(), StatusCode::UNAUTHORIZED)
        .into_json_response()
}
