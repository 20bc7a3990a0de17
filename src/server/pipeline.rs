//! Handler and middleware traits, and the cursor that walks the chain.
//!
//! # Execution model
//!
//! ```text
//! Next(0).run(req) → mw[0].handle(req, Next(1))
//!                        └─ next.run(req) → mw[1].handle(req, Next(2))
//!                                               └─ next.run(req) → route dispatch
//! ```
//!
//! `Next::run` consumes the continuation, so a middleware can call it at most
//! once. Returning a response without calling it ends the chain early;
//! returning `Err` aborts the chain and the dispatcher answers 500.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::debug;

use super::dispatch::error_response;
use super::request::Request;
use super::response::Response;
use crate::error::{DispatchError, HandlerError};
use crate::router::{RouteMatch, RouteTable};

/// Result every handler and middleware produces.
pub type HandlerResult = Result<Response, HandlerError>;

/// A route handler.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = HandlerResult>`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Request) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, req: Request) -> HandlerResult {
        (self)(req).await
    }
}

/// A step in the pre-dispatch chain.
///
/// Implemented for every `Fn(Request, Next) -> impl Future<Output = HandlerResult>`.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, req: Request, next: Next) -> HandlerResult {
        (self)(req, next).await
    }
}

/// Ordered middleware followed by the route table.
pub(crate) struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    routes: RouteTable,
}

impl Pipeline {
    pub(crate) fn new(middleware: Vec<Arc<dyn Middleware>>, routes: RouteTable) -> Self {
        Self { middleware, routes }
    }

    pub(crate) fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub(crate) fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    async fn dispatch(&self, mut req: Request) -> HandlerResult {
        let (handler, params) = match self.routes.resolve(&req.method, &req.url) {
            RouteMatch::Found {
                handler,
                params,
                pattern,
            } => {
                debug!(method = %req.method, route = pattern.template(), "Route matched");
                (handler, params)
            }
            RouteMatch::MethodNotAllowed { pattern } => {
                debug!(method = %req.method, route = pattern.template(), "Method not allowed");
                let err = DispatchError::MethodNotAllowed {
                    method: req.method.clone(),
                    url: req.url.clone(),
                };
                return Ok(error_response(&err, req.wants_json(), false));
            }
            RouteMatch::NotFound => {
                debug!(method = %req.method, url = %req.url, "No route matched");
                let err = DispatchError::NotFound {
                    method: req.method.clone(),
                    url: req.url.clone(),
                };
                return Ok(error_response(&err, req.wants_json(), false));
            }
        };

        req.params = params;
        handler.call(req).await
    }
}

/// Continuation handed to each middleware.
pub struct Next {
    pipeline: Arc<Pipeline>,
    cursor: usize,
}

impl Next {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            cursor: 0,
        }
    }

    /// Run the rest of the chain, then route dispatch.
    pub fn run(self, req: Request) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            match self.pipeline.middleware.get(self.cursor) {
                Some(middleware) => {
                    let middleware = Arc::clone(middleware);
                    let next = Next {
                        pipeline: Arc::clone(&self.pipeline),
                        cursor: self.cursor + 1,
                    };
                    middleware.handle(req, next).await
                }
                None => self.pipeline.dispatch(req).await,
            }
        })
    }

    /// Position of the middleware this continuation will run next.
    pub fn position(&self) -> usize {
        self.cursor
    }
}
