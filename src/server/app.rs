//! Application builder and server.
//!
//! # Example
//!
//! ```rust,no_run
//! use wicket::{App, HandlerResult, Request, Response, ServerConfig};
//!
//! async fn hello(req: Request) -> HandlerResult {
//!     let name = req.param("name").unwrap_or("world");
//!     Ok(Response::text(format!("Hello, {}!", name)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = App::new(ServerConfig::default())
//!         .get("/hello/:name", hello)
//!         .build()?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     server.serve(listener).await?;
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::dispatch;
use super::pipeline::{Handler, Middleware, Pipeline};
use crate::body::DEFAULT_MAX_BODY_BYTES;
use crate::error::RouteError;
use crate::router::RouteTable;

// =============================================================================
// Server Configuration
// =============================================================================

/// Runtime settings for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,

    /// Put the error chain in 500 bodies
    pub debug: bool,

    /// Allowed CORS origins (None = no CORS layer; empty or "*" = any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            debug: false,
            cors_origins: None,
            enable_tracing: true,
        }
    }
}

impl ServerConfig {
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

/// State shared by every request.
pub(crate) struct ServerState {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) config: ServerConfig,
}

// =============================================================================
// App Builder
// =============================================================================

/// Collects routes and middleware, then freezes them into a [`Server`].
///
/// Registration methods chain; the first invalid template is remembered and
/// reported by [`App::build`].
pub struct App {
    config: ServerConfig,
    routes: RouteTable,
    middleware: Vec<Arc<dyn Middleware>>,
    error: Option<RouteError>,
}

impl App {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            middleware: Vec::new(),
            error: None,
        }
    }

    /// Register `handler` for `method` on `path`.
    pub fn route<H: Handler>(mut self, method: Method, path: &str, handler: H) -> Self {
        if let Err(e) = self.routes.insert(method, path, Arc::new(handler)) {
            error!("Route registration failed: {}", e);
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn get<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::DELETE, path, handler)
    }

    pub fn head<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::HEAD, path, handler)
    }

    pub fn options<H: Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Append a middleware; middleware runs in registration order.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Freeze the tables.
    pub fn build(self) -> Result<Server, RouteError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        info!(
            routes = self.routes.len(),
            middleware = self.middleware.len(),
            "Application built"
        );

        Ok(Server {
            state: Arc::new(ServerState {
                pipeline: Arc::new(Pipeline::new(self.middleware, self.routes)),
                config: self.config,
            }),
        })
    }
}

// =============================================================================
// Server
// =============================================================================

/// A built application, ready to serve.
#[derive(Clone)]
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Number of registered route templates.
    pub fn route_count(&self) -> usize {
        self.state.pipeline.routes().len()
    }

    pub fn middleware_count(&self) -> usize {
        self.state.pipeline.middleware_count()
    }

    /// The axum router: one fallback service plus panic catching, CORS and
    /// tracing layers.
    pub fn into_router(self) -> Router {
        let config = self.state.config.clone();

        let mut router = Router::new()
            .fallback(dispatch::handle)
            .with_state(self.state)
            .layer(CatchPanicLayer::custom(panic_response));

        if let Some(ref origins) = config.cors_origins {
            router = router.layer(build_cors_layer(origins));
        }

        if config.enable_tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Serve until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.into_router()).await
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Build the CORS layer; an empty list or `*` allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(AnyOrigin)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}

/// 500 for a handler that panicked.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> http::Response<String> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Handler panicked");

    let mut res = http::Response::new("Server error.\n".to_string());
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain"),
    );
    res
}
