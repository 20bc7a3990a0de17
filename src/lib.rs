//! # Wicket
//!
//! A small HTTP server runtime: pattern routing, an ordered middleware
//! chain, size-capped body ingestion with multipart parsing, and
//! HMAC-SHA256 signed tokens.
//!
//! ## Architecture
//!
//! - [`router`] - Route templates and the static/dynamic route table
//! - [`server`] - App builder, middleware pipeline, dispatcher, request and response
//! - [`body`] - Streaming ingestion and body classification (JSON, form, multipart)
//! - [`auth`] - Signed tokens and a bearer-token guard
//! - [`views`], [`static_files`], [`cookie`] - Response collaborators
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wicket::{App, HandlerResult, Next, Request, Response, ServerConfig};
//!
//! async fn update_user(req: Request) -> HandlerResult {
//!     let id = req.param("id").unwrap_or_default().to_string();
//!     Ok(Response::json(&serde_json::json!({ "id": id, "body": req.body }))?)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = App::new(ServerConfig::default())
//!         .middleware(|req: Request, next: Next| async move {
//!             tracing::info!(method = %req.method, url = %req.url, "request");
//!             next.run(req).await
//!         })
//!         .put("/users/:id", update_user)
//!         .build()?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     server.serve(listener).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod body;
pub mod config;
pub mod cookie;
pub mod error;
pub mod router;
pub mod server;
pub mod static_files;
pub mod views;

// Re-export commonly used types
pub use auth::{BearerAuth, Claims, SignOptions, TokenAuth};
pub use body::{parse_body, ParsedBody, UploadedFile};
pub use config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, VerifyConfig};
pub use cookie::{Cookie, SameSite};
pub use error::{
    DispatchError, HandlerError, InvalidStatus, RouteError, TokenError, ViewError,
};
pub use router::{RouteMatch, RoutePattern, RouteTable};
pub use server::{
    App, ErrorResponse, Handler, HandlerResult, Middleware, Next, Request, Response, Server,
    ServerConfig,
};
pub use static_files::StaticFiles;
pub use views::Views;
