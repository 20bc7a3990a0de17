//! Request-handling engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     axum / hyper (framing)                      │
//! │                               │                                 │
//! │  ┌──────────────┐  ┌──────────▼───────┐  ┌──────────────────┐   │
//! │  │     app      │  │     dispatch     │  │     pipeline     │   │
//! │  │ (builder,    │──│ (ingest, errors) │──│ (middleware,     │   │
//! │  │  layers)     │  │                  │  │  route dispatch) │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘   │
//! │         request (context)          response (surface)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod dispatch;
pub mod pipeline;
pub mod request;
pub mod response;

pub use app::{App, Server, ServerConfig};
pub use dispatch::{error_response, expects_body};
pub use pipeline::{Handler, HandlerResult, Middleware, Next};
pub use request::Request;
pub use response::{ErrorResponse, Response};
