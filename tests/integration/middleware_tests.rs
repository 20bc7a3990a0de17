//! Middleware integration tests.
//!
//! Tests verify:
//! - Middleware runs in registration order before the handler
//! - A middleware can answer without continuing
//! - A failing middleware or handler becomes a 500
//! - Values attached by middleware reach the handler

use std::sync::{Arc, Mutex};

use axum::http::{Method, StatusCode};

use wicket::{App, HandlerError, HandlerResult, Next, Request, Response, ServerConfig};

use super::test_utils::{empty_request, send, text};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recorder(log: &Log, tag: &'static str) -> impl Fn(Request, Next) -> futures_util::future::BoxFuture<'static, HandlerResult> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |req, next| {
        log.lock().unwrap().push(tag);
        next.run(req)
    }
}

#[tokio::test]
async fn test_middleware_runs_in_registration_order() {
    let log: Log = Arc::default();
    let handler_log = Arc::clone(&log);

    let router = App::new(ServerConfig::default())
        .middleware(recorder(&log, "first"))
        .middleware(recorder(&log, "second"))
        .middleware(recorder(&log, "third"))
        .get("/", move |_req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler");
                let res: HandlerResult = Ok(Response::text("ok"));
                res
            }
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third", "handler"]);
}

#[tokio::test]
async fn test_middleware_runs_for_unmatched_routes() {
    let log: Log = Arc::default();

    let router = App::new(ServerConfig::default())
        .middleware(recorder(&log, "seen"))
        .get("/", text("home"))
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/nowhere")).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(*log.lock().unwrap(), vec!["seen"]);
}

#[tokio::test]
async fn test_short_circuit_skips_handler() {
    let log: Log = Arc::default();

    let router = App::new(ServerConfig::default())
        .middleware(|req: Request, next: Next| async move {
            if req.header("x-api-key") != Some("letmein") {
                return Ok(Response::text("denied").with_status(StatusCode::FORBIDDEN));
            }
            next.run(req).await
        })
        .middleware(recorder(&log, "after"))
        .get("/", text("home"))
        .build()
        .unwrap()
        .into_router();

    let res = send(router.clone(), empty_request(Method::GET, "/")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.text(), "denied");
    assert!(log.lock().unwrap().is_empty());

    let request = axum::http::Request::builder()
        .uri("/")
        .header("X-Api-Key", "letmein")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), "home");
    assert_eq!(*log.lock().unwrap(), vec!["after"]);
}

#[tokio::test]
async fn test_failing_middleware_yields_500() {
    let router = App::new(ServerConfig::default())
        .middleware(|_req: Request, _next: Next| async move {
            let res: HandlerResult = Err(HandlerError::msg("database unavailable"));
            res
        })
        .get("/orders", text("never"))
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/orders?page=2")).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.text();
    assert!(body.starts_with("Server error.\n"));
    assert!(body.contains("Route: /orders?page=2\n"));
    assert!(body.contains("Method: GET\n"));
    assert!(body.contains("Timestamp: "));
    assert!(!body.contains("database unavailable"));
}

#[tokio::test]
async fn test_debug_mode_exposes_error_chain() {
    let router = App::new(ServerConfig::default().with_debug(true))
        .get("/", |_req: Request| async move {
            let res: HandlerResult = Err(HandlerError::msg("database unavailable"));
            res
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/")).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().contains("database unavailable"));
}

#[tokio::test]
async fn test_handler_panic_yields_500() {
    let router = App::new(ServerConfig::default())
        .get("/panic", |_req: Request| async move {
            if true {
                panic!("handler exploded");
            }
            let res: HandlerResult = Ok(Response::text("unreachable"));
            res
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/panic")).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text(), "Server error.\n");
}

#[derive(Clone)]
struct RequestId(u32);

#[tokio::test]
async fn test_extensions_flow_to_handler() {
    let router = App::new(ServerConfig::default())
        .middleware(|mut req: Request, next: Next| {
            req.extensions.insert(RequestId(7));
            next.run(req)
        })
        .get("/", |req: Request| async move {
            let id = req.extensions.get::<RequestId>().map(|r| r.0).unwrap_or(0);
            let res: HandlerResult = Ok(Response::text(format!("request {}", id)));
            res
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/")).await;
    assert_eq!(res.text(), "request 7");
}
