//! Response collaborator integration tests.
//!
//! Tests verify:
//! - Static files are served with a content type, misses get a JSON 404
//! - Paths cannot escape the static root
//! - Views render templates with data and fall back to literal templates
//! - Cookies are emitted as separate Set-Cookie headers

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use wicket::{
    App, Cookie, HandlerResult, Request, Response, SameSite, ServerConfig, StaticFiles, Views,
};

use super::test_utils::{empty_request, send};

fn files_router(root: &std::path::Path) -> axum::Router {
    let files = Arc::new(StaticFiles::new(root));

    App::new(ServerConfig::default())
        .get("/files/:name", move |req: Request| {
            let files = Arc::clone(&files);
            async move {
                let name = req.param("name").unwrap_or_default();
                let res: HandlerResult = Ok(Response::file(&files, name).await?);
                res
            }
        })
        .build()
        .unwrap()
        .into_router()
}

#[tokio::test]
async fn test_serves_static_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();
    std::fs::write(dir.path().join("data.json"), r#"{"ok":true}"#).unwrap();
    let router = files_router(dir.path());

    let res = send(router.clone(), empty_request(Method::GET, "/files/notes.txt")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), "remember the milk");
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(res.header("accept-ranges"), Some("bytes"));

    let res = send(router, empty_request(Method::GET, "/files/data.json")).await;
    assert_eq!(res.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_missing_file_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = files_router(dir.path());

    let res = send(router, empty_request(Method::GET, "/files/absent.png")).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json(), json!({ "message": "absent.png not found." }));
}

#[tokio::test]
async fn test_traversal_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("public");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
    let files = StaticFiles::new(&root);

    let res = Response::file(&files, "../secret.txt").await.unwrap();
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let res = Response::file(&files, "%2e%2e/secret.txt").await.unwrap();
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_renders_template_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("greet.html"),
        "<p>Hello, {{ name }}!</p>",
    )
    .unwrap();
    let views = Arc::new(Views::with_root(dir.path()));

    let router = App::new(ServerConfig::default())
        .get("/greet", move |req: Request| {
            let views = Arc::clone(&views);
            async move {
                let name = req.query_param("name").unwrap_or("world").to_string();
                let res: HandlerResult =
                    Ok(Response::html(&views, "greet.html", &json!({ "name": name })).await?);
                res
            }
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router.clone(), empty_request(Method::GET, "/greet?name=Ada")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), "<p>Hello, Ada!</p>");
    assert!(res.header("content-type").unwrap().starts_with("text/html"));

    let res = send(router, empty_request(Method::GET, "/greet?name=%3Cb%3E")).await;
    assert_eq!(res.text(), "<p>Hello, &lt;b&gt;!</p>");
}

#[tokio::test]
async fn test_view_without_file_renders_literal_template() {
    let views = Views::new();

    let res = Response::html(&views, "<em>{{ n }}</em>", &json!({ "n": 3 }))
        .await
        .unwrap();

    assert_eq!(std::str::from_utf8(res.body()).unwrap(), "<em>3</em>");
}

#[tokio::test]
async fn test_cookies_are_separate_headers() {
    let router = App::new(ServerConfig::default())
        .get("/", |_req: Request| async move {
            let res: HandlerResult = Ok(Response::text("hi")
                .cookie(&Cookie::new("session", "a b").http_only(true))
                .cookie(&Cookie::new("theme", "dark").same_site(SameSite::Lax)));
            res
        })
        .build()
        .unwrap()
        .into_router();

    let res = send(router, empty_request(Method::GET, "/")).await;

    let cookies: Vec<&str> = res
        .headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("session=a%20b; Path=/"));
    assert!(cookies[0].contains("HttpOnly"));
    assert!(cookies[1].starts_with("theme=dark; Path=/"));
    assert!(cookies[1].ends_with("SameSite=Lax"));
}
