//! Live server tests.
//!
//! These bind a real listener on an ephemeral port and talk to it over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use wicket::{App, ServerConfig};

use super::test_utils::{echo, text};

async fn spawn(app: App) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let server = app.build().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (addr, tx, handle)
}

#[tokio::test]
async fn test_multipart_upload_over_tcp() {
    let app = App::new(ServerConfig::default().with_tracing(false)).post("/upload", echo);
    let (addr, shutdown, handle) = spawn(app).await;

    let form = Form::new()
        .text("title", "holiday")
        .text("album", "2024")
        .part(
            "photo",
            Part::bytes(b"\x89PNG fake image bytes".to_vec())
                .file_name("beach.png")
                .mime_str("image/png")
                .unwrap(),
        );

    let res = reqwest::Client::new()
        .post(format!("http://{}/upload", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["body"], json!({ "title": "holiday", "album": "2024" }));
    assert_eq!(body["files"][0]["field"], "photo");
    assert_eq!(body["files"][0]["fileName"], "beach.png");
    assert_eq!(body["files"][0]["contentType"], "image/png");

    shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_json_and_errors_over_tcp() {
    let app = App::new(ServerConfig::default().with_max_body_bytes(1024))
        .get("/", text("home"))
        .put("/users/:id", echo);
    let (addr, shutdown, _handle) = spawn(app).await;
    let client = reqwest::Client::new();

    let res = client
        .put(format!("http://{}/users/42", addr))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["params"]["id"], "42");
    assert_eq!(body["body"]["name"], "Ada");

    let res = client
        .get(format!("http://{}/nope", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .put(format!("http://{}/users/1", addr))
        .body(vec![b'x'; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.send(()).unwrap();
}

#[tokio::test]
async fn test_cors_headers_when_enabled() {
    let app = App::new(
        ServerConfig::default().with_cors_origins(vec!["https://app.example".to_string()]),
    )
    .get("/", text("home"));
    let (addr, shutdown, _handle) = spawn(app).await;

    let res = reqwest::Client::new()
        .get(format!("http://{}/", addr))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example")
    );

    shutdown.send(()).unwrap();
}
