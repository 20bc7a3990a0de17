//! Test utilities for integration tests.
//!
//! Request builders, a response collector and a few stock handlers.

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use wicket::{HandlerResult, Request as WicketRequest, Response};

// =============================================================================
// Collected Responses
// =============================================================================

/// A response with its body read to the end.
pub struct Collected {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Collected {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("body is not UTF-8")
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Send one request through the router and collect the response.
pub async fn send(router: Router, request: Request<Body>) -> Collected {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Collected {
        status,
        headers,
        body,
    }
}

// =============================================================================
// Request Builders
// =============================================================================

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A part of a hand-built multipart body.
pub enum Part<'a> {
    Field(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        content: &'a [u8],
    },
}

/// Encode `parts` as `multipart/form-data` with CRLF framing.
pub fn multipart_body(boundary: &str, parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            Part::Field(name, value) => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            Part::File {
                field,
                file_name,
                content_type,
                content,
            } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(content);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    out
}

pub fn multipart_request(uri: &str, boundary: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart_body(boundary, parts)))
        .unwrap()
}

// =============================================================================
// Stock Handlers
// =============================================================================

/// Echo the parsed request back as JSON.
pub async fn echo(req: WicketRequest) -> HandlerResult {
    let files: Vec<Value> = req
        .files
        .iter()
        .map(|f| {
            json!({
                "field": f.field,
                "fileName": f.file_name,
                "contentType": f.content_type,
                "content": String::from_utf8_lossy(&f.content),
            })
        })
        .collect();

    Ok(Response::json(&json!({
        "method": req.method.as_str(),
        "path": req.path(),
        "query": req.query,
        "params": req.params,
        "body": req.body,
        "files": files,
    }))?)
}

/// Reply with a fixed text body.
pub fn text(tag: &'static str) -> impl Fn(WicketRequest) -> std::future::Ready<HandlerResult> + Send + Sync + 'static {
    move |_req| std::future::ready(Ok(Response::text(tag)))
}
