//! Bearer-token integration tests.
//!
//! Tests verify:
//! - A token issued by a login route unlocks a guarded route
//! - Missing, tampered and foreign tokens are rejected with 401
//! - Unguarded paths stay public

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request as HttpRequest, StatusCode};
use serde_json::json;

use wicket::{
    App, BearerAuth, Claims, HandlerResult, Request, Response, ServerConfig, SignOptions,
    TokenAuth,
};

use super::test_utils::{empty_request, json_request, send, text};

const SECRET: &str = "integration-secret";

fn auth_router(tokens: Arc<TokenAuth>) -> axum::Router {
    let login_tokens = Arc::clone(&tokens);

    App::new(ServerConfig::default())
        .middleware(BearerAuth::new(tokens, SECRET).with_prefixes(["/me", "/admin"]))
        .get("/public", text("open"))
        .post("/login", move |req: Request| {
            let tokens = Arc::clone(&login_tokens);
            async move {
                let user = req.body_str("user").unwrap_or("anonymous").to_string();
                let options = SignOptions::default().with_expires_in(Duration::from_secs(60));
                let token = tokens.sign(&json!({ "sub": user, "role": "reader" }), SECRET, &options)?;
                let res: HandlerResult = Ok(Response::json(&json!({ "token": token }))?);
                res
            }
        })
        .get("/me", |req: Request| async move {
            let claims = req.extensions.get::<Claims>().cloned();
            let res: HandlerResult = match claims {
                Some(claims) => Ok(Response::json(&claims.0)?),
                None => Ok(Response::text("no claims")),
            };
            res
        })
        .build()
        .unwrap()
        .into_router()
}

fn bearer(uri: &str, token: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login(router: axum::Router, user: &str) -> String {
    let res = send(router, json_request(Method::POST, "/login", &json!({ "user": user }))).await;
    assert_eq!(res.status, StatusCode::OK);
    res.json()["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_login_then_me() {
    let router = auth_router(Arc::new(TokenAuth::new()));

    let token = login(router.clone(), "ada").await;
    assert_eq!(token.split('.').count(), 3);

    let res = send(router, bearer("/me", &token)).await;

    assert_eq!(res.status, StatusCode::OK);
    let claims = res.json();
    assert_eq!(claims["sub"], "ada");
    assert_eq!(claims["role"], "reader");
    assert!(claims["exp"].is_u64());
    assert!(claims.get("_gen_ts").is_none());
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let router = auth_router(Arc::new(TokenAuth::new()));

    let res = send(router, empty_request(Method::GET, "/me")).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "missing_token");
}

#[tokio::test]
async fn test_tampered_token_is_401() {
    let router = auth_router(Arc::new(TokenAuth::new()));
    let token = login(router.clone(), "ada").await;

    let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
    let forged = TokenAuth::new()
        .sign(&json!({ "sub": "mallory" }), SECRET, &SignOptions::default())
        .unwrap();
    segments[1] = forged.split('.').nth(1).unwrap().to_string();
    let tampered = segments.join(".");

    let res = send(router, bearer("/me", &tampered)).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "invalid_signature");
}

#[tokio::test]
async fn test_token_from_other_secret_is_401() {
    let router = auth_router(Arc::new(TokenAuth::new()));
    let foreign = TokenAuth::new()
        .sign(&json!({ "sub": "ada" }), "other-secret", &SignOptions::default())
        .unwrap();

    let res = send(router, bearer("/me", &foreign)).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "invalid_signature");
}

#[tokio::test]
async fn test_malformed_token_is_401() {
    let router = auth_router(Arc::new(TokenAuth::new()));

    let res = send(router, bearer("/me", "not-a-token")).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "invalid_token_format");
}

#[tokio::test]
async fn test_unguarded_route_is_public() {
    let router = auth_router(Arc::new(TokenAuth::new()));

    let res = send(router, empty_request(Method::GET, "/public")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), "open");
}
