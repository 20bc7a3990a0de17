//! Wicket - a small HTTP server runtime.
//!
//! This binary runs a demonstration application and offers token tooling.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wicket::{
    auth::{BearerAuth, Claims, SignOptions, TokenAuth},
    config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, VerifyConfig},
    App, Cookie, HandlerError, HandlerResult, Next, Request, Response, SameSite, StaticFiles,
    Views,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
        Command::Verify(config) => run_verify(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Body limit: {} MiB", config.max_body_mb);
    info!("  Views: {}", config.view_root);
    info!("  Static files: {}", config.static_root);
    if config.debug {
        warn!("  Debug: ENABLED - error chains are sent to clients");
    }
    if config.token_secret.is_none() {
        warn!("  Tokens: no secret set, /login and /me are disabled");
    }

    let server = match build_demo_app(&config).build() {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to build application: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/?version=1", addr);
    info!("    curl -X PUT -d '{{\"name\":\"x\"}}' http://{}/users/42", addr);
    info!("    curl -F title=hi -F file=@Cargo.toml http://{}/upload", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    if let Err(e) = server.serve_with_shutdown(listener, shutdown_signal()).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Assemble the demonstration routes.
fn build_demo_app(config: &ServeConfig) -> App {
    let views = Arc::new(Views::with_root(&config.view_root));
    let files = Arc::new(StaticFiles::new(&config.static_root));

    let mut app = App::new(config.server_config())
        .middleware(log_requests)
        .get("/", index)
        .get("/query", echo)
        .post("/post", echo)
        .put("/users/:id", echo)
        .post("/upload", upload)
        .get("/files/:path", move |req: Request| {
            let files = Arc::clone(&files);
            async move {
                let path = req.param("path").unwrap_or_default();
                let res: HandlerResult = Ok(Response::file(&files, path).await?);
                res
            }
        })
        .get("/web/hello", move |req: Request| {
            let views = Arc::clone(&views);
            async move {
                let name = req.query_param("name").unwrap_or("world");
                let data = json!({
                    "name": name,
                    "items": ["routing", "middleware", "multipart", "tokens"],
                });
                let res: HandlerResult = Ok(Response::html(&views, "hello.html", &data).await?);
                res
            }
        });

    if let Some(secret) = config.token_secret.clone() {
        let tokens = Arc::new(TokenAuth::new());
        let login_tokens = Arc::clone(&tokens);
        let login_secret = secret.clone();

        app = app
            .middleware(BearerAuth::new(tokens, secret).with_prefixes(["/me"]))
            .post("/login", move |req: Request| {
                let tokens = Arc::clone(&login_tokens);
                let secret = login_secret.clone();
                async move { login(&tokens, &secret, req) }
            })
            .get("/me", me);
    }

    app
}

async fn log_requests(req: Request, next: Next) -> HandlerResult {
    let method = req.method.clone();
    let url = req.url.clone();
    let started = Instant::now();

    let result = next.run(req).await;
    match &result {
        Ok(res) => info!(
            method = %method,
            url = %url,
            status = res.status_code().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handled request"
        ),
        Err(e) => warn!(method = %method, url = %url, "Request failed: {}", e),
    }
    result
}

async fn index(req: Request) -> HandlerResult {
    let message = match req.query_param("version") {
        Some(version) => format!("Hello from Wicket (v{})", version),
        None => "Hello from Wicket".to_string(),
    };

    Ok(Response::text(message)
        .cookie(&Cookie::new("session", "abc").http_only(true))
        .cookie(&Cookie::new("theme", "dark").same_site(SameSite::Lax)))
}

async fn echo(req: Request) -> HandlerResult {
    Ok(Response::json(&json!({
        "query": req.query,
        "params": req.params,
        "body": req.body,
        "now": now_millis(),
    }))?)
}

async fn upload(req: Request) -> HandlerResult {
    let files: Vec<Value> = req
        .files
        .iter()
        .map(|f| {
            json!({
                "field": f.field,
                "fileName": f.file_name,
                "contentType": f.content_type,
                "size": f.content.len(),
            })
        })
        .collect();

    Ok(Response::json(&json!({
        "received": true,
        "filesCount": files.len(),
        "files": files,
        "body": req.body,
    }))?)
}

fn login(tokens: &TokenAuth, secret: &str, req: Request) -> HandlerResult {
    let Some(user) = req.body_str("user") else {
        return Ok(Response::json(&json!({ "message": "Field 'user' is required." }))?
            .with_status(http::StatusCode::BAD_REQUEST));
    };

    let options = SignOptions::default().with_expires_in(std::time::Duration::from_secs(3600));
    let token = tokens
        .sign(&json!({ "sub": user }), secret, &options)
        .map_err(HandlerError::from)?;
    Ok(Response::json(&json!({ "token": token }))?)
}

async fn me(req: Request) -> HandlerResult {
    let claims = req
        .extensions
        .get::<Claims>()
        .ok_or_else(|| HandlerError::msg("claims missing from a guarded route"))?;
    Ok(Response::json(&claims.0)?)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wicket=debug,tower_http=debug"
    } else {
        "wicket=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Sign / Verify Commands
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let claims = match config.parse_claims() {
        Ok(claims) => claims,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut options = SignOptions::default();
    options.expires_in = config.expires_in();

    let token = match TokenAuth::new().sign(&claims, &config.secret, &options) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        SignOutputFormat::Token => println!("{}", token),
        SignOutputFormat::Json => {
            let expires_at = config.expires_in().map(|ttl| {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .saturating_add(ttl)
                    .as_secs()
            });
            let out = json!({
                "token": token,
                "claims": claims,
                "ttl": config.ttl,
                "expires_at": expires_at,
            });
            match serde_json::to_string_pretty(&out) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn run_verify(config: VerifyConfig) -> ExitCode {
    match TokenAuth::new().verify(&config.token, &config.secret) {
        Ok(claims) => match serde_json::to_string_pretty(&claims) {
            Ok(s) => {
                println!("{}", s);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Rejected: {}", e);
            ExitCode::FAILURE
        }
    }
}
