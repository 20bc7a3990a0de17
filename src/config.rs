//! Command-line configuration for the `wicket` binary.
//!
//! Every option can also be set through an environment variable with the
//! `WICKET_` prefix:
//!
//! - `WICKET_HOST` - Server bind address (default: 127.0.0.1)
//! - `WICKET_PORT` - Server port (default: 3000)
//! - `WICKET_MAX_BODY_MB` - Request body cap in MiB (default: 2)
//! - `WICKET_DEBUG` - Put error chains in 500 responses (default: false)
//! - `WICKET_VIEW_ROOT` - Directory HTML views are resolved under
//! - `WICKET_STATIC_ROOT` - Directory static files are served from
//! - `WICKET_TOKEN_SECRET` - Secret for issuing and verifying tokens
//! - `WICKET_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `WICKET_TOKEN_TTL` - Lifetime of tokens issued by `sign`

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::body::DEFAULT_MAX_BODY_MB;
use crate::server::ServerConfig;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default view directory.
pub const DEFAULT_VIEW_ROOT: &str = "views";

/// Default static file directory.
pub const DEFAULT_STATIC_ROOT: &str = "public";

/// Default token lifetime in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

/// Largest accepted `--max-body-mb`.
pub const MAX_BODY_MB_LIMIT: usize = 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Wicket - a small HTTP server runtime.
#[derive(Parser, Debug, Clone)]
#[command(name = "wicket")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the demonstration server.
    Serve(ServeConfig),

    /// Issue a signed token.
    Sign(SignConfig),

    /// Verify a signed token and print its claims.
    Verify(VerifyConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WICKET_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "WICKET_PORT")]
    pub port: u16,

    /// Largest accepted request body, in MiB.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_MB, env = "WICKET_MAX_BODY_MB")]
    pub max_body_mb: usize,

    /// Include error chains in 500 responses.
    ///
    /// WARNING: exposes internals to clients; development only.
    #[arg(long, default_value_t = false, env = "WICKET_DEBUG")]
    pub debug: bool,

    /// Directory HTML views are resolved under.
    #[arg(long, default_value = DEFAULT_VIEW_ROOT, env = "WICKET_VIEW_ROOT")]
    pub view_root: String,

    /// Directory static files are served from.
    #[arg(long, default_value = DEFAULT_STATIC_ROOT, env = "WICKET_STATIC_ROOT")]
    pub static_root: String,

    /// Secret for the `/login` and `/me` routes.
    ///
    /// Without it those routes are not registered.
    #[arg(long, env = "WICKET_TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, no CORS headers are sent.
    #[arg(long, env = "WICKET_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_body_mb == 0 || self.max_body_mb > MAX_BODY_MB_LIMIT {
            return Err(format!(
                "max_body_mb must be between 1 and {}",
                MAX_BODY_MB_LIMIT
            ));
        }

        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }

        if matches!(self.token_secret.as_deref(), Some("")) {
            return Err(
                "token secret must not be empty. Set --token-secret or WICKET_TOKEN_SECRET"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }

    /// Library-level server settings.
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::default()
            .with_max_body_bytes(self.max_body_bytes())
            .with_debug(self.debug)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            config = config.with_cors_origins(origins.clone());
        }

        config
    }
}

// =============================================================================
// Sign / Verify
// =============================================================================

/// Output format of the `sign` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// The bare token
    #[default]
    Token,

    /// Token, claims and expiry as JSON
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Signing secret.
    #[arg(long, env = "WICKET_TOKEN_SECRET")]
    pub secret: String,

    /// Claims as a JSON object.
    #[arg(long, default_value = "{}")]
    pub claims: String,

    /// Token lifetime in seconds (0 = no expiry).
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL, env = "WICKET_TOKEN_TTL")]
    pub ttl: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Token)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("secret must not be empty".to_string());
        }
        Ok(())
    }

    /// Parse `--claims`; only JSON objects are accepted.
    pub fn parse_claims(&self) -> Result<Value, String> {
        let value: Value = serde_json::from_str(&self.claims)
            .map_err(|e| format!("Invalid claims JSON: {}", e))?;
        if !value.is_object() {
            return Err("Claims must be a JSON object".to_string());
        }
        Ok(value)
    }

    pub fn expires_in(&self) -> Option<Duration> {
        (self.ttl > 0).then(|| Duration::from_secs(self.ttl))
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyConfig {
    /// Verification secret.
    #[arg(long, env = "WICKET_TOKEN_SECRET")]
    pub secret: String,

    /// Token to verify.
    pub token: String,
}

// =============================================================================
// Tests
// =============================================================================
