//! HMAC-SHA256 signed tokens.
//!
//! # Wire format
//!
//! ```text
//! base64url(header) "." base64url(payload) "." base64url(HMAC-SHA256(secret, header "." payload))
//! ```
//!
//! No padding is emitted; padding on input is tolerated. The header is
//! always `{"alg":"HS256","typ":"JWT"}`. At signing time the payload gets an
//! internal `_gen_ts` claim (seconds since the epoch) which verification
//! uses to detect a clock that moved backward, then strips.
//!
//! # Verification stages
//!
//! 1. Structure: three non-empty dot-separated segments
//! 2. Signature: constant-time MAC comparison over the raw first two segments
//! 3. Clock rollback: `_gen_ts` more than [`CLOCK_SKEW_TOLERANCE_SECS`] in the future
//! 4. Expiry type: `exp`, when present, must be numeric
//! 5. Expiry: `exp` must lie in the future
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use wicket::auth::{SignOptions, TokenAuth};
//!
//! let auth = TokenAuth::new();
//! let token = auth.sign(&json!({ "sub": "alice" }), "secret", &SignOptions::default()).unwrap();
//!
//! let claims = auth.verify(&token, "secret").unwrap();
//! assert_eq!(claims["sub"], "alice");
//! assert!(!claims.contains_key("_gen_ts"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::TokenError;

// =============================================================================
// Types
// =============================================================================

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Allowed amount, in seconds, by which a token's generation time may lie
/// in the verifier's future.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

/// Internal generation-timestamp claim.
pub const GENERATED_AT_CLAIM: &str = "_gen_ts";

/// Expiry claim, seconds since the epoch.
pub const EXPIRY_CLAIM: &str = "exp";

/// base64url without padding on output, padding optional on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Signature algorithm. Only HMAC-SHA256 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Hs256,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Hs256 => "HS256",
        }
    }
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// Options for [`TokenAuth::sign`].
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub algorithm: Algorithm,

    /// Lifetime; sets `exp` unless the payload already carries one
    pub expires_in: Option<Duration>,
}

impl SignOptions {
    pub fn with_expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Time elapsed since the Unix epoch.
    fn now(&self) -> Duration;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

// =============================================================================
// Key Cache
// =============================================================================

/// Keyed MAC states by secret, derived on first use and kept for the
/// lifetime of the owner.
///
/// Two threads missing on the same secret both derive the key; the second
/// insert overwrites an identical value.
#[derive(Default)]
pub(crate) struct KeyCache {
    keys: RwLock<HashMap<String, HmacSha256>>,
}

impl KeyCache {
    /// A fresh MAC keyed with `secret`.
    pub(crate) fn key_for(&self, secret: &str) -> HmacSha256 {
        if let Some(mac) = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(secret)
        {
            return mac.clone();
        }

        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(secret.to_string(), mac.clone());
        mac
    }

    pub(crate) fn len(&self) -> usize {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// Token Auth
// =============================================================================

/// Issues and verifies signed tokens.
pub struct TokenAuth {
    keys: KeyCache,
    hs256_header: OnceLock<String>,
    clock: Arc<dyn Clock>,
}

impl Default for TokenAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("cached_keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl TokenAuth {
    /// Token auth on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Token auth on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: KeyCache::default(),
            hs256_header: OnceLock::new(),
            clock,
        }
    }

    /// Sign a key/value payload.
    ///
    /// The payload is copied; the caller's value is left untouched.
    pub fn sign(
        &self,
        payload: &Value,
        secret: &str,
        options: &SignOptions,
    ) -> Result<String, TokenError> {
        let Value::Object(claims) = payload else {
            return Err(TokenError::PayloadType {
                found: json_type(payload),
            });
        };
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let now = self.clock.now();
        let mut claims = claims.clone();
        claims.insert(GENERATED_AT_CLAIM.to_string(), Value::from(now.as_secs()));
        if let Some(ttl) = options.expires_in {
            if claims.get(EXPIRY_CLAIM).map_or(true, Value::is_null) {
                claims.insert(
                    EXPIRY_CLAIM.to_string(),
                    Value::from(now.saturating_add(ttl).as_secs()),
                );
            }
        }

        let payload = serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            self.encoded_header(options.algorithm)?,
            TOKEN_ENGINE.encode(payload)
        );
        let signature = self.mac(secret, &signing_input);

        Ok(format!("{}.{}", signing_input, TOKEN_ENGINE.encode(signature)))
    }

    /// Verify a token and return its claims without the internal `_gen_ts`.
    pub fn verify(&self, token: &str, secret: &str) -> Result<Map<String, Value>, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Structure
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Format);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Format);
        }

        // Signature
        let provided = TOKEN_ENGINE
            .decode(signature)
            .map_err(|_| TokenError::InvalidSignature)?;
        let signing_input = &token[..header.len() + 1 + payload.len()];
        let expected = self.mac(secret, signing_input);
        if !bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
            return Err(TokenError::InvalidSignature);
        }

        let payload = TOKEN_ENGINE
            .decode(payload)
            .map_err(|_| TokenError::InvalidSignature)?;
        let Ok(Value::Object(mut claims)) = serde_json::from_slice::<Value>(&payload) else {
            return Err(TokenError::InvalidSignature);
        };

        let now = self.clock.now();
        let now_secs = i64::try_from(now.as_secs()).unwrap_or(i64::MAX);

        // Clock rollback
        if let Some(generated_at) = claims.get(GENERATED_AT_CLAIM).and_then(Value::as_f64) {
            if (now_secs.saturating_add(CLOCK_SKEW_TOLERANCE_SECS) as f64) < generated_at {
                return Err(TokenError::ClockRollback {
                    generated_at: generated_at as i64,
                    current_time: now_secs,
                });
            }
        }

        // Expiry
        match claims.get(EXPIRY_CLAIM) {
            None | Some(Value::Null) => {}
            Some(exp) => {
                let expires_at = numeric(exp).ok_or(TokenError::InvalidExpiry)?;
                if now.as_millis() as f64 >= expires_at * 1000.0 {
                    debug!(expired_at = expires_at, "Token expired");
                    return Err(TokenError::Expired {
                        expired_at: expires_at,
                    });
                }
            }
        }

        claims.remove(GENERATED_AT_CLAIM);
        Ok(claims)
    }

    fn encoded_header(&self, algorithm: Algorithm) -> Result<&str, TokenError> {
        let cell = match algorithm {
            Algorithm::Hs256 => &self.hs256_header,
        };
        if let Some(header) = cell.get() {
            return Ok(header.as_str());
        }

        let json = serde_json::to_vec(&Header {
            alg: algorithm.as_str(),
            typ: "JWT",
        })
        .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(cell.get_or_init(|| TOKEN_ENGINE.encode(json)).as_str())
    }

    fn mac(&self, secret: &str, input: &str) -> Vec<u8> {
        let mut mac = self.keys.key_for(secret);
        mac.update(input.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// JSON numbers, and strings holding a finite number, are numeric.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================
