//! Signed-token authentication.
//!
//! - [`token`]: HMAC-SHA256 token issuing and verification
//! - [`middleware`]: bearer-token guard built on [`TokenAuth`]

pub mod middleware;
pub mod token;

pub use middleware::{BearerAuth, Claims};
pub use token::{
    Algorithm, Clock, SignOptions, SystemClock, TokenAuth, CLOCK_SKEW_TOLERANCE_SECS,
};
