//! Size-capped streaming body ingestion.

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use tracing::{debug, warn};

use crate::error::DispatchError;

/// Default body cap in MiB.
pub const DEFAULT_MAX_BODY_MB: usize = 2;

/// Default body cap in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = DEFAULT_MAX_BODY_MB * 1024 * 1024;

/// Read `body` to the end, failing as soon as more than `max_bytes` arrive.
///
/// Frames are consumed one at a time with a yield in between, so a large
/// upload never monopolizes a worker. Trailers are ignored. A transport
/// error ends the stream: whatever arrived so far is returned.
pub async fn read_limited(mut body: Body, max_bytes: usize) -> Result<Bytes, DispatchError> {
    let mut buf = BytesMut::new();
    let mut received = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, received, "Body stream failed, treating as end of input");
                break;
            }
        };

        if let Ok(data) = frame.into_data() {
            received = received.saturating_add(data.len());
            if received > max_bytes {
                warn!(limit = max_bytes, received, "Request body exceeds limit");
                return Err(DispatchError::PayloadTooLarge {
                    limit: max_bytes,
                    received,
                });
            }
            buf.extend_from_slice(&data);
        }

        tokio::task::yield_now().await;
    }

    debug!(bytes = received, "Body ingested");
    Ok(buf.freeze())
}
