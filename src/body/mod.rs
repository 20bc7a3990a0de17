//! Request body ingestion and classification.
//!
//! - [`ingest`]: size-capped streaming read of the raw body
//! - [`multipart`]: `multipart/form-data` state machine
//!
//! [`parse_body`] turns the ingested bytes into the `body` / `files` pair
//! exposed on every request.

pub mod ingest;
pub mod multipart;

pub use ingest::{read_limited, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_BODY_MB};
pub use multipart::{MultipartForm, MultipartParser, UploadedFile};

use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;

/// Classified request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    /// JSON value, object of form fields, or an empty object
    pub body: Value,

    /// Files from a multipart body
    pub files: Vec<UploadedFile>,
}

impl Default for ParsedBody {
    fn default() -> Self {
        Self {
            body: Value::Object(Map::new()),
            files: Vec::new(),
        }
    }
}

/// Classify a fully ingested body.
///
/// A multipart content type with a boundary selects the multipart parser;
/// its text fields become an object (last duplicate wins). Anything else is
/// tried as JSON, then as `application/x-www-form-urlencoded`. Never fails:
/// unparseable input degrades to whatever the form decoder recovers.
pub fn parse_body(content_type: Option<&str>, raw: &[u8]) -> ParsedBody {
    if let Some(boundary) = content_type.and_then(multipart::boundary) {
        let form = multipart::parse(raw, &boundary);
        // Multipart framing is never valid JSON or form data, so a body
        // without text fields stays an empty object instead of falling back
        // to the raw-byte decoders.
        let mut fields = Map::new();
        for (name, value) in form.fields {
            fields.insert(name, Value::String(value));
        }
        return ParsedBody {
            body: Value::Object(fields),
            files: form.files,
        };
    }

    if raw.iter().all(u8::is_ascii_whitespace) {
        return ParsedBody::default();
    }

    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => {
            debug!("Parsed JSON body");
            ParsedBody {
                body: value,
                files: Vec::new(),
            }
        }
        Err(_) => {
            debug!("Body is not JSON, decoding as form fields");
            ParsedBody {
                body: Value::Object(parse_form(raw)),
                files: Vec::new(),
            }
        }
    }
}

fn parse_form(raw: &[u8]) -> Map<String, Value> {
    form_urlencoded::parse(raw)
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect()
}
