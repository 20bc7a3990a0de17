//! Per-request context handed to middleware and handlers.

use std::collections::HashMap;

use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::body::UploadedFile;
use crate::router::strip_query;

/// A request as seen by middleware and handlers.
///
/// `params` is filled only after a route matched; `body` and `files` are
/// filled by ingestion for methods that carry a body.
#[derive(Debug)]
pub struct Request {
    /// Request method
    pub method: Method,

    /// Raw url as received (path and query)
    pub url: String,

    /// Query parameters, percent-decoded; the last duplicate wins
    pub query: HashMap<String, String>,

    /// Placeholder values bound by the matched route
    pub params: HashMap<String, String>,

    /// Request headers (names compare case-insensitively)
    pub headers: HeaderMap,

    /// Parsed body: JSON value, form-field object, or an empty object
    pub body: Value,

    /// Uploaded files from a multipart body, in wire order
    pub files: Vec<UploadedFile>,

    /// Typed values attached by middleware
    pub extensions: Extensions,
}

impl Request {
    /// Build the context from the request head.
    pub fn from_parts(parts: Parts) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let query = parts
            .uri
            .query()
            .map(parse_query)
            .unwrap_or_default();

        Self {
            method: parts.method,
            url,
            query,
            params: HashMap::new(),
            headers: parts.headers,
            body: Value::Object(Map::new()),
            files: Vec::new(),
            extensions: parts.extensions,
        }
    }

    /// Path component of the url.
    pub fn path(&self) -> &str {
        strip_query(&self.url)
    }

    /// Header value by case-insensitive name, if valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A bound route parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the client sent `application/json`; default error bodies are
    /// then rendered as JSON.
    pub fn wants_json(&self) -> bool {
        self.content_type()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("application/json")
            })
            .unwrap_or(false)
    }

    /// A string field of an object body.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, url: &str) -> Self {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(url)
            .body(())
            .unwrap()
            .into_parts();
        Self::from_parts(parts)
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
