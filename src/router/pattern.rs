//! Route template compilation.
//!
//! A template is a path made of literal text and `:name` placeholders:
//!
//! ```text
//! /users/:id            -> ^/users/(?P<id>[\w.\-]+)/?$
//! /files/:name/raw      -> ^/files/(?P<name>[\w.\-]+)/raw/?$
//! /                     -> ^/$
//! ```
//!
//! Placeholders never match `/`. Every template except the root accepts an
//! optional trailing slash; the root only matches a bare `/`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::RouteError;

/// Characters a placeholder may capture: word characters, dots (file
/// extensions) and hyphens (slugs, UUIDs).
const PARAM_CLASS: &str = r"[\w.\-]+";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex is valid")
    })
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    canonical: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl RoutePattern {
    /// Compile a template into a matcher.
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        if !template.starts_with('/') {
            return Err(RouteError::InvalidTemplate {
                template: template.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        if template == "/" {
            return Ok(Self {
                template: template.to_string(),
                canonical: "/".to_string(),
                regex: compile(template, "^/$")?,
                param_names: Vec::new(),
            });
        }

        let canonical = canonical_path(template).to_string();
        let mut pattern = String::with_capacity(canonical.len() + 16);
        pattern.push('^');

        let mut param_names = Vec::new();
        let mut seen = HashSet::new();
        let mut last = 0;

        for captures in placeholder_regex().captures_iter(&canonical) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let name = name.as_str();
            if !seen.insert(name) {
                return Err(RouteError::DuplicateParam {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }

            pattern.push_str(&regex::escape(&canonical[last..whole.start()]));
            pattern.push_str(&format!("(?P<{}>{})", name, PARAM_CLASS));
            param_names.push(name.to_string());
            last = whole.end();
        }

        pattern.push_str(&regex::escape(&canonical[last..]));
        pattern.push_str("/?$");

        Ok(Self {
            template: template.to_string(),
            regex: compile(template, &pattern)?,
            canonical,
            param_names,
        })
    }

    /// The template exactly as registered.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Canonical form used as the static-table key.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// True when the template has no placeholders.
    pub fn is_static(&self) -> bool {
        self.param_names.is_empty()
    }

    /// Whether `path` (query already stripped) matches.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and bind each placeholder by name.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let mut params = HashMap::with_capacity(self.param_names.len());
        for name in &self.param_names {
            if let Some(value) = captures.name(name) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }
}

fn compile(template: &str, pattern: &str) -> Result<Regex, RouteError> {
    Regex::new(pattern).map_err(|e| RouteError::InvalidTemplate {
        template: template.to_string(),
        reason: e.to_string(),
    })
}

/// Drop one trailing slash, leaving the root untouched.
pub fn canonical_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Drop the query component of a raw url.
pub fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    }
}
