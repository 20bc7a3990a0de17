//! Route registry: a static table for placeholder-free templates and an
//! ordered dynamic list for templates with placeholders.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use super::pattern::{canonical_path, strip_query, RoutePattern};
use crate::error::RouteError;
use crate::server::pipeline::Handler;

/// A compiled pattern plus its per-method handlers.
pub struct RouteEntry {
    pattern: RoutePattern,
    handlers: HashMap<Method, Arc<dyn Handler>>,
}

impl RouteEntry {
    fn new(pattern: RoutePattern) -> Self {
        Self {
            pattern,
            handlers: HashMap::new(),
        }
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Methods with a registered handler.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.handlers.keys()
    }

    fn select(&self, method: &Method, params: HashMap<String, String>) -> RouteMatch<'_> {
        match self.handlers.get(method) {
            Some(handler) => RouteMatch::Found {
                handler: Arc::clone(handler),
                params,
                pattern: &self.pattern,
            },
            None => RouteMatch::MethodNotAllowed {
                pattern: &self.pattern,
            },
        }
    }
}

/// Outcome of resolving a (method, url) pair.
pub enum RouteMatch<'a> {
    /// Pattern and handler found; `params` holds the bound placeholders
    Found {
        handler: Arc<dyn Handler>,
        params: HashMap<String, String>,
        pattern: &'a RoutePattern,
    },
    /// A pattern matched but has no handler for the method
    MethodNotAllowed { pattern: &'a RoutePattern },
    /// Nothing matched
    NotFound,
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMatch::Found {
                params, pattern, ..
            } => f
                .debug_struct("Found")
                .field("route", &pattern.template())
                .field("params", params)
                .finish(),
            RouteMatch::MethodNotAllowed { pattern } => f
                .debug_struct("MethodNotAllowed")
                .field("route", &pattern.template())
                .finish(),
            RouteMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Route registry built during setup and read-only while serving.
#[derive(Default)]
pub struct RouteTable {
    statics: HashMap<String, RouteEntry>,
    dynamics: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `template`.
    ///
    /// Re-registering the same (method, template) replaces that handler only;
    /// other methods on the template are kept, as is its position in the
    /// dynamic list.
    pub fn insert(
        &mut self,
        method: Method,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RouteError> {
        let pattern = RoutePattern::parse(template)?;

        let entry = if pattern.is_static() {
            self.statics
                .entry(pattern.canonical().to_string())
                .or_insert_with(|| RouteEntry::new(pattern))
        } else {
            let index = match self
                .dynamics
                .iter()
                .position(|e| e.pattern.canonical() == pattern.canonical())
            {
                Some(index) => index,
                None => {
                    self.dynamics.push(RouteEntry::new(pattern));
                    self.dynamics.len() - 1
                }
            };
            &mut self.dynamics[index]
        };

        if entry.handlers.insert(method.clone(), handler).is_some() {
            debug!(method = %method, route = template, "Replaced existing handler");
        } else {
            debug!(method = %method, route = template, "Registered route");
        }
        Ok(())
    }

    /// Resolve a request.
    ///
    /// The query component is ignored. A static route wins when it has a
    /// handler for the method; otherwise the dynamic list is scanned in
    /// registration order and the first matching pattern decides the outcome.
    /// A static path with no dynamic match and no handler for the method is a
    /// 405.
    pub fn resolve<'a>(&'a self, method: &Method, url: &str) -> RouteMatch<'a> {
        let path = strip_query(url);

        // The lookup key is canonical, so the pattern confirms the raw path
        // (`//` canonicalizes to `/` but must not hit the root).
        let fixed = self
            .statics
            .get(canonical_path(path))
            .filter(|entry| entry.pattern.matches(path));

        if let Some(entry) = fixed {
            if entry.handlers.contains_key(method) {
                return entry.select(method, HashMap::new());
            }
        }

        for entry in &self.dynamics {
            if let Some(params) = entry.pattern.captures(path) {
                return entry.select(method, params);
            }
        }

        match fixed {
            Some(entry) => RouteMatch::MethodNotAllowed {
                pattern: &entry.pattern,
            },
            None => RouteMatch::NotFound,
        }
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.statics.len() + self.dynamics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
