//! HTML views rendered with minijinja.

use std::path::{Path, PathBuf};

use minijinja::Environment;
use serde_json::Value;
use tracing::debug;

use crate::error::ViewError;

/// Name templates are registered under; the `.html` suffix turns on
/// minijinja's HTML auto-escaping.
const VIEW_NAME: &str = "view.html";

/// Template renderer with an optional view root.
#[derive(Debug, Clone, Default)]
pub struct Views {
    root: Option<PathBuf>,
}

impl Views {
    /// Views resolved relative to the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Views resolved under `root`.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Render `template` with `data`.
    ///
    /// `template` names a file under the view root. When no such file can be
    /// read, the string itself is used as the template source.
    pub async fn render(&self, template: &str, data: &Value) -> Result<String, ViewError> {
        let path = match &self.root {
            Some(root) => root.join(template),
            None => PathBuf::from(template),
        };

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "View file not readable, rendering literal template");
                template.to_string()
            }
        };

        let mut env = Environment::new();
        env.add_template(VIEW_NAME, &source)?;
        let rendered = env.get_template(VIEW_NAME)?.render(data)?;
        Ok(rendered)
    }
}
