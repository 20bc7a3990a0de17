//! Files served from a static root.

use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

/// Serves files from `base_dir`, refusing paths that would leave it.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a request path onto the filesystem.
    ///
    /// The query is dropped and the path percent-decoded before mapping;
    /// `..`, absolute components and NUL bytes are rejected.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let raw = crate::router::strip_query(url_path);
        let decoded = urlencoding::decode(raw).ok()?;
        if decoded.contains('\0') {
            return None;
        }

        let mut pb = self.base_dir.clone();
        for comp in Path::new(decoded.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// MIME type from the final extension, compared case-insensitively.
    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "application/javascript; charset=utf-8",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "xml" => "application/xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            "tar" => "application/x-tar",
            "wasm" => "application/wasm",
            "mp4" => "video/mp4",
            "mp3" => "audio/mpeg",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            _ => "application/octet-stream",
        }
    }

    /// Read a file and its MIME type.
    ///
    /// Escaping paths, directories and missing files all report
    /// [`io::ErrorKind::NotFound`].
    pub async fn load(&self, url_path: &str) -> io::Result<(Bytes, &'static str)> {
        let path = self.map_path(url_path).ok_or_else(|| {
            debug!(path = url_path, "Rejected static path");
            io::Error::new(io::ErrorKind::NotFound, "invalid path")
        })?;

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"))
            }
            Err(e) => return Err(e),
        };
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok((Bytes::from(bytes), Self::content_type(&path)))
    }
}
