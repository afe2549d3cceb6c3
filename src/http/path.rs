//! Request path resolution against the document root.
//!
//! # Responsibilities
//! - Percent-decode the request path
//! - Reject parent-directory segments and other traversal tricks
//! - Canonicalize and confirm the target stays beneath the root
//!
//! # Design Decisions
//! - `..` is rejected outright rather than collapsed
//! - Symlinks are followed, but only to targets inside the root

use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Why a request path could not be mapped to a file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request path is not valid UTF-8 after decoding")]
    BadEncoding,

    #[error("request path escapes the document root")]
    Forbidden,

    #[error("no such file or directory")]
    NotFound,

    #[error("filesystem error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound,
            io::ErrorKind::PermissionDenied => ResolveError::Forbidden,
            _ => ResolveError::Io(err),
        }
    }
}

/// A request path mapped onto the filesystem.
#[derive(Debug)]
pub struct Resolved {
    /// Canonical path, guaranteed to be inside the document root.
    pub path: PathBuf,
    pub metadata: std::fs::Metadata,
}

/// The directory served to clients.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// Canonicalize `path` and use it as the root.
    pub fn new(path: &Path) -> io::Result<Self> {
        let root = path.canonicalize()?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Map a URI path (still percent-encoded) to a file or directory under the root.
    pub async fn resolve(&self, uri_path: &str) -> Result<Resolved, ResolveError> {
        let relative = sanitize(uri_path)?;
        let joined = self.root.join(relative);

        let path = tokio::fs::canonicalize(&joined).await?;
        if !path.starts_with(&self.root) {
            tracing::warn!(
                requested = uri_path,
                resolved = %path.display(),
                "Path resolved outside document root"
            );
            return Err(ResolveError::Forbidden);
        }

        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_dir() && names_directory(uri_path) {
            return Err(ResolveError::NotFound);
        }
        Ok(Resolved { path, metadata })
    }
}

/// Turn a URI path into a relative filesystem path with no traversal segments.
pub fn sanitize(uri_path: &str) -> Result<PathBuf, ResolveError> {
    let decoded = percent_decode_str(uri_path)
        .decode_utf8()
        .map_err(|_| ResolveError::BadEncoding)?;

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ResolveError::Forbidden),
            s if s.contains(['\\', '\0']) || has_drive_prefix(s) => {
                return Err(ResolveError::Forbidden)
            }
            s => relative.push(s),
        }
    }
    Ok(relative)
}

/// True when the request asks for a directory, `/a/` or `/a%2F`.
fn names_directory(uri_path: &str) -> bool {
    percent_decode_str(uri_path).decode_utf8_lossy().ends_with('/')
}

// `C:` would make `Path::join` discard the root on Windows.
fn has_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
