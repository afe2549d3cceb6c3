//! Static file handler.
//!
//! # Responsibilities
//! - GET/HEAD for regular files, streamed by `tower_http::services::ServeFile`
//! - Directories: redirect to the slash form, `index.html`, or a listing
//! - Anything else inside the root (sockets, FIFOs, devices) is refused
//! - Every other method is answered with 501
//!
//! `ServeFile` owns the file response: content type by extension,
//! `Content-Length`, `Last-Modified`, `If-Modified-Since` and HEAD.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::listing;
use crate::http::path::DocumentRoot;
use crate::http::response::{error_page, io_error_page, HTML_UTF8};

/// Files served in place of a listing when a directory contains them.
const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// State shared by every request.
#[derive(Debug, Clone)]
pub struct FileServerState {
    pub root: Arc<DocumentRoot>,
}

/// Serve whatever the request path names under the document root.
pub async fn serve_static(State(state): State<FileServerState>, request: Request) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return error_page(
            StatusCode::NOT_IMPLEMENTED,
            &format!("Unsupported method ('{method}')"),
        );
    }
    let uri = request.uri().clone();

    let resolved = match state.root.resolve(uri.path()).await {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::debug!(path = %uri.path(), error = %err, "Cannot resolve request path");
            return err.into_response();
        }
    };

    if resolved.metadata.is_file() {
        return serve_file(&resolved.path, request).await;
    }

    if !resolved.metadata.is_dir() {
        tracing::debug!(path = %resolved.path.display(), "Refusing non-regular file");
        return error_page(StatusCode::FORBIDDEN, "Not a regular file");
    }

    if !uri.path().ends_with('/') {
        return redirect_to_directory(&uri);
    }

    for index in INDEX_FILES {
        let candidate = resolved.path.join(index);
        if let Ok(metadata) = tokio::fs::metadata(&candidate).await {
            if metadata.is_file() {
                return serve_file(&candidate, request).await;
            }
        }
    }

    serve_listing(&resolved.path, uri.path(), method == Method::HEAD).await
}

fn redirect_to_directory(uri: &Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => error_page(StatusCode::BAD_REQUEST, "Malformed request path"),
    }
}

/// Stream a regular file through `ServeFile`.
async fn serve_file(path: &Path, request: Request) -> Response {
    // ServeFile reports every open failure other than NotFound as a bare 500
    if let Err(err) = tokio::fs::File::open(path).await {
        tracing::warn!(path = %path.display(), error = %err, "Failed to open file");
        return io_error_page(&err);
    }

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    match response.status() {
        StatusCode::NOT_FOUND => error_page(StatusCode::NOT_FOUND, "File not found"),
        StatusCode::INTERNAL_SERVER_ERROR => {
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "Error reading file")
        }
        _ => response.into_response(),
    }
}

async fn serve_listing(dir: &Path, uri_path: &str, head_only: bool) -> Response {
    let entries = match listing::read_entries(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %dir.display(), error = %err, "Failed to list directory");
            return io_error_page(&err);
        }
    };

    let display_path = percent_decode_str(uri_path).decode_utf8_lossy();
    let html = listing::render(&display_path, &entries);

    let length = HeaderValue::from(html.len());
    let body = if head_only { Body::empty() } else { Body::from(html) };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(HTML_UTF8)),
            (header::CONTENT_LENGTH, length),
        ],
        body,
    )
        .into_response()
}
