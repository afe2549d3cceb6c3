//! Error responses.
//!
//! Every failure a client can see is an HTML page naming the status code,
//! so browsers and scripts get the same shape of answer.

use std::io;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::path::ResolveError;

/// Content type of every generated HTML page.
pub const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Build an HTML error page for `status`.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{code} {reason}</title>\n\
         </head>\n\
         <body>\n\
         <h1>{code} {reason}</h1>\n\
         <p>{message}</p>\n\
         </body>\n\
         </html>\n",
        code = status.as_u16(),
        reason = reason,
        message = escape_html(message),
    );

    (status, [(header::CONTENT_TYPE, HTML_UTF8)], body).into_response()
}

/// Map a filesystem error hit while serving a file.
pub fn io_error_page(err: &io::Error) -> Response {
    match err.kind() {
        io::ErrorKind::NotFound => error_page(StatusCode::NOT_FOUND, "File not found"),
        io::ErrorKind::PermissionDenied => error_page(StatusCode::FORBIDDEN, "Permission denied"),
        _ => error_page(StatusCode::INTERNAL_SERVER_ERROR, "Error reading file"),
    }
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        match self {
            ResolveError::BadEncoding => {
                error_page(StatusCode::BAD_REQUEST, "Malformed request path")
            }
            ResolveError::Forbidden => error_page(
                StatusCode::FORBIDDEN,
                "Access outside the document root is not allowed",
            ),
            ResolveError::NotFound => error_page(StatusCode::NOT_FOUND, "File not found"),
            ResolveError::Io(err) => io_error_page(&err),
        }
    }
}

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
