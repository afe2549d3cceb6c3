//! Static file server behind mutual TLS.
//!
//! Serves a directory over HTTPS and refuses every client that does not
//! present a certificate issued by one of the configured CAs.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use http::{HttpServer, ServerError};
