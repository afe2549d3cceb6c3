//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated TLS stream
//!     → server.rs (hyper HTTP/1.1 connection, Axum router, middleware)
//!     → files.rs (method check, file / directory / listing dispatch)
//!     → path.rs (decode, reject traversal, canonicalize under the root)
//!     → listing.rs (HTML directory index)
//!     → response.rs (HTML error pages)
//!     → Send to client
//! ```

pub mod files;
pub mod listing;
pub mod path;
pub mod response;
pub mod server;

pub use path::{DocumentRoot, ResolveError};
pub use server::{HttpServer, ServerError};
