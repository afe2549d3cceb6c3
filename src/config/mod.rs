//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (--cert, --key, --cacert)
//!     → loader.rs (clap parse, capture working directory)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → passed by value to the server
//! ```
//!
//! # Design Decisions
//! - No config file and no environment fallback; the three paths are mandatory
//! - Config is immutable once loaded
//! - Validation separates syntactic (clap) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, Cli, ConfigError};
pub use schema::{ListenerConfig, ServerConfig, TimeoutConfig, TlsConfig};
