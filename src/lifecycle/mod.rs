//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse CLI → Validate → Load TLS material → Bind → Accept loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop accepting → Exit 0
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and happens before binding
//! - No graceful drain; the server otherwise runs until terminated

pub mod signals;

pub use signals::shutdown_signal;
