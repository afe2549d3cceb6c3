//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured `tracing` events with connection IDs and peer addresses
//! - Handshake failures at `warn`, per-request detail at `debug`
//! - Everything is written to stderr; stdout stays unused

pub mod logging;

pub use logging::init_logging;
