//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (mandatory TLS handshake with client certificate)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Handshaking → Idle ⇄ Processing → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - A failed handshake closes only its own connection
//! - TLS material is loaded once and shared read-only by every handshake

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{
    ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker, StateHandle,
};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use tls::{load_acceptor, TlsError};
