//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Handshaking → Idle ⇄ Processing → Closed)
//! - Generate unique connection IDs for tracing
//! - Count live connections

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// TLS handshake in progress; no HTTP bytes have been read.
    Handshaking = 0,
    /// Authenticated and waiting for the next request head.
    Idle = 1,
    /// A request is being served.
    Processing = 2,
    /// Connection is closed.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Handshaking,
            1 => Self::Idle,
            2 => Self::Processing,
            _ => Self::Closed,
        }
    }
}

/// Shared view of one connection's state.
///
/// Cloned into the per-connection request service so it can flip between
/// `Idle` and `Processing`.
#[derive(Debug, Clone)]
pub struct StateHandle {
    id: ConnectionId,
    state: Arc<AtomicU8>,
}

impl StateHandle {
    /// The connection this handle belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, next: ConnectionState) {
        let prev = ConnectionState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        tracing::trace!(connection_id = %self.id, from = ?prev, to = ?next, "Connection state");
    }
}

/// Tracks active connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection in the `Handshaking` state.
    /// Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            state: StateHandle {
                id: ConnectionId::new(),
                state: Arc::new(AtomicU8::new(ConnectionState::Handshaking as u8)),
            },
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Marks the connection closed and decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    state: StateHandle,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.state.id
    }

    /// Get a handle to this connection's state.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.set(ConnectionState::Closed);
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.state.id, "Connection closed");
    }
}
