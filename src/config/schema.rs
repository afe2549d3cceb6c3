//! Configuration schema definitions.
//!
//! Everything here is built once at startup and never mutated afterwards.
//! The server receives it by value; nothing reads the process environment
//! after the config is constructed.

use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Server identity and client trust anchors.
    pub tls: TlsConfig,

    /// Directory that request paths resolve against.
    pub document_root: PathBuf,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl ServerConfig {
    /// Create a config with the default listener and timeout settings.
    pub fn new(tls: TlsConfig, document_root: impl Into<PathBuf>) -> Self {
        Self {
            listener: ListenerConfig::default(),
            tls,
            document_root: document_root.into(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (host names are resolved at bind time).
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

/// Address the server listens on unless a caller overrides it.
pub const DEFAULT_BIND_ADDRESS: &str = "localhost:4443";

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_connections: 1024,
        }
    }
}

/// Paths to the PEM material loaded at startup.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the server certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to the server private key (PEM).
    pub key_path: PathBuf,

    /// Path to the bundle of CA certificates trusted for client auth (PEM).
    pub ca_bundle_path: PathBuf,
}

/// Timeout configuration, in seconds.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Upper bound on the TLS handshake.
    pub handshake_secs: u64,

    /// How long an idle connection may take to send the next request head.
    pub header_read_secs: u64,

    /// Upper bound on producing a single response.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn header_read(&self) -> Duration {
        Duration::from_secs(self.header_read_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: 10,
            header_read_secs: 30,
            request_secs: 60,
        }
    }
}
