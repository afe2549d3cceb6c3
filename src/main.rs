//! mtls-static-server
//!
//! Serves the current working directory over HTTPS on `localhost:4443`,
//! requiring every client to present a certificate signed by a trusted CA.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                 MTLS STATIC SERVER                │
//!                      │                                                   │
//!   Client (cert)      │  ┌──────────┐   ┌───────────┐   ┌─────────────┐   │
//!   ───────────────────┼─▶│   net    │──▶│    net    │──▶│    http     │   │
//!                      │  │ listener │   │ tls (mTLS)│   │ server/files│   │
//!                      │  └──────────┘   └───────────┘   └──────┬──────┘   │
//!                      │                                        │          │
//!                      │                                        ▼          │
//!   Response           │                                 ┌─────────────┐   │
//!   ◀──────────────────┼─────────────────────────────────│ document    │   │
//!                      │                                 │ root (cwd)  │   │
//!                      │                                 └─────────────┘   │
//!                      │  ┌─────────┐ ┌─────────────┐ ┌───────────┐        │
//!                      │  │ config  │ │observability│ │ lifecycle │        │
//!                      │  └─────────┘ └─────────────┘ └───────────┘        │
//!                      └───────────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: 0 after a shutdown signal, 2 for usage errors, 1 when the
//! TLS material, document root or socket cannot be set up.

use std::process::ExitCode;

use clap::Parser;

use mtls_static_server::config::{load_config, Cli};
use mtls_static_server::lifecycle::shutdown_signal;
use mtls_static_server::observability::init_logging;
use mtls_static_server::{HttpServer, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors print to stderr and exit with code 2.
    let cli = Cli::parse();

    init_logging();

    tracing::info!(
        cert = %cli.cert.display(),
        key = %cli.key.display(),
        cacert = %cli.cacert.display(),
        "mtls-static-server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let server = HttpServer::new(config)?;
    let listener = server.bind().await?;
    server.run(listener, shutdown_signal()).await
}
