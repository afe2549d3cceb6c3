//! Configuration loading from the command line.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::schema::{ServerConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Command line arguments. All three paths are mandatory.
#[derive(Debug, Parser)]
#[command(name = "mtls-static-server")]
#[command(
    about = "Serve the current directory over HTTPS, requiring client certificates",
    long_about = None
)]
pub struct Cli {
    /// Server certificate chain (PEM)
    #[arg(long, value_name = "PATH")]
    pub cert: PathBuf,

    /// Server private key (PEM)
    #[arg(long, value_name = "PATH")]
    pub key: PathBuf,

    /// CA bundle used to verify client certificates (PEM)
    #[arg(long, value_name = "PATH")]
    pub cacert: PathBuf,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build and validate the server configuration from parsed arguments.
///
/// The working directory is captured here once and becomes the document root.
pub fn load_config(cli: Cli) -> Result<ServerConfig, ConfigError> {
    let document_root = std::env::current_dir().map_err(ConfigError::WorkingDir)?;

    let config = ServerConfig::new(
        TlsConfig {
            cert_path: cli.cert,
            key_path: cli.key,
            ca_bundle_path: cli.cacert,
        },
        document_root,
    );

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
