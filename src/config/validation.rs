//! Configuration validation.
//!
//! # Responsibilities
//! - Check that the PEM paths point at regular files
//! - Check that the document root is a directory
//! - Validate value ranges (timeouts > 0, connection limit > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - PEM contents are parsed later by `net::tls`; this only checks the filesystem

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{flag} file not found: {}", .path.display())]
    MissingFile { flag: &'static str, path: PathBuf },

    #[error("{flag} is not a regular file: {}", .path.display())]
    NotAFile { flag: &'static str, path: PathBuf },

    #[error("document root is not a directory: {}", .0.display())]
    DocumentRoot(PathBuf),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_file("--cert", &config.tls.cert_path, &mut errors);
    check_file("--key", &config.tls.key_path, &mut errors);
    check_file("--cacert", &config.tls.ca_bundle_path, &mut errors);

    if !config.document_root.is_dir() {
        errors.push(ValidationError::DocumentRoot(config.document_root.clone()));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("max_connections"));
    }
    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::Zero("handshake timeout"));
    }
    if config.timeouts.header_read_secs == 0 {
        errors.push(ValidationError::Zero("header read timeout"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("request timeout"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_file(flag: &'static str, path: &Path, errors: &mut Vec<ValidationError>) {
    match path.metadata() {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => errors.push(ValidationError::NotAFile {
            flag,
            path: path.to_path_buf(),
        }),
        Err(_) => errors.push(ValidationError::MissingFile {
            flag,
            path: path.to_path_buf(),
        }),
    }
}
