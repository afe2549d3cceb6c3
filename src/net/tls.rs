//! TLS configuration and certificate loading.
//!
//! Startup loads the TLS material in three separate steps so that each
//! failure names the file and stage that caused it:
//! 1. [`load_identity`]: server certificate chain and private key
//! 2. [`load_trust_anchors`]: CA bundle for client certificates
//! 3. [`build_server_config`]: rustls policy requiring a client certificate

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

/// Error type for TLS setup. Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PEM in {}: {source}", .path.display())]
    Pem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .path.display())]
    NoCertificates { path: PathBuf },

    #[error("no private key found in {} (expecting PKCS#8, PKCS#1 or SEC1)", .path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("invalid CA certificate in {}: {source}", .path.display())]
    TrustAnchor {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    #[error("cannot build client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("invalid server certificate or key: {0}")]
    Identity(#[source] rustls::Error),
}

/// The certificate chain and private key the server presents.
#[derive(Debug)]
pub struct ServerIdentity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Load the server's certificate chain and private key.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<ServerIdentity, TlsError> {
    let cert_chain = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    tracing::debug!(
        cert_path = %cert_path.display(),
        chain_len = cert_chain.len(),
        "Server identity loaded"
    );

    Ok(ServerIdentity { cert_chain, key })
}

/// Load every CA certificate in the bundle into a root store.
pub fn load_trust_anchors(ca_bundle_path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_bundle_path)? {
        roots.add(cert).map_err(|source| TlsError::TrustAnchor {
            path: ca_bundle_path.to_path_buf(),
            source,
        })?;
    }

    tracing::debug!(
        ca_bundle_path = %ca_bundle_path.display(),
        anchors = roots.len(),
        "Client trust anchors loaded"
    );

    Ok(roots)
}

/// Build a server config that refuses any client without a certificate
/// chaining to `roots`.
///
/// Protocol versions and cipher suites are rustls' safe defaults (TLS 1.2+).
pub fn build_server_config(
    identity: ServerIdentity,
    roots: RootCertStore,
) -> Result<Arc<ServerConfig>, TlsError> {
    let provider: Arc<CryptoProvider> = Arc::new(ring::default_provider());

    let verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(TlsError::Identity)?
        .with_client_cert_verifier(verifier)
        .with_single_cert(identity.cert_chain, identity.key)
        .map_err(TlsError::Identity)?;

    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Run all three loading steps and wrap the result in an acceptor.
pub fn load_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    let identity = load_identity(&config.cert_path, &config.key_path)?;
    let roots = load_trust_anchors(&config.ca_bundle_path)?;
    let server_config = build_server_config(identity, roots)?;

    tracing::info!(
        cert = %config.cert_path.display(),
        key = %config.key_path.display(),
        cacert = %config.ca_bundle_path.display(),
        "TLS configured with required client authentication"
    );

    Ok(TlsAcceptor::from(server_config))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}
