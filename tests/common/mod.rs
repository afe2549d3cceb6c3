//! Shared utilities for the integration tests: a throwaway PKI, a running
//! server on an ephemeral port, and a raw TLS client speaking HTTP/1.1.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use mtls_static_server::config::{ServerConfig, TlsConfig};
use mtls_static_server::HttpServer;

/// A certificate authority able to issue leaf certificates.
pub struct Authority {
    cert: Certificate,
    key: KeyPair,
}

impl Authority {
    pub fn new(name: &str) -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, name);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    fn issue(&self, mut params: CertificateParams) -> Identity {
        let key = KeyPair::generate().unwrap();
        params.use_authority_key_identifier_extension = true;
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Identity {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            cert_der: cert.der().clone(),
            key_der: key.serialize_der(),
        }
    }

    pub fn server_identity(&self) -> Identity {
        let mut params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "localhost");
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.issue(params)
    }

    pub fn client_identity(&self, name: &str) -> Identity {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        self.issue(params)
    }

    /// A client certificate whose validity window closed long ago.
    pub fn expired_client_identity(&self, name: &str) -> Identity {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        params.not_before = rcgen::date_time_ymd(2000, 1, 1);
        params.not_after = rcgen::date_time_ymd(2001, 1, 1);
        self.issue(params)
    }
}

/// A leaf certificate with its private key.
pub struct Identity {
    pub cert_pem: String,
    pub key_pem: String,
    cert_der: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl Identity {
    fn chain(&self) -> Vec<CertificateDer<'static>> {
        vec![self.cert_der.clone()]
    }

    fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(self.key_der.clone().into())
    }
}

/// PEM files for the server, written into a temp directory.
pub struct Pki {
    pub ca: Authority,
    pub dir: tempfile::TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
}

impl Pki {
    pub fn new() -> Self {
        let ca = Authority::new("test client ca");
        let server = ca.server_identity();
        let dir = tempfile::tempdir().unwrap();

        let cert_path = dir.path().join("server.pem");
        let key_path = dir.path().join("server.key");
        let ca_path = dir.path().join("ca.pem");
        std::fs::write(&cert_path, &server.cert_pem).unwrap();
        std::fs::write(&key_path, &server.key_pem).unwrap();
        std::fs::write(&ca_path, ca.pem()).unwrap();

        Self {
            ca,
            dir,
            cert_path,
            key_path,
            ca_path,
        }
    }

    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig {
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
            ca_bundle_path: self.ca_path.clone(),
        }
    }
}

/// A server running on an ephemeral loopback port until dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub pki: Pki,
    dir: tempfile::TempDir,
    document_root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self::start_in(root).await
    }

    pub async fn start_in(root: tempfile::TempDir) -> Self {
        Self::start_serving(root, "").await
    }

    /// Serve `subdir` of `dir`, leaving the rest of `dir` outside the root.
    pub async fn start_serving(dir: tempfile::TempDir, subdir: &str) -> Self {
        let pki = Pki::new();
        let document_root = dir.path().join(subdir);
        let mut config = ServerConfig::new(pki.tls_config(), &document_root);
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.timeouts.header_read_secs = 5;

        let server = HttpServer::new(config).expect("server config");
        let listener = server.bind().await.expect("bind");
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = server
                .run(listener, async {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            pki,
            dir,
            document_root,
            shutdown: Some(tx),
        }
    }

    /// The directory being served.
    pub fn root_path(&self) -> &Path {
        &self.document_root
    }

    /// The temp directory enclosing the served root.
    pub fn outer_path(&self) -> &Path {
        self.dir.path()
    }

    /// A client identity issued by the trusted CA.
    pub fn trusted_client(&self) -> Identity {
        self.pki.ca.client_identity("trusted client")
    }

    pub fn client(&self, identity: Option<&Identity>) -> TestClient {
        TestClient::new(self.addr, &self.pki.ca, identity)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// TLS client that trusts the test CA and optionally presents a certificate.
pub struct TestClient {
    addr: SocketAddr,
    connector: TlsConnector,
}

impl TestClient {
    pub fn new(addr: SocketAddr, server_ca: &Authority, identity: Option<&Identity>) -> Self {
        let mut roots = RootCertStore::empty();
        roots.add(server_ca.der()).unwrap();

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots);
        let config = match identity {
            Some(identity) => builder
                .with_client_auth_cert(identity.chain(), identity.key())
                .unwrap(),
            None => builder.with_no_client_auth(),
        };

        Self {
            addr,
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    pub async fn connect(&self) -> io::Result<TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(self.addr).await?;
        let name = ServerName::try_from("localhost").unwrap();
        self.connector.connect(name, tcp).await
    }

    /// Send raw request bytes and read until the server closes.
    pub async fn exchange(&self, raw_request: &str) -> io::Result<Vec<u8>> {
        let mut stream = self.connect().await?;
        stream.write_all(raw_request.as_bytes()).await?;
        stream.flush().await?;
        read_until_close(&mut stream).await
    }

    pub async fn send(&self, method: &str, path: &str) -> io::Result<HttpResponse> {
        self.send_with_headers(method, path, &[]).await
    }

    pub async fn send_with_headers(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
    ) -> io::Result<HttpResponse> {
        let mut request =
            format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
        for (name, value) in headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        request.push_str("\r\n");

        let raw = self.exchange(&request).await?;
        HttpResponse::parse(&raw)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no HTTP response"))
    }

    pub async fn get(&self, path: &str) -> HttpResponse {
        self.send("GET", path).await.expect("GET failed")
    }
}

/// Read everything until EOF. A TLS error after some data has arrived
/// (e.g. a missing close_notify) still returns the data.
pub async fn read_until_close(stream: &mut TlsStream<TcpStream>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if buf.is_empty() => return Err(e),
            Err(_) => break,
        }
    }
    Ok(buf)
}

/// A parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let split = raw.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = std::str::from_utf8(&raw[..split]).ok()?;
        let mut lines = head.split("\r\n");

        let status_line = lines.next()?;
        if !status_line.starts_with("HTTP/1.") {
            return None;
        }
        let status = status_line.split(' ').nth(1)?.parse().ok()?;

        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let raw_body = &raw[split + 4..];
        let chunked = headers
            .iter()
            .any(|(k, v)| k == "transfer-encoding" && v.eq_ignore_ascii_case("chunked"));
        let body = if chunked {
            dechunk(raw_body)?
        } else {
            raw_body.to_vec()
        };

        Some(Self {
            status,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn dechunk(mut raw: &[u8]) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        raw = &raw[line_end + 2..];
        if size == 0 {
            return Some(body);
        }
        body.extend_from_slice(raw.get(..size)?);
        raw = raw.get(size + 2..)?;
    }
}
