//! TLS connection establishment and HTTP CONNECT tunnelling.
//!
//! Every price provider connects the same way: open a TCP socket, upgrade it
//! to TLS 1.2 with certificate validation, and, if tunnelling is enabled,
//! issue an HTTP `CONNECT static://<service>` request authenticated with
//! Basic auth and a client GUID header before the provider's own handshake
//! begins.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{BidFxError, Result};

/// A connected, optionally-tunnelled byte stream. Both Pixie's length-framed
/// binary protocol and Puffin's XML stream read and write over this.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Opens TLS connections to a BidFX service host, with an optional
/// HTTP CONNECT tunnel hop in front of the named service.
pub struct ServiceConnector {
    host: String,
    port: u16,
    username: String,
    password: String,
    guid: Uuid,
    valid_cn: Option<String>,
    tls_connector: tokio_native_tls::TlsConnector,
}

impl ServiceConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        guid: Uuid,
        valid_cn: Option<String>,
        valid_root_cert: Option<&str>,
    ) -> Result<Self> {
        let mut builder = native_tls::TlsConnector::builder();
        // native-tls has no cross-platform cipher-suite selection API; pin
        // the protocol version instead and defer suite choice to the
        // platform TLS backend.
        builder.min_protocol_version(Some(native_tls::Protocol::Tlsv12));
        builder.max_protocol_version(Some(native_tls::Protocol::Tlsv12));
        if let Some(cert_path) = valid_root_cert {
            let pem = std::fs::read(cert_path).map_err(|e| {
                BidFxError::config(format!("could not read root cert {cert_path}: {e}"))
            })?;
            let cert = native_tls::Certificate::from_pem(&pem)
                .or_else(|_| native_tls::Certificate::from_der(&pem))
                .map_err(|e| BidFxError::config(format!("invalid root cert {cert_path}: {e}")))?;
            builder.add_root_certificate(cert);
            builder.disable_built_in_roots(true);
        }
        let connector = builder
            .build()
            .map_err(|e| BidFxError::transport(format!("could not build TLS connector: {e}")))?;

        Ok(ServiceConnector {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            guid,
            valid_cn,
            tls_connector: tokio_native_tls::TlsConnector::from(connector),
        })
    }

    /// Open a TLS connection and tunnel through to `service` via HTTP CONNECT.
    pub async fn tunnel_socket_to_service(&self, service: &str) -> Result<Box<dyn AsyncStream>> {
        let mut stream = self.open_secure_socket().await?;
        self.tunnel_to_service(&mut stream, service).await?;
        Ok(Box::new(stream))
    }

    /// Open a TLS connection directly to the configured host and port,
    /// without tunnelling through a service name.
    pub async fn direct_socket_to_service(&self) -> Result<Box<dyn AsyncStream>> {
        tracing::info!(host = %self.host, port = self.port, user = %self.username, "opening a connection");
        let stream = self.open_secure_socket().await?;
        Ok(Box::new(stream))
    }

    async fn open_secure_socket(
        &self,
    ) -> Result<tokio_native_tls::TlsStream<TcpStream>> {
        tracing::info!(host = %self.host, port = self.port, user = %self.username, "opening a secure connection");
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                BidFxError::transport(format!(
                    "could not open socket to {}:{} due to {e}",
                    self.host, self.port
                ))
            })?;
        let host_name = self.valid_cn.as_deref().unwrap_or(&self.host);
        tracing::info!(server_hostname = host_name, "wrapping TLS socket");
        let tls_stream = self
            .tls_connector
            .connect(host_name, tcp)
            .await
            .map_err(|e| BidFxError::transport(format!("TLS handshake failed: {e}")))?;
        self.validate_certificate(&tls_stream)?;
        Ok(tls_stream)
    }

    fn validate_certificate(&self, stream: &tokio_native_tls::TlsStream<TcpStream>) -> Result<()> {
        let der = stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| BidFxError::transport(format!("could not read peer certificate: {e}")))?
            .ok_or_else(|| BidFxError::transport("server presented no certificate"))?
            .to_der()
            .map_err(|e| BidFxError::transport(format!("could not encode peer certificate: {e}")))?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| BidFxError::transport(format!("could not parse peer certificate: {e}")))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let validity = cert.validity();
        if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
            return Err(BidFxError::transport("certificate expired"));
        }
        Ok(())
    }

    async fn tunnel_to_service(
        &self,
        stream: &mut tokio_native_tls::TlsStream<TcpStream>,
        service: &str,
    ) -> Result<()> {
        tracing::info!(service, "tunnelling to service");
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", self.username, self.password));
        let request = format!(
            "CONNECT static://{service} HTTP/1.1\r\nAuthorization: Basic {credentials}\r\nGUID: {}\r\n\r\n",
            self.guid
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(BidFxError::from)?;

        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await.map_err(BidFxError::from)?;
        let response = String::from_utf8_lossy(&buf[..n]);
        tracing::debug!(%response, "received tunnel response");
        if !response.contains("200 OK") {
            tracing::warn!(%response, "tunnel returned non-200 status");
            return Err(BidFxError::transport("tunnel returned non-200 status"));
        }
        Ok(())
    }
}
