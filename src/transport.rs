//! Plain or TLS transport bootstrap.

use crate::config::{ConnectConfig, Security, TlsParams};
use crate::{Error, Result};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// A connected byte stream, plain or TLS-tunneled.
#[derive(Debug)]
pub(crate) enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens the configured transport: TCP connect, socket options, and the
/// TLS handshake when requested.
pub(crate) async fn open(config: &ConnectConfig) -> Result<MaybeTlsStream> {
    let server = &config.server;
    let mut addrs = lookup_host((server.host.as_str(), server.port)).await?;
    let addr = addrs.next().ok_or_else(|| {
        Error::from(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {}", server.host),
        ))
    })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    debug!(%addr, "transport connected");

    match &config.security {
        Security::Plain => Ok(MaybeTlsStream::Plain(stream)),
        Security::Tls(params) => {
            let tls_config = client_config(params)?;
            let sni = params.sni.clone().unwrap_or_else(|| server.host.clone());
            let name = ServerName::try_from(sni.clone()).map_err(|_| {
                Error::from(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid TLS server name: {sni}"),
                ))
            })?;
            let connector = TlsConnector::from(tls_config);
            let tls_stream = connector.connect(name, stream).await?;
            debug!(sni = %sni, "TLS established");
            Ok(MaybeTlsStream::Tls(Box::new(tls_stream)))
        }
    }
}

/// Caller override, or webpki roots plus any extra CA bundle.
fn client_config(params: &TlsParams) -> Result<Arc<ClientConfig>> {
    if let Some(config) = &params.client_config {
        return Ok(config.clone());
    }

    let mut roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    if let Some(path) = &params.ca_cert {
        let pem = std::fs::read(path)?;
        for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
            roots.add(cert?).map_err(|err| {
                Error::from(io::Error::new(io::ErrorKind::InvalidData, err))
            })?;
        }
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
