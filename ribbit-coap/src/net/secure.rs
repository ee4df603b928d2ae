use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use openssl::ssl::{Ssl, SslConnector, SslMethod, SslOptions, SslVerifyMode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_openssl::SslStream;

use super::{Connect, Transport};
use crate::config::Psk;
use crate::core::{Error, What, When};

/// The only cipher suite the server accepts for PSK sessions
pub const PSK_CIPHER: &str = "PSK-AES128-CBC-SHA256";

const MTU: u32 = 1400;

/// Adapts a connected [`UdpSocket`] to the byte-stream traits
/// OpenSSL is driven through; every read yields exactly one datagram
/// and every write sends exactly one.
#[derive(Debug)]
pub struct Datagrams(UdpSocket);

impl AsyncRead for Datagrams {
  fn poll_read(self: Pin<&mut Self>,
               cx: &mut Context<'_>,
               buf: &mut ReadBuf<'_>)
               -> Poll<io::Result<()>> {
    self.0.poll_recv(cx, buf)
  }
}

impl AsyncWrite for Datagrams {
  fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
    self.0.poll_send(cx, buf)
  }

  fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(Ok(()))
  }

  fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(Ok(()))
  }
}

fn tls_error(e: impl ToString) -> Error {
  When::Connecting.what(What::Tls(e.to_string()))
}

fn ssl(host: &str, psk: &Psk) -> Result<Ssl, openssl::error::ErrorStack> {
  let mut conn = SslConnector::builder(SslMethod::dtls())?;
  conn.set_verify(SslVerifyMode::NONE);
  let opts = conn.options();
  conn.set_options(opts | SslOptions::NO_QUERY_MTU);
  conn.set_cipher_list(PSK_CIPHER)?;

  let identity = psk.identity.clone().into_bytes();
  let key = psk.key.clone().into_bytes();
  conn.set_psk_client_callback(move |_, _hint, identity_out, key_out| {
        // identity is written as a NUL-terminated C string
        if identity.len() >= identity_out.len() || key.len() > key_out.len() {
          log::error!("PSK identity or key too long for OpenSSL buffers");
          return Ok(0);
        }

        identity_out[..identity.len()].copy_from_slice(&identity);
        identity_out[identity.len()] = 0;
        key_out[..key.len()].copy_from_slice(&key);
        Ok(key.len())
      });

  let mut ssl = conn.build()
                    .configure()?
                    .verify_hostname(false)
                    .into_ssl(host)?;
  ssl.set_mtu(MTU)?;
  Ok(ssl)
}

/// Pre-shared key DTLS session
pub struct Dtls {
  read: Mutex<ReadHalf<SslStream<Datagrams>>>,
  write: Mutex<WriteHalf<SslStream<Datagrams>>>,
}

impl core::fmt::Debug for Dtls {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Dtls").finish_non_exhaustive()
  }
}

impl Dtls {
  /// Perform the DTLS handshake over a connected socket
  pub async fn handshake(sock: UdpSocket, host: &str, psk: &Psk) -> Result<Self, Error> {
    let ssl = ssl(host, psk).map_err(tls_error)?;
    let mut stream = SslStream::new(ssl, Datagrams(sock)).map_err(tls_error)?;
    Pin::new(&mut stream).connect().await.map_err(tls_error)?;
    log::debug!("DTLS handshake complete");

    let (read, write) = tokio::io::split(stream);
    Ok(Self { read: Mutex::new(read),
              write: Mutex::new(write) })
  }
}

#[async_trait]
impl Transport for Dtls {
  async fn write(&self, bytes: &[u8]) -> io::Result<()> {
    let mut write = self.write.lock().await;
    write.write_all(bytes).await
  }

  async fn read(&self, max_len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let n = self.read.lock().await.read(&mut buf).await?;
    if n == 0 {
      return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "DTLS session closed"));
    }

    buf.truncate(n);
    Ok(buf)
  }

  async fn close(&self) {
    if let Err(e) = self.write.lock().await.shutdown().await {
      log::debug!("DTLS shutdown failed: {}", e);
    }
  }
}

/// Connects [`Dtls`] sessions to a fixed server
#[derive(Debug, Clone)]
pub struct DtlsConnector {
  host: String,
  port: u16,
  psk: Psk,
}

impl DtlsConnector {
  #[allow(missing_docs)]
  pub fn new(host: String, port: u16, psk: Psk) -> Self {
    Self { host, port, psk }
  }
}

#[async_trait]
impl Connect for DtlsConnector {
  async fn connect(&self) -> Result<Arc<dyn Transport>, Error> {
    let sock = super::udp::connected_socket(&self.host, self.port).await
                                                                  .map_err(|e| {
                                                                    When::Connecting.what(What::Transport(e))
                                                                  })?;
    let session = Dtls::handshake(sock, &self.host, &self.psk).await?;
    Ok(Arc::new(session))
  }
}
