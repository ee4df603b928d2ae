use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::{Connect, Transport};
use crate::core::{Error, What, When};

/// Resolve `host:port` and open a UDP socket bound to an
/// ephemeral local port and connected to the server
pub(crate) async fn connected_socket(host: &str, port: u16) -> io::Result<UdpSocket> {
  let addr = tokio::net::lookup_host((host, port)).await?
                                                  .next()
                                                  .ok_or_else(|| {
                                                    io::Error::new(io::ErrorKind::NotFound,
                                                                   format!("{} did not resolve", host))
                                                  })?;

  let local: SocketAddr = match addr {
    | SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
    | SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
  };

  let sock = UdpSocket::bind(local).await?;
  sock.connect(addr).await?;
  log::debug!("udp socket {:?} connected to {}", sock.local_addr().ok(), addr);
  Ok(sock)
}

/// Plain (unencrypted) UDP session
#[derive(Debug)]
pub struct Udp {
  sock: UdpSocket,
}

impl Udp {
  /// Wrap a connected socket
  pub fn new(sock: UdpSocket) -> Self {
    Self { sock }
  }
}

#[async_trait]
impl Transport for Udp {
  async fn write(&self, bytes: &[u8]) -> io::Result<()> {
    self.sock.send(bytes).await.map(|_| ())
  }

  async fn read(&self, max_len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let n = self.sock.recv(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
  }

  async fn close(&self) {
    log::trace!("closing udp socket {:?}", self.sock.local_addr().ok());
  }
}

/// Connects [`Udp`] sessions to a fixed server
#[derive(Debug, Clone)]
pub struct UdpConnector {
  host: String,
  port: u16,
}

impl UdpConnector {
  #[allow(missing_docs)]
  pub fn new(host: String, port: u16) -> Self {
    Self { host, port }
  }
}

#[async_trait]
impl Connect for UdpConnector {
  async fn connect(&self) -> Result<Arc<dyn Transport>, Error> {
    let sock = connected_socket(&self.host, self.port).await
                                                      .map_err(|e| When::Connecting.what(What::Transport(e)))?;
    Ok(Arc::new(Udp::new(sock)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn loopback() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let session = UdpConnector::new("127.0.0.1".into(), port).connect()
                                                             .await
                                                             .unwrap();
    session.write(&[1, 2, 3]).await.unwrap();

    let mut buf = [0u8; 16];
    let (n, client) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &[1, 2, 3]);

    server.send_to(&[4, 5], client).await.unwrap();
    assert_eq!(session.read(16).await.unwrap(), vec![4, 5]);
    session.close().await;
  }
}
