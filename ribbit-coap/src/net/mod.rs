use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::core::Error;

/// Plain UDP transport
pub mod udp;

/// PSK DTLS transport
#[cfg(feature = "dtls")]
#[cfg_attr(docsrs, doc(cfg(feature = "dtls")))]
pub mod secure;

/// A connected, datagram-oriented session with the server.
///
/// Sessions are one-shot: once `read` or `write` fails the session is
/// considered dead, and the client discards it and connects again.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
  /// Send one datagram
  async fn write(&self, bytes: &[u8]) -> io::Result<()>;

  /// Receive one datagram of at most `max_len` bytes
  async fn read(&self, max_len: usize) -> io::Result<Vec<u8>>;

  /// Tear the session down
  async fn close(&self);
}

impl core::fmt::Debug for dyn Transport {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("Transport")
  }
}

/// Creates [`Transport`]s
///
/// The client invokes this every time it (re)connects.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
  /// Open a fresh session with the server
  async fn connect(&self) -> Result<Arc<dyn Transport>, Error>;
}

/// Pick the transport for some [`Settings`]: DTLS when a pre-shared
/// key is configured, plain UDP otherwise.
pub fn connector(settings: &Settings) -> Arc<dyn Connect> {
  let plain = || -> Arc<dyn Connect> {
    Arc::new(udp::UdpConnector::new(settings.host.clone(), settings.port))
  };

  match settings.psk.clone() {
    | None => plain(),
    | Some(psk) => secure_connector(settings, psk).unwrap_or_else(plain),
  }
}

#[cfg(feature = "dtls")]
fn secure_connector(settings: &Settings, psk: crate::config::Psk) -> Option<Arc<dyn Connect>> {
  Some(Arc::new(secure::DtlsConnector::new(settings.host.clone(), settings.port, psk)))
}

#[cfg(not(feature = "dtls"))]
fn secure_connector(_: &Settings, _: crate::config::Psk) -> Option<Arc<dyn Connect>> {
  log::warn!("DTLS support is not compiled in, connecting without encryption");
  None
}
