use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use ribbit_coap_msg::{Code, ContentFormat, Id, Packet, Token, TryFromBytes, TryIntoBytes, Type};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Settings};
use crate::logging::packet_summary;
use crate::net::{Connect, Transport};
use crate::observe::{Observe, OnConnect};
use crate::retry::{RetryTimer, YouShould};

mod error;
pub(crate) mod exchange;

#[doc(inline)]
pub use error::*;
use exchange::{Exchanges, Key, PendingExchange, Progress};

/// State scoped to a single connection
#[derive(Debug)]
pub(crate) struct Conn {
  pub(crate) epoch: u16,
  next_id: Id,
  pub(crate) transport: Option<Arc<dyn Transport>>,
  pub(crate) exchanges: Exchanges,
  /// Stops the read loop & keepalive of this connection
  pub(crate) cancel: CancellationToken,
  pub(crate) connected: bool,
}

impl Conn {
  fn next_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  pub(crate) fn reset(&mut self, epoch: u16, cancel: CancellationToken) {
    self.epoch = epoch;
    self.next_id = Id(0);
    self.cancel = cancel;
  }
}

pub(crate) struct Inner {
  pub(crate) config: Config,
  pub(crate) connector: Arc<dyn Connect>,
  pub(crate) conn: Mutex<Conn>,
  /// Serializes registration & transmission of packets
  pub(crate) wire: tokio::sync::Mutex<()>,
  /// `true` once something asked for the connection to be recycled
  pub(crate) reconnect: watch::Sender<bool>,
  pub(crate) hooks: Mutex<Vec<Arc<dyn OnConnect>>>,
  pub(crate) rng: Mutex<ChaCha8Rng>,
  pub(crate) shutdown: CancellationToken,
}

/// A CoAP client that keeps a session with a single server alive.
///
/// Cloning is cheap; all clones share the same connection.
///
/// Requests made while no session is open fail with [`What::Disconnected`].
/// Run [`Client::run`] on a task to connect and to reconnect whenever
/// the session breaks.
///
/// ```no_run
/// use ribbit_coap::config::{Config, Settings};
/// use ribbit_coap::Client;
/// use ribbit_coap_msg::ContentFormat;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = Client::new(Config::default(), &Settings::plain("coap.me", 5683));
/// tokio::spawn(client.clone().run());
///
/// let rep = client.get(".well-known/core", ContentFormat::LinkFormat)
///                 .await
///                 .unwrap();
/// println!("{}", String::from_utf8_lossy(&rep.payload.0));
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
  pub(crate) inner: Arc<Inner>,
}

impl core::fmt::Debug for Client {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Client")
     .field("config", &self.inner.config)
     .field("conn", &*self.conn())
     .finish_non_exhaustive()
  }
}

/// Deregisters an exchange when the request waiting on it goes away
struct Registration {
  client: Client,
  key: Key,
  keep: bool,
}

impl Drop for Registration {
  fn drop(&mut self) {
    if !self.keep {
      self.client.conn().exchanges.remove(self.key);
    }
  }
}

impl Client {
  /// Create a client for the server described by `settings`
  pub fn new(config: Config, settings: &Settings) -> Self {
    Self::new_with_connector(config, crate::net::connector(settings))
  }

  /// Create a client that opens its sessions with `connector`
  pub fn new_with_connector(config: Config, connector: Arc<dyn Connect>) -> Self {
    let (reconnect, _) = watch::channel(false);
    let shutdown = CancellationToken::new();
    let conn = Conn { epoch: 0,
                      next_id: Id(0),
                      transport: None,
                      exchanges: Exchanges::default(),
                      cancel: shutdown.child_token(),
                      connected: false };

    Self { inner: Arc::new(Inner { config,
                                   connector,
                                   conn: Mutex::new(conn),
                                   wire: tokio::sync::Mutex::new(()),
                                   reconnect,
                                   hooks: Mutex::new(Vec::new()),
                                   rng: Mutex::new(ChaCha8Rng::from_entropy()),
                                   shutdown }) }
  }

  pub(crate) fn conn(&self) -> MutexGuard<'_, Conn> {
    self.inner.conn.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
    self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The runtime config this client was created with
  pub fn config(&self) -> &Config {
    &self.inner.config
  }

  /// Whether the session is up and every on-connect hook has run
  pub fn is_connected(&self) -> bool {
    self.conn().connected
  }

  /// Number of exchanges that are registered (pending requests & observations)
  pub fn pending(&self) -> usize {
    self.conn().exchanges.len()
  }

  /// Send a confirmable request and wait for its response.
  ///
  /// The packet's id is always assigned by the client, as is its token
  /// (unless one was set or the packet is an empty ping).
  pub async fn request(&self, packet: Packet) -> Result<Packet, Error> {
    self.exchange(packet, None).await
  }

  /// GET a resource
  pub async fn get(&self, path: &str, accept: ContentFormat) -> Result<Packet, Error> {
    let mut req = Self::build(Code::GET, path)?;
    req.set_accept(accept).map_err(|e| When::None.what(e.into()))?;
    self.request(req).await
  }

  /// PUT a payload
  pub async fn put(&self, path: &str, payload: &[u8], format: ContentFormat) -> Result<Packet, Error> {
    self.request(Self::with_payload(Code::PUT, path, payload, format)?)
        .await
  }

  /// POST a payload
  pub async fn post(&self, path: &str, payload: &[u8], format: ContentFormat) -> Result<Packet, Error> {
    self.request(Self::with_payload(Code::POST, path, payload, format)?)
        .await
  }

  /// DELETE a resource
  pub async fn delete(&self, path: &str) -> Result<Packet, Error> {
    self.request(Self::build(Code::DELETE, path)?).await
  }

  /// Send an empty confirmable message and wait for the server's
  /// ACK or RST, which is returned.
  pub async fn ping(&self) -> Result<Packet, Error> {
    self.request(Packet::new(Type::Con, Code::EMPTY)).await
  }

  pub(crate) fn build(code: Code, path: &str) -> Result<Packet, Error> {
    let mut req = Packet::new(Type::Con, code);
    req.set_path(path).map_err(|e| When::None.what(e.into()))?;
    Ok(req)
  }

  fn with_payload(code: Code, path: &str, payload: &[u8], format: ContentFormat) -> Result<Packet, Error> {
    let mut req = Self::build(code, path)?;
    req.set_content_format(format)
       .map_err(|e| When::None.what(e.into()))?;
    req.payload.0 = payload.to_vec();
    Ok(req)
  }

  pub(crate) async fn exchange(&self,
                               mut packet: Packet,
                               observer: Option<Arc<dyn Observe>>)
                               -> Result<Packet, Error> {
    let observing = observer.is_some();
    let ping = packet.is_empty();
    packet.ty = Type::Con;

    let wire = self.inner.wire.lock().await;
    let (epoch, transport, key, bytes, mut rx) = {
      let mut conn = self.conn();
      let transport = conn.transport
                          .clone()
                          .ok_or_else(|| When::None.what(What::Disconnected))?;

      packet.id = conn.next_id();
      if !ping && packet.token.is_none() {
        packet.token = Some(Token::new(conn.epoch, packet.id));
      }

      let bytes = packet.try_into_bytes()
                        .map_err(|e| When::SendingMessage(packet.id, packet.token).what(e.into()))?;

      let (ex, rx) = PendingExchange::new(packet.id, packet.token, ping, observer);
      let key = conn.exchanges.insert(ex);
      (conn.epoch, transport, key, bytes, rx)
    };

    let when = When::SendingMessage(packet.id, packet.token);
    let mut registration = Registration { client: self.clone(),
                                          key,
                                          keep: false };

    log::trace!(">>>>>> {}", packet_summary(&packet));
    self.transmit(&transport, epoch, &bytes, when).await?;
    drop(wire);

    let strategy = self.inner.config.msg.con.retry_strategy;
    let max_attempts = self.inner.config.msg.con.max_attempts;
    let mut retry = RetryTimer::new(&mut *self.rng(), strategy, max_attempts);
    let mut delay = retry.first_delay();

    loop {
      let answered = tokio::time::timeout(delay, rx.wait_for(|p| *p != Progress::Pending)).await
                                                                                           .map(|r| r.is_ok());
      let stale = self.conn().epoch != epoch;
      match answered {
        | Ok(true) => break,
        | Ok(false) => return Err(when.what(What::Disconnected)),
        | Err(_) if stale => return Err(when.what(What::Disconnected)),
        | Err(_) => match retry.what_should_i_do() {
          | YouShould::Cry => {
            self.reconnect_from(epoch, "reached max retransmissions");
            return Err(when.what(What::RequestTimeout));
          },
          | YouShould::Retry(next) => {
            log::debug!("no ACK for message {} after {:?}, retransmitting (attempt {})",
                        packet.id.0,
                        delay,
                        retry.attempts().0);
            delay = next;
            let _wire = self.inner.wire.lock().await;
            self.transmit(&transport, epoch, &bytes, when).await?;
          },
        },
      }
    }

    let outcome = rx.wait_for(Progress::is_final)
                    .await
                    .map(|p| p.clone())
                    .unwrap_or(Progress::Disconnected);

    match outcome {
      | Progress::Completed(rep) => {
        registration.keep = observing;
        Ok(rep)
      },
      | _ => Err(when.what(What::Disconnected)),
    }
  }

  /// Write a datagram; the caller must hold the wire lock
  async fn transmit(&self,
                    transport: &Arc<dyn Transport>,
                    epoch: u16,
                    bytes: &[u8],
                    when: When)
                    -> Result<(), Error> {
    transport.write(bytes).await.map_err(|e| {
                                  self.reconnect_from(epoch, "error writing packet");
                                  when.what(What::Transport(e))
                                })
  }

  async fn send_ack(&self, transport: &Arc<dyn Transport>, epoch: u16, packet: &Packet) -> Result<(), Error> {
    let ack = packet.ack();
    let when = When::SendingMessage(ack.id, None);
    let bytes = ack.try_into_bytes().map_err(|e| when.what(e.into()))?;

    log::trace!(">>>>>> {}", packet_summary(&ack));
    let _wire = self.inner.wire.lock().await;
    self.transmit(transport, epoch, &bytes, when).await
  }

  /// Route an inbound packet to the exchange waiting for it
  fn dispatch(&self, packet: Packet) {
    let conn = self.conn();

    if packet.ty == Type::Ack && packet.is_empty() {
      match conn.exchanges.by_id(packet.id) {
        | Some(ex) => ex.ack(&packet),
        | None => log::debug!("ACK for unknown message {}", packet.id.0),
      }
      return;
    }

    match conn.exchanges.matching(&packet) {
      | Some(ex) => {
        if let Some(observer) = ex.observer.clone() {
          let client = self.clone();
          let packet = packet.clone();
          tokio::spawn(async move { observer.notify(client, packet).await });
        }

        ex.complete(packet);
      },
      | None => log::debug!("no exchange waiting for {}", packet_summary(&packet)),
    }
  }

  /// Read packets until the session breaks or the connection is cancelled
  pub(crate) async fn read_loop(self, transport: Arc<dyn Transport>, epoch: u16, cancel: CancellationToken) {
    loop {
      let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        r = transport.read(self.inner.config.max_datagram) => r,
      };

      let packet = read.map_err(|e| When::Polling.what(What::Transport(e)))
                       .and_then(|bytes| {
                         Packet::try_from_bytes(bytes).map_err(|e| When::Polling.what(e.into()))
                       });

      let packet = match packet {
        | Ok(p) => p,
        | Err(e) => {
          log::debug!("{}", e);
          if !cancel.is_cancelled() {
            self.reconnect_from(epoch, "error reading packet");
          }
          return;
        },
      };

      log::trace!("<<<<<< {}", packet_summary(&packet));

      if packet.ty == Type::Con && self.send_ack(&transport, epoch, &packet).await.is_err() {
        return;
      }

      self.dispatch(packet);
    }
  }

  /// Ask the supervisor to tear the session down and connect again.
  ///
  /// Only the first request per connection is logged; the rest are no-ops.
  pub fn force_reconnect(&self, reason: &str) {
    let epoch = self.conn().epoch;
    self.reconnect_from(epoch, reason);
  }

  /// Request a reconnect on behalf of the connection with `epoch`.
  ///
  /// Ignored once that connection has been replaced, so tasks outliving
  /// their connection cannot tear down its successor.
  pub(crate) fn reconnect_from(&self, epoch: u16, reason: &str) {
    // the flag is reset under this lock together with the epoch
    let conn = self.conn();
    if conn.epoch != epoch {
      log::debug!("ignoring reconnect request from a closed connection: {}", reason);
      return;
    }

    let first = self.inner.reconnect.send_if_modified(|requested| {
                                      if *requested {
                                        false
                                      } else {
                                        *requested = true;
                                        true
                                      }
                                    });

    drop(conn);

    if first {
      log::warn!("Force reconnection, reason: {}", reason);
    }
  }
}
