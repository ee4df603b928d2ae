use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use ribbit_coap_msg::{Action, Code, ContentFormat, Packet, Token, Type};

use crate::core::{Client, Error, When};

/// Receives the responses to an observation.
///
/// The first response (the one [`Client::observe`] resolves with) is
/// delivered too, followed by every notification the server pushes
/// until [`Client::unobserve`] is called or the connection drops.
///
/// Any `Fn(Client, Packet) -> impl Future<Output = ()>` is an observer.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
  /// A response carrying the observation's token arrived
  async fn notify(&self, client: Client, packet: Packet);
}

#[async_trait]
impl<F, Fut> Observe for F
  where F: Fn(Client, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
  async fn notify(&self, client: Client, packet: Packet) {
    self(client, packet).await
  }
}

/// Runs every time a session with the server has been established,
/// before the client reports itself as connected.
///
/// This is where observations are (re-)registered; they do not survive
/// a reconnect. A hook failing aborts the connection attempt.
#[async_trait]
pub trait OnConnect: Send + Sync + 'static {
  #[allow(missing_docs)]
  async fn on_connect(&self, client: Client) -> Result<(), Error>;
}

#[async_trait]
impl<F, Fut> OnConnect for F
  where F: Fn(Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static
{
  async fn on_connect(&self, client: Client) -> Result<(), Error> {
    self(client).await
  }
}

impl Client {
  /// Register `observer` for the resource at `path`.
  ///
  /// Resolves with the server's first response; the observation stays
  /// registered only if that succeeded.
  pub async fn observe<O>(&self, path: &str, accept: ContentFormat, observer: O) -> Result<Packet, Error>
    where O: Observe
  {
    let mut req = Packet::new(Type::Con, Code::GET);
    req.set_observe(Action::Register)
       .and_then(|_| req.set_path(path))
       .and_then(|_| req.set_accept(accept))
       .map_err(|e| When::None.what(e.into()))?;

    let observer: Arc<dyn Observe> = Arc::new(observer);
    self.exchange(req, Some(observer)).await
  }

  /// Forget the observation registered under `token`.
  ///
  /// Returns whether there was one. Notifications arriving afterwards
  /// are dropped.
  pub fn unobserve(&self, token: Token) -> bool {
    let mut conn = self.conn();
    match conn.exchanges.key_by_token(token) {
      | Some(key) => conn.exchanges.remove(key).is_some(),
      | None => false,
    }
  }

  /// Run `hook` (after the hooks already registered) every time the
  /// client connects
  pub fn on_connect<H>(&self, hook: H)
    where H: OnConnect
  {
    self.inner
        .hooks
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(Arc::new(hook));
  }

  pub(crate) fn hooks(&self) -> Vec<Arc<dyn OnConnect>> {
    self.inner
        .hooks
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use ribbit_coap_msg::{Id, Type};
  use tokio::sync::mpsc;

  use super::*;
  use crate::test::{connected, piggyback};

  fn forward_to(tx: mpsc::UnboundedSender<Packet>) -> impl Observe {
    move |_: Client, p: Packet| {
      let tx = tx.clone();
      async move {
        tx.send(p).ok();
      }
    }
  }

  #[tokio::test(start_paused = true)]
  async fn notifications_reach_observer_until_unobserved() {
    let (client, _, _remotes, mut remote) = connected().await;
    let (tx, mut notifications) = mpsc::unbounded_channel();

    let registering = tokio::spawn({
      let client = client.clone();
      async move { client.observe("sensors/temp", ContentFormat::Cbor, forward_to(tx)).await }
    });

    let req = remote.recv().await;
    assert_eq!(req.observe(), Some(0));
    assert_eq!(req.path(), "sensors/temp");
    assert_eq!(req.accept(), Some(ContentFormat::Cbor));

    let mut first = piggyback(&req, Code::CONTENT, b"21.5");
    first.set_observe(Action::Register).unwrap();
    remote.send(first);

    let rep = registering.await.unwrap().unwrap();
    assert_eq!(rep.payload.0, b"21.5".to_vec());
    assert_eq!(notifications.recv().await.unwrap().payload.0, b"21.5".to_vec());
    assert_eq!(client.pending(), 1);

    let mut notif = Packet::new(Type::Non, Code::CONTENT);
    notif.id = Id(0x7000);
    notif.token = req.token;
    notif.add_uint_option(ribbit_coap_msg::opt::known::OBSERVE, 2)
         .unwrap();
    notif.payload.0 = b"21.7".to_vec();
    remote.send(notif.clone());

    let got = notifications.recv().await.unwrap();
    assert_eq!(got.payload.0, b"21.7".to_vec());
    assert_eq!(got.observe(), Some(2));

    assert!(client.unobserve(req.token.unwrap()));
    assert!(!client.unobserve(req.token.unwrap()));
    assert_eq!(client.pending(), 0);

    notif.id = Id(0x7001);
    remote.send(notif);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(notifications.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn failed_registration_is_forgotten() {
    let (client, _, _remotes, mut remote) = connected().await;
    let (tx, mut notifications) = mpsc::unbounded_channel();

    let registering = tokio::spawn({
      let client = client.clone();
      async move { client.observe("gone", ContentFormat::Text, forward_to(tx)).await }
    });

    for _ in 0..5 {
      remote.recv().await;
    }

    assert!(registering.await.unwrap().unwrap_err().is_timeout());
    assert_eq!(client.pending(), 0);
    assert!(notifications.try_recv().is_err());
  }
}
