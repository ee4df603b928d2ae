//! Connection lifecycle.
//!
//! A [`Client`] only talks to the server while [`Client::run`] is
//! driving it. `run` connects, waits for something to request a
//! reconnect (a failed write, a garbled datagram, a request exhausting its
//! retransmissions, a missed keepalive) and then tears the session
//! down and starts over. Failed connection attempts are retried after
//! [`Config::reconnect_delay`](crate::config::Config::reconnect_delay).

use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::core::exchange::Progress;
use crate::core::{Client, Error};

impl Client {
  /// Keep a session with the server open until [`Client::shutdown`] is called
  pub async fn run(self) {
    tokio::select! {
      _ = self.inner.shutdown.cancelled() => (),
      _ = async { loop { self.session().await } } => (),
    }

    self.disconnect().await;
  }

  /// Stop [`Client::run`] for good
  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
  }

  /// One connect / wait / disconnect cycle
  async fn session(&self) {
    match self.connect().await {
      | Ok(()) => self.reconnect_requested().await,
      | Err(e) => {
        log::error!("Error trying to connect: {}", e);
        tokio::time::sleep(self.inner.config.reconnect_delay).await;
      },
    }

    self.disconnect().await;
  }

  async fn reconnect_requested(&self) {
    let mut requested = self.inner.reconnect.subscribe();
    requested.wait_for(|r| *r).await.ok();
  }

  fn new_epoch(&self) -> u16 {
    let prev = self.conn().epoch;
    let mut rng = self.rng();
    loop {
      let epoch = rng.gen::<u16>();
      if epoch != prev {
        break epoch;
      }
    }
  }

  /// Open a session, check it with a ping and run the on-connect hooks
  pub(crate) async fn connect(&self) -> Result<(), Error> {
    log::info!("Connecting to CoAP server");

    let epoch = self.new_epoch();
    let cancel = self.inner.shutdown.child_token();
    {
      let mut conn = self.conn();
      self.inner.reconnect.send_replace(false);
      conn.reset(epoch, cancel.clone());
    }

    let transport = self.inner.connector.connect().await?;
    self.conn().transport = Some(transport.clone());
    tokio::spawn(self.clone().read_loop(transport, epoch, cancel.clone()));

    self.ping().await?;
    log::info!("Connected to CoAP server");

    tokio::spawn(self.clone().keepalive(epoch, cancel));

    for hook in self.hooks() {
      hook.on_connect(self.clone()).await?;
    }

    self.conn().connected = true;
    Ok(())
  }

  async fn keepalive(self, epoch: u16, cancel: CancellationToken) {
    let interval = self.inner.config.keepalive_interval;
    loop {
      let ping = async {
        tokio::time::sleep(interval).await;
        self.ping().await
      };

      let pinged = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        r = ping => r,
      };

      if let Err(e) = pinged {
        log::debug!("keepalive: {}", e);
        if !cancel.is_cancelled() {
          self.reconnect_from(epoch, "error sending ping request");
        }
        return;
      }
    }
  }

  /// Tear down the current session, failing everything still pending
  pub(crate) async fn disconnect(&self) {
    let (transport, exchanges) = {
      let mut conn = self.conn();
      if conn.connected {
        log::info!("Disconnecting from CoAP server");
        conn.connected = false;
      }

      conn.cancel.cancel();
      (conn.transport.take(), conn.exchanges.drain())
    };

    for ex in exchanges {
      ex.progress.send_replace(Progress::Disconnected);
    }

    if let Some(transport) = transport {
      transport.close().await;
    }
  }
}

/// Run a client for whatever settings `settings` holds, replacing it
/// every time they change.
///
/// `None`, or settings that are not [`usable`](Settings::usable) (no
/// credentials and no opt-in to plain UDP), disable the integration until
/// usable settings show up. Returns once the sender is dropped.
pub async fn follow<F>(mut settings: watch::Receiver<Option<Settings>>, mut build: F)
  where F: FnMut(&Settings) -> Client
{
  loop {
    let current = settings.borrow_and_update().clone();

    let running = match current {
      | Some(s) if !s.usable() => {
        log::warn!("CoAP integration disabled, no credentials for {}:{}", s.host, s.port);
        None
      },
      | Some(s) => {
        log::info!("CoAP server is {}:{}", s.host, s.port);
        let client = build(&s);
        let task = tokio::spawn(client.clone().run());
        Some((client, task))
      },
      | None => {
        log::info!("CoAP integration disabled");
        None
      },
    };

    let changed = settings.changed().await;

    if let Some((client, task)) = running {
      client.shutdown();
      task.await.ok();
    }

    if changed.is_err() {
      return;
    }
  }
}
