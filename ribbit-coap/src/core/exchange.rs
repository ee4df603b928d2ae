use std::collections::HashMap;
use std::sync::Arc;

use ribbit_coap_msg::{Id, Packet, Token};
use tokio::sync::watch;

use crate::observe::Observe;

/// Where a pending exchange is at, as seen by the request waiting on it
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Progress {
  /// Sent, no ACK yet
  Pending,
  /// Empty ACK received, waiting for a separate response
  Acked,
  /// Response (or, for pings, the ACK / RST) received
  Completed(Packet),
  /// Connection was torn down
  Disconnected,
}

impl Progress {
  pub(crate) fn is_final(&self) -> bool {
    matches!(self, Progress::Completed(_) | Progress::Disconnected)
  }
}

/// A request that has been sent and not yet resolved
pub(crate) struct PendingExchange {
  pub(crate) id: Id,
  pub(crate) token: Option<Token>,
  /// Pings resolve on the ACK alone
  pub(crate) ack_only: bool,
  pub(crate) observer: Option<Arc<dyn Observe>>,
  pub(crate) progress: watch::Sender<Progress>,
}

impl core::fmt::Debug for PendingExchange {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PendingExchange")
     .field("id", &self.id)
     .field("token", &self.token)
     .field("ack_only", &self.ack_only)
     .field("observer", &self.observer.is_some())
     .field("progress", &*self.progress.borrow())
     .finish()
  }
}

impl PendingExchange {
  pub(crate) fn new(id: Id,
                    token: Option<Token>,
                    ack_only: bool,
                    observer: Option<Arc<dyn Observe>>)
                    -> (Self, watch::Receiver<Progress>) {
    let (progress, rx) = watch::channel(Progress::Pending);
    let ex = Self { id,
                    token,
                    ack_only,
                    observer,
                    progress };
    (ex, rx)
  }

  /// An empty ACK arrived
  pub(crate) fn ack(&self, ack: &Packet) {
    if self.ack_only {
      self.progress.send_replace(Progress::Completed(ack.clone()));
    } else {
      self.progress.send_if_modified(|p| match p {
                     | Progress::Pending => {
                       *p = Progress::Acked;
                       true
                     },
                     | _ => false,
                   });
    }
  }

  /// A response arrived
  pub(crate) fn complete(&self, rep: Packet) {
    self.progress.send_replace(Progress::Completed(rep));
  }
}

/// Key of an exchange in [`Exchanges`]; never reused
pub(crate) type Key = u64;

/// Pending exchanges, indexed by both message id and token
#[derive(Debug, Default)]
pub(crate) struct Exchanges {
  next_key: Key,
  slab: HashMap<Key, PendingExchange>,
  by_id: HashMap<Id, Key>,
  by_token: HashMap<Token, Key>,
}

impl Exchanges {
  pub(crate) fn insert(&mut self, ex: PendingExchange) -> Key {
    let key = self.next_key;
    self.next_key += 1;

    self.by_id.insert(ex.id, key);
    if let Some(token) = ex.token {
      self.by_token.insert(token, key);
    }

    self.slab.insert(key, ex);
    key
  }

  pub(crate) fn remove(&mut self, key: Key) -> Option<PendingExchange> {
    let ex = self.slab.remove(&key)?;

    if self.by_id.get(&ex.id) == Some(&key) {
      self.by_id.remove(&ex.id);
    }

    if let Some(token) = ex.token {
      if self.by_token.get(&token) == Some(&key) {
        self.by_token.remove(&token);
      }
    }

    Some(ex)
  }

  pub(crate) fn by_id(&self, id: Id) -> Option<&PendingExchange> {
    self.by_id.get(&id).and_then(|k| self.slab.get(k))
  }

  pub(crate) fn by_token(&self, token: Token) -> Option<&PendingExchange> {
    self.by_token.get(&token).and_then(|k| self.slab.get(k))
  }

  pub(crate) fn key_by_token(&self, token: Token) -> Option<Key> {
    self.by_token.get(&token).copied()
  }

  /// The exchange a non-empty inbound packet answers:
  /// matched by token, or by message id when it has no token
  pub(crate) fn matching(&self, packet: &Packet) -> Option<&PendingExchange> {
    match packet.token {
      | Some(token) => self.by_token(token),
      | None => self.by_id(packet.id),
    }
  }

  pub(crate) fn drain(&mut self) -> Vec<PendingExchange> {
    self.by_id.clear();
    self.by_token.clear();
    self.slab.drain().map(|(_, ex)| ex).collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.slab.len()
  }
}

#[cfg(test)]
mod tests {
  use ribbit_coap_msg::{Code, Type};

  use super::*;

  fn packet(ty: Type, code: Code, id: u16, token: Option<u32>) -> Packet {
    let mut p = Packet::new(ty, code);
    p.id = Id(id);
    p.token = token.map(Token);
    p
  }

  #[test]
  fn indexes_by_id_and_token() {
    let mut exs = Exchanges::default();
    let (ex, _rx) = PendingExchange::new(Id(1), Some(Token(0xAA_0001)), false, None);
    let key = exs.insert(ex);

    assert!(exs.by_id(Id(1)).is_some());
    assert!(exs.by_token(Token(0xAA_0001)).is_some());
    assert_eq!(exs.key_by_token(Token(0xAA_0001)), Some(key));

    let rep = packet(Type::Con, Code::CONTENT, 99, Some(0xAA_0001));
    assert_eq!(exs.matching(&rep).map(|ex| ex.id), Some(Id(1)));

    exs.remove(key);
    assert_eq!(exs.len(), 0);
    assert!(exs.by_id(Id(1)).is_none());
    assert!(exs.by_token(Token(0xAA_0001)).is_none());
  }

  #[test]
  fn removing_stale_key_keeps_newer_index_entries() {
    let mut exs = Exchanges::default();
    let (a, _a) = PendingExchange::new(Id(1), Some(Token(1)), false, None);
    let (b, _b) = PendingExchange::new(Id(1), Some(Token(2)), false, None);
    let a = exs.insert(a);
    exs.insert(b);

    exs.remove(a);
    assert_eq!(exs.by_id(Id(1)).and_then(|ex| ex.token), Some(Token(2)));
  }

  #[test]
  fn empty_ack_only_completes_pings() {
    let ack = packet(Type::Ack, Code::EMPTY, 1, None);

    let (req, rx) = PendingExchange::new(Id(1), Some(Token(1)), false, None);
    req.ack(&ack);
    assert_eq!(*rx.borrow(), Progress::Acked);
    req.ack(&ack);
    assert_eq!(*rx.borrow(), Progress::Acked);

    let (ping, rx) = PendingExchange::new(Id(1), None, true, None);
    ping.ack(&ack);
    assert_eq!(*rx.borrow(), Progress::Completed(ack));
  }

  #[test]
  fn drain() {
    let mut exs = Exchanges::default();
    (0..3).for_each(|n| {
            let (ex, _) = PendingExchange::new(Id(n), Some(Token(n.into())), false, None);
            exs.insert(ex);
          });

    assert_eq!(exs.drain().len(), 3);
    assert_eq!(exs.len(), 0);
    assert!(exs.by_token(Token(1)).is_none());
  }
}
