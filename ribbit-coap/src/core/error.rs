use ribbit_coap_msg::{Id, MessageParseError, MessageToBytesError, Token};

/// The context that an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// We were polling for a message when the error occurred
  Polling,
  /// We were sending a message
  SendingMessage(Id, Option<Token>),
  /// We were establishing the transport session
  Connecting,
  /// We were reading the given block of a block-wise transfer
  Streaming(u32),
  /// No particular context
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what(self, what: What) -> Error {
    Error { when: self, what }
  }
}

impl core::fmt::Display for When {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | When::Polling => write!(f, " while polling"),
      | When::SendingMessage(id, Some(token)) => {
        write!(f, " while sending message {} (token {:08x})", id.0, token.0)
      },
      | When::SendingMessage(id, None) => write!(f, " while sending message {}", id.0),
      | When::Connecting => write!(f, " while connecting"),
      | When::Streaming(block) => write!(f, " while streaming block {}", block),
      | When::None => Ok(()),
    }
  }
}

/// An error encounterable by the client
#[derive(Debug, thiserror::Error)]
#[error("{what}{when}")]
pub struct Error {
  /// What happened?
  pub what: What,
  /// What were we doing when it happened?
  pub when: When,
}

impl Error {
  /// Is this error `InvalidPacket`?
  pub fn message_parse_error(&self) -> Option<&MessageParseError> {
    match self.what {
      | What::InvalidPacket(ref e) => Some(e),
      | _ => None,
    }
  }

  /// Did the connection drop while this request was pending?
  pub fn is_disconnected(&self) -> bool {
    matches!(self.what, What::Disconnected)
  }

  /// Did the request exhaust its retransmissions?
  pub fn is_timeout(&self) -> bool {
    matches!(self.what, What::RequestTimeout)
  }

  /// The protocol violation, if this is one
  pub fn violation(&self) -> Option<&Violation> {
    match self.what {
      | What::ProtocolViolation(ref v) => Some(v),
      | _ => None,
    }
  }
}

/// A contextless error with some additional debug data attached.
#[derive(Debug, thiserror::Error)]
pub enum What {
  /// A datagram could not be parsed as a CoAP packet
  #[error("invalid packet: {0}")]
  InvalidPacket(MessageParseError),
  /// The connection was torn down before the exchange completed
  #[error("disconnected")]
  Disconnected,
  /// A CONfirmable message was sent many times without an ACKnowledgement.
  #[error("request timed out")]
  RequestTimeout,
  /// Either side broke the protocol's rules
  #[error("protocol violation: {0}")]
  ProtocolViolation(Violation),
  /// Some socket operation (e.g. connecting to host) failed
  #[error("transport error: {0}")]
  Transport(#[from] std::io::Error),
  /// DTLS setup or handshake failed
  #[error("DTLS error: {0}")]
  Tls(String),
}

/// The rules that were broken in a [`What::ProtocolViolation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
  /// The server answered a Block2 request with a different block
  #[error("requested block {requested}, received {received:?}")]
  BlockMismatch {
    /// Block number that was asked for
    requested: u32,
    /// Block number in the response, if it had a Block2 option at all
    received: Option<u32>,
  },
  /// A payload does not fit in the buffer it should be copied to
  #[error("payload of {needed} bytes does not fit in {capacity} byte buffer")]
  BufferTooSmall {
    #[allow(missing_docs)]
    needed: usize,
    #[allow(missing_docs)]
    capacity: usize,
  },
  /// An outbound packet could not be serialized
  #[error("{0}")]
  Encode(MessageToBytesError),
}

impl From<MessageToBytesError> for Violation {
  fn from(e: MessageToBytesError) -> Self {
    Violation::Encode(e)
  }
}

impl From<Violation> for What {
  fn from(v: Violation) -> Self {
    What::ProtocolViolation(v)
  }
}

impl From<MessageToBytesError> for What {
  fn from(e: MessageToBytesError) -> Self {
    What::ProtocolViolation(Violation::Encode(e))
  }
}

impl From<MessageParseError> for What {
  fn from(e: MessageParseError) -> Self {
    What::InvalidPacket(e)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    let e = When::SendingMessage(Id(3), Some(Token(0xAB_0003))).what(What::RequestTimeout);
    assert_eq!(e.to_string(),
               "request timed out while sending message 3 (token 00ab0003)");

    let e = When::Streaming(2).what(What::from(Violation::BlockMismatch { requested: 2,
                                                                           received: Some(3) }));
    assert_eq!(e.to_string(),
               "protocol violation: requested block 2, received Some(3) while streaming block 2");
    assert!(e.violation().is_some());
  }

  #[test]
  fn classify() {
    assert!(When::None.what(What::Disconnected).is_disconnected());
    assert!(When::None.what(What::RequestTimeout).is_timeout());
    let e = When::Polling.what(MessageParseError::InvalidVersion(2).into());
    assert_eq!(e.message_parse_error(),
               Some(&MessageParseError::InvalidVersion(2)));
  }
}
