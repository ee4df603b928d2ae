/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Version was something other than 1
  InvalidVersion(u8),

  /// Token length was neither 0 nor 4
  InvalidTokenLength(u8),

  /// Error parsing option
  OptParseError(super::opt::parse_error::OptParseError),

  /// The message type is invalid (see [`Type`](super::Type) for information & valid values)
  InvalidType(u8),
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl core::fmt::Display for MessageParseError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "unexpected end of packet"),
      | Self::InvalidVersion(v) => write!(f, "unsupported CoAP version {}", v),
      | Self::InvalidTokenLength(n) => write!(f, "unsupported token length {}", n),
      | Self::OptParseError(e) => write!(f, "invalid option: {:?}", e),
      | Self::InvalidType(t) => write!(f, "invalid message type {}", t),
    }
  }
}

impl std::error::Error for MessageParseError {}
