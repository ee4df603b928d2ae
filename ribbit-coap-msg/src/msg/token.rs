use crate::cursor::Cursor;

use super::{Id, MessageParseError};
use crate::from_bytes::TryConsumeBytes;

/// # Message Token
///
/// The Token is used to match a response with a request, while the
/// [`Id`] matches an Acknowledgement or Reset with the message it answers.
///
/// Tokens are either absent or exactly 4 bytes on the wire. Requests made
/// by the client derive theirs from the connection epoch and the message
/// id, which makes a response to a request from a previous connection
/// impossible to mistake for a current one.
///
/// ```
/// use ribbit_coap_msg::{Id, Token};
///
/// assert_eq!(Token::new(0xBEEF, Id(3)), Token(0xBEEF_0003));
/// assert_eq!(Token(0xBEEF_0003).to_be_bytes(), [0xBE, 0xEF, 0x00, 0x03]);
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Token(pub u32);

impl Token {
  /// Token for the message `id` sent during connection `epoch`
  pub fn new(epoch: u16, id: Id) -> Self {
    Token(u32::from(epoch) << 16 | u32::from(id.0))
  }

  /// Wire representation of the token
  pub fn to_be_bytes(self) -> [u8; 4] {
    self.0.to_be_bytes()
  }

  /// The epoch half of the token
  pub fn epoch(&self) -> u16 {
    (self.0 >> 16) as u16
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Token {
  type Error = MessageParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    match bytes.take_exact(4) {
      | Some(&[a, b, c, d]) => Ok(Token(u32::from_be_bytes([a, b, c, d]))),
      | _ => Err(MessageParseError::eof()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn epoch() {
    let token = Token::new(0x1234, Id(0xFFFF));
    assert_eq!(token.epoch(), 0x1234);
    assert_eq!(token.0 & 0xFFFF, 0xFFFF);
  }

  #[test]
  fn consume() {
    let mut bytes = Cursor::new([0xCA, 0xFE, 0, 1, 0xFF]);
    assert_eq!(Token::try_consume_bytes(&mut bytes).unwrap(),
               Token(0xCAFE_0001));
    assert_eq!(bytes.remaining(), 1);

    let mut short = Cursor::new([0xCA, 0xFE]);
    assert_eq!(Token::try_consume_bytes(&mut short),
               Err(MessageParseError::UnexpectedEndOfStream));
  }
}
