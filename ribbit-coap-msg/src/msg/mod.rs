use crate::cursor::Cursor;

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::known::observe::Action;
pub use opt::known::{Block, ContentFormat};
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use crate::from_bytes::TryConsumeBytes;
use crate::{MessageToBytesError, TryFromBytes, MAX_OPTIONS};

/// Message payload; possibly empty
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd)]
pub struct Payload(pub Vec<u8>);

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

/// # `Packet` struct
/// A CoAP message, very close to its binary layout.
///
/// Packets support both serializing to bytes and from bytes, by using the provided [`TryFromBytes`] and [`TryIntoBytes`](crate::TryIntoBytes) traits.
///
/// Options are kept in the order they appear on the wire, which is
/// non-decreasing by [`OptNumber`]; the builder methods
/// ([`Packet::add_option`], [`Packet::set_path`], ...) refuse to break that order
/// and refuse to add more than [`MAX_OPTIONS`] options.
///
/// ```
/// use ribbit_coap_msg::TryFromBytes;
/// use ribbit_coap_msg::*;
/// # //                       version  token len  code (2.05 Content)
/// # //                       |        |          /
/// # //                       |  type  |         /  message ID
/// # //                       |  |     |        |   |
/// # //                       vv vv vvvv vvvvvvvv vvvvvvvvvvvvvvvv
/// # let header: [u8; 4] = 0b_01_10_0100_01000101_0000000000000001u32.to_be_bytes();
/// # let token: [u8; 4] = [0, 0, 0, 1];
/// # let options: [&[u8]; 1] = [&[0b_1100_0001u8, 50]];
/// # let payload: [&[u8]; 2] = [&[0b_11111111u8], b"{\"ok\":true}"];
/// let packet: Vec<u8> = /* bytes! */
/// # [header.as_ref(), token.as_ref(), options.concat().as_ref(), payload.concat().as_ref()].concat();
///
/// let msg = Packet::try_from_bytes(&packet).unwrap();
///
/// assert_eq!(msg.ty, Type::Ack);
/// assert_eq!(msg.code, Code::CONTENT);
/// assert_eq!(msg.token, Some(Token(1)));
/// assert_eq!(msg.content_format(), Some(ContentFormat::Json));
/// assert_eq!(msg.payload.0, b"{\"ok\":true}".to_vec());
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug)]
pub struct Packet {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Option<Token>,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`opt::Opt`] for details
  pub opts: Vec<Opt>,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Packet {
  /// Create a packet with no id, token, options or payload
  pub fn new(ty: Type, code: Code) -> Self {
    Self { id: Id(0),
           ty,
           ver: Version::default(),
           token: None,
           code,
           opts: Vec::new(),
           payload: Payload::default() }
  }

  /// Create a new empty message that ACKs this one.
  ///
  /// ```
  /// use ribbit_coap_msg::*;
  ///
  /// let mut notification = Packet::new(Type::Con, Code::CONTENT);
  /// notification.id = Id(7);
  /// notification.token = Some(Token(1));
  ///
  /// let ack = notification.ack();
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.id, Id(7));
  /// assert!(ack.is_empty());
  /// ```
  pub fn ack(&self) -> Self {
    let mut ack = Self::new(Type::Ack, Code::EMPTY);
    ack.id = self.id;
    ack
  }

  /// Whether this is an empty message (code `0.00`), e.g. a ping or an empty ACK
  pub fn is_empty(&self) -> bool {
    self.code == Code::EMPTY
  }

  /// Append an option.
  ///
  /// Fails if the packet already holds [`MAX_OPTIONS`] options, or if
  /// `number` is lower than the number of the last option.
  pub fn add_option(&mut self,
                    number: OptNumber,
                    value: Vec<u8>)
                    -> Result<(), MessageToBytesError> {
    if self.opts.len() >= MAX_OPTIONS {
      return Err(MessageToBytesError::TooManyOptions(self.opts.len() + 1));
    }

    match self.opts.last() {
      | Some(last) if last.number > number => {
        Err(MessageToBytesError::OptionsUnsorted { prev: last.number,
                                                   next: number })
      },
      | _ => {
        self.opts.push(Opt { number,
                             value: OptValue(value) });
        Ok(())
      },
    }
  }

  /// Append an option holding an unsigned integer
  pub fn add_uint_option(&mut self, number: OptNumber, n: u64) -> Result<(), MessageToBytesError> {
    self.add_option(number, OptValue::uint(n).0)
  }

  /// Iterate over the values of every option numbered `number`
  pub fn get(&self, number: OptNumber) -> impl Iterator<Item = &OptValue> {
    self.opts
        .iter()
        .filter(move |o| o.number == number)
        .map(|o| &o.value)
  }

  /// Get the value of the first option numbered `number`
  pub fn get_first(&self, number: OptNumber) -> Option<&OptValue> {
    self.get(number).next()
  }

  /// Add one Uri-Path option per non-empty `/`-separated segment of `path`
  ///
  /// ```
  /// use ribbit_coap_msg::*;
  ///
  /// let mut req = Packet::new(Type::Con, Code::GET);
  /// req.set_path("/.u/desired/").unwrap();
  ///
  /// assert_eq!(req.get(opt::known::PATH).count(), 2);
  /// assert_eq!(req.path(), ".u/desired");
  /// ```
  pub fn set_path(&mut self, path: &str) -> Result<(), MessageToBytesError> {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .try_for_each(|seg| self.add_option(opt::known::PATH, seg.as_bytes().to_vec()))
  }

  /// The Uri-Path segments joined with `/`
  pub fn path(&self) -> String {
    self.get(opt::known::PATH)
        .map(|v| String::from_utf8_lossy(&v.0).into_owned())
        .collect::<Vec<_>>()
        .join("/")
  }

  /// Add a Uri-Query option
  pub fn add_query(&mut self, query: &str) -> Result<(), MessageToBytesError> {
    self.add_option(opt::known::QUERY, query.as_bytes().to_vec())
  }

  /// Add a Uri-Host option
  pub fn set_host(&mut self, host: &str) -> Result<(), MessageToBytesError> {
    self.add_option(opt::known::HOST, host.as_bytes().to_vec())
  }

  /// Add a Content-Format option describing the payload
  pub fn set_content_format(&mut self, format: ContentFormat) -> Result<(), MessageToBytesError> {
    self.add_uint_option(opt::known::CONTENT_FORMAT, u16::from(format).into())
  }

  /// The payload's Content-Format, if specified
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_uint(opt::known::CONTENT_FORMAT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Add an Accept option
  pub fn set_accept(&mut self, format: ContentFormat) -> Result<(), MessageToBytesError> {
    self.add_uint_option(opt::known::ACCEPT, u16::from(format).into())
  }

  /// The Content-Format requested by the Accept option, if specified
  pub fn accept(&self) -> Option<ContentFormat> {
    self.get_uint(opt::known::ACCEPT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Add an Observe option
  pub fn set_observe(&mut self, action: Action) -> Result<(), MessageToBytesError> {
    self.add_uint_option(opt::known::OBSERVE, u8::from(action).into())
  }

  /// The value of the Observe option; in notifications, a sequence number
  pub fn observe(&self) -> Option<u32> {
    self.get_uint(opt::known::OBSERVE).map(|n| n as u32)
  }

  /// Add a Block2 option
  pub fn set_block2(&mut self, block: Block) -> Result<(), MessageToBytesError> {
    self.add_uint_option(opt::known::BLOCK2, u32::from(block).into())
  }

  /// The Block2 option, if present
  pub fn block2(&self) -> Option<Block> {
    self.get_uint(opt::known::BLOCK2)
        .map(|n| Block::from(n as u32))
  }

  fn get_uint(&self, number: OptNumber) -> Option<u64> {
    self.get_first(number).map(OptValue::as_uint)
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Packet {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next()
                                      .ok_or_else(MessageParseError::eof)?
                                      .try_into()?;

    if ver != Version(1) {
      return Err(Self::Error::InvalidVersion(ver.0));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = match tkl {
      | 0 => None,
      | 4 => Some(Token::try_consume_bytes(&mut bytes)?),
      | n => return Err(Self::Error::InvalidTokenLength(n)),
    };

    let opts = Vec::<Opt>::try_consume_bytes(&mut bytes).map_err(Self::Error::OptParseError)?;

    let payload = Payload(bytes.take_until_end().to_vec());

    Ok(Packet { id,
                ty,
                ver,
                code,
                token,
                opts,
                payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::TryIntoBytes;

  #[test]
  fn parse_msg() {
    let (expect, msg) = crate::test_msg();
    assert_eq!(Packet::try_from_bytes(&msg).unwrap(), expect)
  }

  #[test]
  fn parse_byte1() {
    let byte = 0b_01_10_0011u8;
    let byte = Byte1::try_from(byte).unwrap();
    assert_eq!(byte,
               Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 })
  }

  #[test]
  fn parse_id() {
    let mut id_bytes = Cursor::new(34u16.to_be_bytes());
    let id = Id::try_consume_bytes(&mut id_bytes).unwrap();
    assert_eq!(id, Id(34));
  }

  #[test]
  fn short_header() {
    assert_eq!(Packet::try_from_bytes([0b_01_00_0000u8, 0x45, 0]),
               Err(MessageParseError::UnexpectedEndOfStream));
    assert_eq!(Packet::try_from_bytes([0u8; 0]), Err(MessageParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn bad_version() {
    assert_eq!(Packet::try_from_bytes([0b_10_00_0000u8, 0x45, 0, 1]),
               Err(MessageParseError::InvalidVersion(2)));
  }

  #[test]
  fn bad_token_length() {
    let bytes = [0b_01_00_0010u8, 0x45, 0, 1, 0xAA, 0xBB];
    assert_eq!(Packet::try_from_bytes(bytes),
               Err(MessageParseError::InvalidTokenLength(2)));
  }

  #[test]
  fn reserved_option_nibble() {
    let bytes = [0b_01_00_0000u8, 0x45, 0, 1, 0b1111_0001, 0];
    assert_eq!(Packet::try_from_bytes(bytes),
               Err(MessageParseError::OptParseError(OptParseError::OptionDeltaReservedValue(15))));
  }

  #[test]
  fn no_marker_means_no_payload() {
    let bytes = [0b_01_10_0000u8, 0x44, 0, 9, 0b1100_0000];
    let msg = Packet::try_from_bytes(bytes).unwrap();
    assert_eq!(msg.id, Id(9));
    assert_eq!(msg.token, None);
    assert_eq!(msg.payload, Payload(vec![]));
    assert_eq!(msg.content_format(), Some(ContentFormat::Text));
  }

  #[test]
  fn add_option_rejects_eleventh_option() {
    let mut msg = Packet::new(Type::Con, Code::GET);
    (0..MAX_OPTIONS).for_each(|_| msg.add_query("a=b").unwrap());
    assert_eq!(msg.add_query("c=d"),
               Err(MessageToBytesError::TooManyOptions(MAX_OPTIONS + 1)));
    assert_eq!(msg.opts.len(), MAX_OPTIONS);
  }

  #[test]
  fn add_option_rejects_decreasing_number() {
    let mut msg = Packet::new(Type::Con, Code::GET);
    msg.set_accept(ContentFormat::Json).unwrap();
    assert_eq!(msg.set_path("a"),
               Err(MessageToBytesError::OptionsUnsorted { prev: opt::known::ACCEPT,
                                                          next: opt::known::PATH }));
  }

  #[test]
  fn typed_options() {
    let mut msg = Packet::new(Type::Con, Code::GET);
    msg.set_host("coap.example").unwrap();
    msg.set_observe(Action::Register).unwrap();
    msg.set_path("a/b").unwrap();
    msg.add_query("x=1").unwrap();
    msg.set_accept(ContentFormat::Cbor).unwrap();
    msg.set_block2(Block::from_szx(6, 3, false)).unwrap();

    let bytes = msg.try_into_bytes().unwrap();
    let msg = Packet::try_from_bytes(bytes).unwrap();

    assert_eq!(msg.get_first(opt::known::HOST).and_then(OptValue::as_str),
               Some("coap.example"));
    assert_eq!(msg.observe(), Some(0));
    assert_eq!(msg.path(), "a/b");
    assert_eq!(msg.accept(), Some(ContentFormat::Cbor));
    assert_eq!(msg.block2().map(|b| b.num()), Some(3));
    assert_eq!(msg.content_format(), None);
  }
}
