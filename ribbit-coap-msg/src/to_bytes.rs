use tinyvec::ArrayVec;

use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use ribbit_coap_msg::{Code, Packet, TryIntoBytes, Type};
  ///
  /// let ping = Packet::new(Type::Con, Code::EMPTY);
  /// let bytes = ping.try_into_bytes().unwrap();
  ///
  /// assert_eq!(bytes, vec![0b_01_00_0000, 0, 0, 0]);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// The encoded message would not fit in a single datagram
  #[allow(missing_docs)]
  TooLong { capacity: usize, size: usize },

  /// More than [`MAX_OPTIONS`] options
  TooManyOptions(usize),

  /// An option numbered lower than the option before it
  #[allow(missing_docs)]
  OptionsUnsorted { prev: OptNumber, next: OptNumber },

  /// Option delta or value length too big for the extended encoding
  OptionTooLarge(OptNumber),
}

impl core::fmt::Display for MessageToBytesError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::TooLong { capacity, size } => {
        write!(f, "packet of {} bytes exceeds {} byte datagram", size, capacity)
      },
      | Self::TooManyOptions(n) => write!(f, "{} options exceeds max of {}", n, MAX_OPTIONS),
      | Self::OptionsUnsorted { prev, next } => {
        write!(f, "option {} may not follow option {}", next.0, prev.0)
      },
      | Self::OptionTooLarge(n) => write!(f, "option {} cannot be encoded", n.0),
    }
  }
}

impl std::error::Error for MessageToBytesError {}

impl Packet {
  /// Make sure the options can be serialized, and compute the
  /// size (in bytes) of the serialized packet
  fn check_and_get_size(&self) -> Result<usize, MessageToBytesError> {
    if self.opts.len() > MAX_OPTIONS {
      return Err(MessageToBytesError::TooManyOptions(self.opts.len()));
    }

    let header_size = 4;
    let token_size = self.token.map(|_| 4).unwrap_or(0);
    let payload_size = match self.payload.0.len() {
      | 0 => 0,
      | n => n + 1,
    };

    let mut prev = OptNumber(0);
    let mut opts_size = 0;
    for opt in self.opts.iter() {
      if opt.number < prev {
        return Err(MessageToBytesError::OptionsUnsorted { prev,
                                                          next: opt.number });
      }

      if opt.number.0 - prev.0 > opt::MAX_OPT_EXTENDED
         || opt.value.0.len() > opt::MAX_OPT_EXTENDED as usize
      {
        return Err(MessageToBytesError::OptionTooLarge(opt.number));
      }

      opts_size += opt.get_size(prev);
      prev = opt.number;
    }

    Ok(header_size + token_size + opts_size + payload_size)
  }
}

impl<'a> TryIntoBytes for &'a Packet {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    let size = self.check_and_get_size()?;

    if size > MAX_DATAGRAM {
      return Err(Self::Error::TooLong { capacity: MAX_DATAGRAM,
                                        size });
    }

    let mut bytes = Vec::with_capacity(size);

    let byte1: u8 = Byte1 { tkl: self.token.map(|_| 4).unwrap_or(0),
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);
    bytes.extend(id);

    if let Some(token) = self.token {
      bytes.extend(token.to_be_bytes());
    }

    let mut prev = OptNumber(0);
    for opt in self.opts.iter() {
      opt.extend_bytes(prev, &mut bytes);
      prev = opt.number;
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b11111111);
      bytes.extend_from_slice(&self.payload.0);
    }

    Ok(bytes)
  }
}

pub(crate) fn opt_len_or_delta(val: u32) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend(((n - 269) as u16).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n - 13) as u8);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

impl From<Id> for [u8; 2] {
  fn from(id: Id) -> [u8; 2] {
    id.0.to_be_bytes()
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    use Type::*;
    match t {
      | Con => 0,
      | Non => 1,
      | Ack => 2,
      | Reset => 3,
    }
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}

#[cfg(test)]
mod tests {
  use core::iter::repeat;

  use super::*;
  use crate::{assert_eqb, assert_eqb_iter};

  #[test]
  fn msg() {
    let (msg, expected) = test_msg();
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eqb_iter!(actual, expected);
  }

  #[test]
  fn round_trip() {
    let (msg, _) = test_msg();
    let bytes = msg.try_into_bytes().unwrap();
    assert_eq!(Packet::try_from_bytes(bytes).unwrap(), msg);
  }

  #[test]
  fn byte_1() {
    let byte = Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 4 };
    let actual: u8 = byte.into();
    let expected = 0b_01_10_0100u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn id() {
    let id = Id(16);
    let actual = u16::from_be_bytes(id.into());
    assert_eqb!(actual, 16)
  }

  #[test]
  fn opt() {
    let cases: [(u32, Vec<u8>, Vec<u8>); 6] =
      [(24,
        repeat(1).take(100).collect(),
        [[0b1101_1101u8, 24 - 13, 100 - 13].as_ref(),
         repeat(1).take(100).collect::<Vec<u8>>().as_ref()].concat()),
       (1, vec![1], vec![0b0001_0001, 1]),
       (12, vec![1], vec![0b1100_0001, 1]),
       (24, vec![1], vec![0b1101_0001, 11, 1]),
       (268, vec![], vec![0b1101_0000, 255]),
       (24,
        repeat(1).take(300).collect(),
        [[0b1101_1110, 24 - 13].as_ref(),
         (300u16 - 269).to_be_bytes().as_ref(),
         repeat(1).take(300).collect::<Vec<u8>>().as_ref()].concat())];

    cases.into_iter().for_each(|(number, values, expected)| {
                       let opt = Opt { number: OptNumber(number),
                                       value: OptValue(values) };
                       let mut actual = Vec::<u8>::new();
                       opt.extend_bytes(OptNumber(0), &mut actual);
                       assert_eqb_iter!(actual, expected)
                     });
  }

  #[test]
  fn delta_269_uses_two_bytes() {
    let opt = Opt { number: OptNumber(269),
                    value: OptValue(vec![]) };
    let mut actual = Vec::<u8>::new();
    opt.extend_bytes(OptNumber(0), &mut actual);
    assert_eqb_iter!(actual, vec![0b1110_0000u8, 0, 0]);
  }

  #[test]
  fn no_payload_marker() {
    let mut msg = Packet::new(Type::Con, Code::CONTENT);
    msg.token = Some(Token(1));

    let bytes = msg.try_into_bytes().unwrap();
    assert_eq!(bytes.len(), 8);
    assert_ne!(bytes.last(), Some(&0b11111111));
  }

  #[test]
  fn too_many_options() {
    let mut msg = Packet::new(Type::Con, Code::GET);
    msg.opts = repeat(Opt { number: opt::known::QUERY,
                            value: OptValue(vec![1]) }).take(MAX_OPTIONS + 1)
                                                       .collect();
    assert_eq!(msg.try_into_bytes(),
               Err(MessageToBytesError::TooManyOptions(MAX_OPTIONS + 1)));
  }

  #[test]
  fn unsorted_options() {
    let mut msg = Packet::new(Type::Con, Code::GET);
    msg.opts = vec![Opt { number: opt::known::ACCEPT,
                          value: OptValue(vec![]) },
                    Opt { number: opt::known::PATH,
                          value: OptValue(b"a".to_vec()) }];
    assert_eq!(msg.try_into_bytes(),
               Err(MessageToBytesError::OptionsUnsorted { prev: opt::known::ACCEPT,
                                                          next: opt::known::PATH }));
  }

  #[test]
  fn too_long() {
    let mut msg = Packet::new(Type::Con, Code::PUT);
    msg.payload = Payload(vec![0; MAX_DATAGRAM - 4]);
    assert_eq!(msg.try_into_bytes(),
               Err(MessageToBytesError::TooLong { capacity: MAX_DATAGRAM,
                                                  size: MAX_DATAGRAM + 1 }));

    msg.payload = Payload(vec![0; MAX_DATAGRAM - 5]);
    assert_eq!(msg.try_into_bytes().map(|b| b.len()), Ok(MAX_DATAGRAM));
  }

  #[test]
  fn agrees_with_coap_lite() {
    let (msg, _) = test_msg();
    let mut msg = msg;
    msg.opts.insert(0,
                    Opt { number: opt::known::PATH,
                          value: OptValue(b"sensors".to_vec()) });
    let bytes = msg.try_into_bytes().unwrap();

    let other = coap_lite::Packet::from_bytes(&bytes).unwrap();
    assert_eq!(other.header.message_id, 1);
    assert_eq!(other.get_token().to_vec(), vec![0xCA, 0xFE, 0x00, 0x01]);
    assert_eq!(other.payload, b"hello, world!".to_vec());

    let path = other.get_option(coap_lite::CoapOption::UriPath)
                    .map(|vs| vs.iter().cloned().collect::<Vec<_>>());
    assert_eq!(path, Some(vec![b"sensors".to_vec()]));
  }
}
