use tinyvec::ArrayVec;

use crate::cursor::Cursor;
use crate::from_bytes::*;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Option Numbers & typed option values
pub mod known;

/// Largest delta or value length the extended nibble encoding can represent
pub const MAX_OPT_EXTENDED: u32 = 65535 + 269;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u32, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok(u32::from(n) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u32::from(u16::from_be_bytes([a, b])) + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(u32::from(head)),
  }
}

/// Encode an unsigned integer option value using the
/// fewest big-endian bytes possible (`0` is encoded as no bytes at all)
///
/// ```
/// use ribbit_coap_msg::opt::encode_uint;
///
/// assert_eq!(encode_uint(0).as_slice(), &[]);
/// assert_eq!(encode_uint(60).as_slice(), &[60]);
/// assert_eq!(encode_uint(0x0102).as_slice(), &[1, 2]);
/// ```
pub fn encode_uint(n: u64) -> ArrayVec<[u8; 8]> {
  let bytes = n.to_be_bytes();
  let skip = bytes.iter().take_while(|b| **b == 0).count();

  let mut out = ArrayVec::new();
  out.extend(bytes[skip..].iter().copied());
  out
}

/// Decode an unsigned integer option value
///
/// Values longer than 8 bytes only keep their least significant 8 bytes.
pub fn decode_uint(bytes: &[u8]) -> u64 {
  bytes.iter().fold(0u64, |n, b| n << 8 | u64::from(*b))
}

/// # `Opt` struct
/// A CoAP option along with its absolute Option Number.
///
/// On the wire options only carry the difference ("delta")
/// between their number and the number of the option before them;
/// [`Packet`](crate::Packet) keeps options sorted by number and
/// computes deltas while serializing.
#[derive(Clone, PartialEq, Eq, PartialOrd, Debug, Default)]
pub struct Opt {
  /// See [`OptNumber`]
  pub number: OptNumber,
  /// See [`OptValue`]
  pub value: OptValue,
}

fn extended_size(n: u32) -> usize {
  match n {
    | n if n >= 269 => 2,
    | n if n >= 13 => 1,
    | _ => 0,
  }
}

impl Opt {
  /// Number of bytes this option occupies on the wire when it follows an option numbered `prev`
  pub fn get_size(&self, prev: OptNumber) -> usize {
    let delta = self.number.0.saturating_sub(prev.0);
    1 + extended_size(delta) + extended_size(self.value.0.len() as u32) + self.value.0.len()
  }

  /// Given a collection to [`Extend`] and an Opt following the option numbered `prev`, add that Opt's bytes to the collection.
  ///
  /// The caller is responsible for making sure `prev` is not greater than
  /// this option's number and that the delta and length are encodable.
  pub fn extend_bytes(&self, prev: OptNumber, bytes: &mut impl Extend<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.number.0 - prev.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.0.len() as u32);
    let del = del << 4;

    let header = del | len;

    bytes.extend(Some(header));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
  }
}

/// Option Number, identifying which option is being set
/// (e.g. Content-Format has a Number of 12).
///
/// Well-known numbers are in [`known`].
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

/// Opaque option value
#[derive(Default, Clone, Hash, PartialEq, Eq, PartialOrd, Debug)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Create an option value holding an unsigned integer
  pub fn uint(n: u64) -> Self {
    Self(encode_uint(n).to_vec())
  }

  /// Interpret this value as an unsigned integer
  pub fn as_uint(&self) -> u64 {
    decode_uint(&self.0)
  }

  /// Interpret this value as a UTF-8 string
  pub fn as_str(&self) -> Option<&str> {
    core::str::from_utf8(&self.0).ok()
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Vec<Opt> {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Vec::new();
    let mut number = 0u32;

    loop {
      match consume_opt(bytes, OptNumber(number)) {
        | Ok(opt) => {
          number = opt.number.0;
          opts.push(opt);
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

fn consume_opt<Bytes: AsRef<[u8]>>(bytes: &mut Cursor<Bytes>,
                                   prev: OptNumber)
                                   -> Result<Opt, OptParseError> {
  let byte1 = bytes.next()
                   .ok_or(OptParseError::OptionsExhausted)
                   .and_then(|b| {
                     if b == 0b11111111 {
                       Err(OptParseError::OptionsExhausted)
                     } else {
                       Ok(b)
                     }
                   })?;

  // Delta's extended bytes always precede the length's extended bytes
  let delta = parse_opt_len_or_delta(byte1 >> 4,
                                     bytes,
                                     OptParseError::OptionDeltaReservedValue(15))?;

  let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                   bytes,
                                   OptParseError::ValueLengthReservedValue(15))?
            as usize;

  let value = bytes.take_exact(len)
                   .ok_or(OptParseError::UnexpectedEndOfStream)?
                   .to_vec();

  Ok(Opt { number: OptNumber(prev.0 + delta),
           value: OptValue(value) })
}
