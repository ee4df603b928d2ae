//! Low-level representation of CoAP packets.
//!
//! The most notable item in `ribbit_coap_msg` is [`Packet`];
//! a CoAP message very close to the actual byte layout,
//! restricted to the subset of RFC 7252 spoken by the ribbit firmware:
//!  - tokens are either absent or exactly 4 bytes
//!  - at most [`MAX_OPTIONS`] options per packet
//!  - frames never exceed [`MAX_DATAGRAM`] bytes
//!
//! ```
//! use ribbit_coap_msg::*;
//!
//! let mut req = Packet::new(Type::Con, Code::GET);
//! req.id = Id(1);
//! req.token = Some(Token(0xBEEF_0001));
//! req.set_path(".well-known/core").unwrap();
//! req.set_accept(ContentFormat::LinkFormat).unwrap();
//!
//! let bytes = req.try_into_bytes().unwrap();
//! assert_eq!(Packet::try_from_bytes(&bytes).unwrap(), req);
//! ```

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code))]
#![deny(missing_docs)]

/// A cursor over a byte buffer
pub mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::{MessageToBytesError, TryIntoBytes};

/// Maximum size (in bytes) of an encoded packet
pub const MAX_DATAGRAM: usize = 1500;

/// Maximum number of options a packet may carry
pub const MAX_OPTIONS: usize = 10;

#[cfg(test)]
pub(crate) fn test_msg() -> (Packet, Vec<u8>) {
  //                         version  token len  code (2.05 Content)
  //                         |        |          /
  //                         |  type  |         /  message ID
  //                         |  |     |        |   |
  //                         vv vv vvvv vvvvvvvv vvvvvvvvvvvvvvvv
  let header: [u8; 4] = 0b_01_00_0100_01000101_0000000000000001u32.to_be_bytes();
  let token: [u8; 4] = 0xCAFE_0001u32.to_be_bytes();
  let options: [&[u8]; 2] = [&[0b_1100_0001u8], &[50]];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Packet { id: Id(1),
                     ty: Type::Con,
                     ver: Version(1),
                     token: Some(Token(0xCAFE_0001)),
                     code: Code { class: 2,
                                  detail: 5 },
                     opts: vec![Opt { number: opt::known::CONTENT_FORMAT,
                                      value: OptValue(vec![50]) }],
                     payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}

#[cfg(test)]
#[allow(missing_docs)]
pub(crate) mod tests {
  #[macro_export]
  macro_rules! assert_eqb {
    ($actual:expr, $expected:expr) => {
      if $actual != $expected {
        panic!("expected {:08b} to equal {:08b}", $actual, $expected)
      }
    };
  }

  #[macro_export]
  macro_rules! assert_eqb_iter {
    ($actual:expr, $expected:expr) => {
      if $actual.iter().ne($expected.iter()) {
        panic!("expected {:?} to equal {:?}",
               $actual.into_iter()
                      .map(|b| format!("{:08b}", b))
                      .collect::<Vec<_>>(),
               $expected.into_iter()
                        .map(|b| format!("{:08b}", b))
                        .collect::<Vec<_>>())
      }
    };
  }
}
