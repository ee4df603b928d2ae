use core::fmt;

/// # Message Code
/// The code of a message is split into a 3-bit `class` and a
/// 5-bit `detail`, written in the human form `c.dd`.
///
/// Requests carry a method code (class `0`), responses a status
/// code (classes `2`, `4` and `5`), and empty messages (pings, ACKs)
/// carry [`Code::EMPTY`].
///
/// ```
/// use ribbit_coap_msg::Code;
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05".to_string())
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for requests.
  pub detail: u8,
}

macro_rules! code {
  ($name:ident = ($c:literal, $d:literal), $doc:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: Code = Code::new($c, $d);
  };
}

impl Code {
  /// Create a new Code
  ///
  /// ```
  /// use ribbit_coap_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// assert_eq!(content, Code::CONTENT);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  code!(EMPTY = (0, 00), "`0.00` Empty message");
  code!(GET = (0, 01), "`0.01` GET");
  code!(POST = (0, 02), "`0.02` POST");
  code!(PUT = (0, 03), "`0.03` PUT");
  code!(DELETE = (0, 04), "`0.04` DELETE");

  code!(CREATED = (2, 01), "`2.01` Created");
  code!(DELETED = (2, 02), "`2.02` Deleted");
  code!(VALID = (2, 03), "`2.03` Valid");
  code!(CHANGED = (2, 04), "`2.04` Changed");
  code!(CONTENT = (2, 05), "`2.05` Content");
  code!(CONTINUE = (2, 31), "`2.31` Continue (block-wise transfer)");

  code!(BAD_REQUEST = (4, 00), "`4.00` Bad Request");
  code!(UNAUTHORIZED = (4, 01), "`4.01` Unauthorized");
  code!(BAD_OPTION = (4, 02), "`4.02` Bad Option");
  code!(FORBIDDEN = (4, 03), "`4.03` Forbidden");
  code!(NOT_FOUND = (4, 04), "`4.04` Not Found");
  code!(METHOD_NOT_ALLOWED = (4, 05), "`4.05` Method Not Allowed");
  code!(NOT_ACCEPTABLE = (4, 06), "`4.06` Not Acceptable");
  code!(REQUEST_ENTITY_INCOMPLETE = (4, 08), "`4.08` Request Entity Incomplete");
  code!(PRECONDITION_FAILED = (4, 12), "`4.12` Precondition Failed");
  code!(REQUEST_ENTITY_TOO_LARGE = (4, 13), "`4.13` Request Entity Too Large");
  code!(UNSUPPORTED_CONTENT_FORMAT = (4, 15), "`4.15` Unsupported Content-Format");

  code!(INTERNAL_SERVER_ERROR = (5, 00), "`5.00` Internal Server Error");
  code!(NOT_IMPLEMENTED = (5, 01), "`5.01` Not Implemented");
  code!(BAD_GATEWAY = (5, 02), "`5.02` Bad Gateway");
  code!(SERVICE_UNAVAILABLE = (5, 03), "`5.03` Service Unavailable");
  code!(GATEWAY_TIMEOUT = (5, 04), "`5.04` Gateway Timeout");
  code!(PROXYING_NOT_SUPPORTED = (5, 05), "`5.05` Proxying Not Supported");

  /// Whether this is a request method code (class `0`, non-empty)
  pub fn is_request(&self) -> bool {
    self.class == 0 && self.detail != 0
  }

  /// Whether this is a `2.xx` response code
  pub fn is_success(&self) -> bool {
    self.class == 2
  }
}

impl fmt::Display for Code {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    let class = b >> 5;
    let detail = b & 0b0011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_eqb;

  #[test]
  fn parse_code() {
    let byte = 0b_01_000101u8;
    let code = Code::from(byte);
    assert_eq!(code, Code { class: 2, detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 2, detail: 5 };
    let actual: u8 = code.into();
    let expected = 0b_010_00101u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn display() {
    assert_eq!(Code::EMPTY.to_string(), "0.00");
    assert_eq!(Code::GET.to_string(), "0.01");
    assert_eq!(Code::NOT_FOUND.to_string(), "4.04");
    assert_eq!(Code::CONTINUE.to_string(), "2.31");
  }

  #[test]
  fn classify() {
    assert!(Code::PUT.is_request());
    assert!(!Code::EMPTY.is_request());
    assert!(Code::CHANGED.is_success());
    assert!(!Code::BAD_REQUEST.is_success());
  }
}
