/// Version of the CoAP protocol that the message adheres to.
///
/// Only version 1 exists; packets carrying anything else are rejected while parsing.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}
