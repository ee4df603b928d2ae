use core::fmt::Write;

use ribbit_coap_msg::opt::known;
use ribbit_coap_msg::Packet;

/// One-line description of a packet, e.g.
/// `CON 0.01 id 3 token beef0003 with 0 byte payload [Uri-Path: core, Accept: 40]`
pub(crate) fn packet_summary(packet: &Packet) -> String {
  let mut buf = String::new();
  write!(buf, "{} {} id {}", packet.ty, packet.code, packet.id.0).ok();

  if let Some(token) = packet.token {
    write!(buf, " token {:08x}", token.0).ok();
  }

  write!(buf, " with {} byte payload", packet.payload.0.len()).ok();

  if !packet.opts.is_empty() {
    let opts = packet.opts
                     .iter()
                     .map(|o| {
                       let name = known::name(o.number).map(String::from)
                                                       .unwrap_or_else(|| o.number.0.to_string());
                       let value = match o.value.as_str() {
                         | Some(s) if o.number == known::PATH || o.number == known::QUERY || o.number == known::HOST => {
                           s.to_string()
                         },
                         | _ => o.value.as_uint().to_string(),
                       };
                       format!("{}: {}", name, value)
                     })
                     .collect::<Vec<_>>();
    write!(buf, " [{}]", opts.join(", ")).ok();
  }

  buf
}

#[cfg(test)]
mod tests {
  use ribbit_coap_msg::{Code, ContentFormat, Id, Token, Type};

  use super::*;

  #[test]
  fn summary() {
    let mut req = Packet::new(Type::Con, Code::GET);
    req.id = Id(3);
    req.token = Some(Token(0xBEEF_0003));
    req.set_path("core").unwrap();
    req.set_accept(ContentFormat::LinkFormat).unwrap();

    assert_eq!(packet_summary(&req),
               "CON 0.01 id 3 token beef0003 with 0 byte payload [Uri-Path: core, Accept: 40]");

    let mut ping = Packet::new(Type::Con, Code::EMPTY);
    ping.id = Id(0);
    assert_eq!(packet_summary(&ping), "CON 0.00 id 0 with 0 byte payload");
  }
}
