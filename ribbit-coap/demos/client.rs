//! Connects to a CoAP server, pings it, dumps its resource directory
//! and prints notifications for an observed resource until Ctrl-C.
//!
//! ```text
//! cargo run --example client -- settings.json sensors/temp
//! ```
//!
//! `settings.json` holds the same object the firmware keeps in its
//! config store:
//!
//! ```json
//! { "host": "coap.golioth.io", "psk": { "identity": "dev@proj", "key": "..." } }
//! ```
//!
//! A server without DTLS needs `"port": 5683, "insecure": true` instead of `psk`.

use std::time::Duration;

use ribbit_coap::config::{Config, Settings};
use ribbit_coap::{Client, ContentFormat, Packet};

#[tokio::main]
async fn main() {
  simple_logger::init_with_level(log::Level::Debug).unwrap();

  let mut args = std::env::args().skip(1);
  let settings = args.next().unwrap_or_else(|| "settings.json".into());
  let observed = args.next().unwrap_or_else(|| ".c".into());

  let settings = std::fs::read_to_string(&settings).unwrap();
  let settings: Settings = serde_json::from_str(&settings).unwrap();
  if !settings.usable() {
    log::error!("settings have no psk; add one or set \"insecure\": true");
    return;
  }

  let client = Client::new(Config::default(), &settings);

  client.on_connect(move |client: Client| {
          let observed = observed.clone();
          async move {
            let first = client.observe(&observed, ContentFormat::Json, print_notification)
                              .await?;
            log::info!("observing {} ({})", observed, first.code);
            Ok(())
          }
        });

  tokio::spawn(client.clone().run());

  while !client.is_connected() {
    tokio::time::sleep(Duration::from_millis(100)).await;
  }

  let pong = client.ping().await.unwrap();
  log::info!("server answered ping with {}", pong.ty);

  let links = client.get(".well-known/core", ContentFormat::LinkFormat)
                    .await
                    .unwrap();
  log::info!("{} {}", links.code, String::from_utf8_lossy(&links.payload.0));

  tokio::signal::ctrl_c().await.unwrap();
  client.shutdown();
}

async fn print_notification(_: Client, packet: Packet) {
  println!("{} {}",
           packet.observe().unwrap_or_default(),
           String::from_utf8_lossy(&packet.payload.0));
}
