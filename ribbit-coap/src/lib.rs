//! `ribbit_coap` is the CoAP client the ribbit sensor firmware uses to
//! talk to its cloud backend.
//!
//! It keeps a single session with one server alive:
//! - requests are sent as CONfirmable messages and retransmitted with
//!   exponential backoff until ACKed
//! - resources can be observed, with every notification handed to a callback
//! - large resources (firmware images) can be read block by block
//! - the session heals itself; a broken transport, garbled datagram,
//!   unanswered request or missed keepalive all lead to a reconnect
//!
//! The session runs over plain UDP, or over DTLS with a pre-shared key
//! when the `dtls` feature (on by default) is enabled and the
//! [`Settings`](config::Settings) carry credentials.
//!
//! ```no_run
//! use ribbit_coap::config::{Config, Settings};
//! use ribbit_coap::{Client, ContentFormat};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = Client::new(Config::default(), &Settings::plain("coap.me", 5683));
//!
//! client.on_connect(|client: Client| async move {
//!         client.observe(".c", ContentFormat::Json, |_: Client, notif: ribbit_coap::Packet| async move {
//!                 println!("config changed: {}", String::from_utf8_lossy(&notif.payload.0));
//!               })
//!               .await
//!               .map(|_| ())
//!       });
//!
//! tokio::spawn(client.clone().run());
//! # }
//! ```

// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]


pub(crate) mod logging;

/// customizable retrying of fallible operations
pub mod retry;

/// runtime configuration & server settings
pub mod config;

/// the client, its requests and errors
pub mod core;

/// transport sessions
pub mod net;

/// observing resources & reacting to (re)connects
pub mod observe;

/// block-wise reads of large resources
pub mod block;

pub mod supervisor;

#[doc(inline)]
pub use block::{BlockReader, ReadBlocks};
#[doc(inline)]
pub use crate::core::{Client, Error, Violation, What, When};
#[doc(inline)]
pub use observe::{Observe, OnConnect};
pub use ribbit_coap_msg;
#[doc(inline)]
pub use ribbit_coap_msg::{Code, ContentFormat, Packet, Token};
#[doc(inline)]
pub use supervisor::follow;
