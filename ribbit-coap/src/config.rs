use std::time::Duration;

use serde::Deserialize;

use crate::retry::{Attempts, Strategy};

/// Configuration options related to outbound CON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Con {
  /// Retry strategy for CON requests that
  /// have not yet been ACKed.
  ///
  /// Defaults to an exponential retry strategy with an initial
  /// delay between `ACK_TIMEOUT` (2s) and `ACK_TIMEOUT * ACK_RANDOM_FACTOR` (3s):
  /// ```
  /// use std::time::Duration;
  ///
  /// use ribbit_coap::config::Con;
  /// use ribbit_coap::retry::Strategy;
  ///
  /// assert_eq!(Con::default().retry_strategy,
  ///            Strategy::Exponential { init_min: Duration::from_millis(2_000),
  ///                                    init_max: Duration::from_millis(3_000) });
  /// ```
  pub retry_strategy: Strategy,
  /// Number of times we are allowed to send a CON request
  /// (the first transmission included) before erroring.
  ///
  /// Defaults to 5 attempts (`MAX_RETRANSMIT` = 4).
  /// ```
  /// use ribbit_coap::config::Con;
  /// use ribbit_coap::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(5));
  /// ```
  pub max_attempts: Attempts,
}

impl Con {
  /// Build the CON settings from the RFC 7252 transmission parameters
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use ribbit_coap::config::Con;
  ///
  /// let con = Con::from_ack_params(Duration::from_millis(2000), 1.5, 4);
  /// assert_eq!(con, Con::default());
  /// ```
  pub fn from_ack_params(ack_timeout: Duration, ack_random_factor: f32, max_retransmit: u16) -> Self {
    let init_max = ack_timeout.mul_f32(ack_random_factor.max(1.0));
    Con { retry_strategy: Strategy::Exponential { init_min: ack_timeout,
                                                  init_max },
          max_attempts: Attempts(max_retransmit.saturating_add(1)) }
  }
}

impl Default for Con {
  fn default() -> Self {
    Con::from_ack_params(Duration::from_millis(2_000), 1.5, 4)
  }
}

/// Configuration options related to messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Msg {
  /// See [`Con`]
  pub con: Con,
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Config {
  /// See [`Msg`]
  pub msg: Msg,
  /// Time between keepalive pings while connected.
  ///
  /// Defaults to 60 seconds.
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use ribbit_coap::config::Config;
  ///
  /// assert_eq!(Config::default().keepalive_interval, Duration::from_secs(60));
  /// ```
  pub keepalive_interval: Duration,
  /// Time to wait after a failed connection attempt
  /// before trying again.
  ///
  /// Defaults to 10 seconds.
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use ribbit_coap::config::Config;
  ///
  /// assert_eq!(Config::default().reconnect_delay, Duration::from_secs(10));
  /// ```
  pub reconnect_delay: Duration,
  /// Largest datagram we expect to receive
  ///
  /// Defaults to 1500 bytes.
  pub max_datagram: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config { msg: Msg::default(),
             keepalive_interval: Duration::from_secs(60),
             reconnect_delay: Duration::from_secs(10),
             max_datagram: ribbit_coap_msg::MAX_DATAGRAM }
  }
}

impl Config {
  /// Longest a CON request may wait for an ACK before the
  /// client gives up and reconnects
  pub fn max_transmit_wait(&self) -> Duration {
    self.msg
        .con
        .retry_strategy
        .max_time(self.msg.con.max_attempts)
  }
}

/// Pre-shared key credentials for DTLS
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Psk {
  /// PSK identity, sent to the server in the clear
  pub identity: String,
  /// The key itself
  pub key: String,
}

impl core::fmt::Debug for Psk {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Psk")
     .field("identity", &self.identity)
     .field("key", &"<redacted>")
     .finish()
  }
}

/// Where & how to reach the CoAP server, as stored in the device config
///
/// ```
/// use ribbit_coap::config::Settings;
///
/// let settings: Settings =
///   serde_json::from_str(r#"{"host": "coap.example.io", "psk": {"identity": "dev@proj", "key": "s3cr3t"}}"#).unwrap();
///
/// assert_eq!(settings.port, ribbit_coap::config::default_port());
/// assert!(settings.usable());
/// assert_eq!(settings.psk.unwrap().identity, "dev@proj");
/// ```
///
/// Without credentials the settings are unusable, unless plain UDP
/// was asked for explicitly:
///
/// ```
/// use ribbit_coap::config::Settings;
///
/// let missing_psk: Settings = serde_json::from_str(r#"{"host": "coap.example.io"}"#).unwrap();
/// assert!(!missing_psk.usable());
///
/// let plain: Settings = serde_json::from_str(r#"{"host": "10.0.0.2", "port": 5683, "insecure": true}"#).unwrap();
/// assert!(plain.usable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
  /// Server hostname or IP address
  pub host: String,
  /// Server port
  #[serde(default = "default_port")]
  pub port: u16,
  /// DTLS credentials
  #[serde(default)]
  pub psk: Option<Psk>,
  /// Talk plain UDP when there are no credentials.
  ///
  /// Defaults to `false`; settings missing a `psk` are then considered
  /// incomplete and [`follow`](crate::supervisor::follow) leaves the
  /// client disabled.
  #[serde(default)]
  pub insecure: bool,
}

/// 5684 (`coaps`) when built with DTLS support, 5683 (`coap`) otherwise
pub fn default_port() -> u16 {
  if cfg!(feature = "dtls") {
    5684
  } else {
    5683
  }
}

impl Settings {
  /// Settings for a plain UDP server
  pub fn plain(host: impl ToString, port: u16) -> Self {
    Self { host: host.to_string(),
           port,
           psk: None,
           insecure: true }
  }

  /// Whether there is enough here to connect: credentials, or an
  /// explicit opt-in to plain UDP
  pub fn usable(&self) -> bool {
    self.psk.is_some() || self.insecure
  }
}
