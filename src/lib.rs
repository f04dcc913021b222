//! # wsclient - WebSocket client engine over non-blocking TCP/TLS
//!
//! `wsclient` owns a single TCP (optionally rustls) connection, performs the
//! RFC 6455 upgrade handshake, and turns the byte stream into messages and
//! back. One [`Client`] supports two delivery modes:
//!
//! - **sync**: send a message and collect whatever replies arrive within a
//!   time window ([`Client::send_and_wait`], [`Client::receive`]).
//! - **async**: send and get replies as events from a background poller
//!   thread ([`Client::send`], [`Client::on_message`]).
//!
//! Server pings are answered automatically. Teardown is idempotent and runs
//! from explicit [`Client::close`], error paths and `Drop` alike.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use wsclient::{Config, Message};
//!
//! let client = wsclient::connect("ws://127.0.0.1:9001/", Config::default())?;
//! let replies = client.send_and_wait("hello", Duration::from_millis(50))?;
//! assert!(replies.iter().all(|m| !matches!(m, Message::Ping(_))));
//! # Ok::<(), wsclient::Error>(())
//! ```
//!
//! With listeners registered before the handshake:
//!
//! ```no_run
//! use wsclient::Config;
//!
//! let client = wsclient::connect_with("wss://example.com/feed", Config::default(), |client| {
//!     client
//!         .on_open(|| println!("open"))
//!         .on_message(|message| println!("{message:?}"))
//!         .on_close(|| println!("closed"));
//! })?;
//! client.send("subscribe")?;
//! # Ok::<(), wsclient::Error>(())
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod message;
pub mod protocol;

pub use config::{Config, Limits, Timeouts, TlsOptions, TlsVersion, VerifyMode};
pub use connection::{Client, ConnectionState, DeliveryMode};
pub use error::{Error, Result};
pub use events::{Event, EventKind};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{OpCode, compute_accept_key};

/// Create a client and connect it to `url`.
///
/// # Errors
///
/// See [`Client::connect`].
pub fn connect(url: &str, config: Config) -> Result<Client> {
    connect_with(url, config, |_| {})
}

/// Create a client, let `setup` register listeners, then connect.
///
/// # Errors
///
/// See [`Client::connect`].
pub fn connect_with<F>(url: &str, config: Config, setup: F) -> Result<Client>
where
    F: FnOnce(&Client),
{
    let client = Client::new(config);
    setup(&client);
    client.connect(Some(url))?;
    Ok(client)
}
