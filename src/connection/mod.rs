//! The connection engine: lifecycle, handshake driver, write and read pumps,
//! and both delivery modes.

mod client;
mod mode;
mod outbox;
mod poller;
mod queue;
mod state;

pub use client::Client;
pub use mode::DeliveryMode;
pub use queue::MessageQueue;
pub use state::ConnectionState;
