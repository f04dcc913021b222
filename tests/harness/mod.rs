//! Test harness: a threaded, blocking WebSocket server that speaks just
//! enough RFC 6455 to exercise the client end to end.

#![allow(dead_code)]

mod server;

pub use server::{Behavior, Received, TestServer};
