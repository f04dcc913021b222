//! Delivery mode lock: a connection is driven either by the caller
//! (synchronous) or by the background poller (asynchronous), never both.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};

/// How inbound messages reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Nothing has been sent or received yet.
    Unset,
    /// `send_and_wait` / `receive` on the caller's thread.
    Sync,
    /// `send` plus `message` events from the poller thread.
    Async,
}

impl DeliveryMode {
    const fn as_u8(self) -> u8 {
        match self {
            DeliveryMode::Unset => 0,
            DeliveryMode::Sync => 1,
            DeliveryMode::Async => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => DeliveryMode::Sync,
            2 => DeliveryMode::Async,
            _ => DeliveryMode::Unset,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DeliveryMode::Unset => "unset",
            DeliveryMode::Sync => "sync",
            DeliveryMode::Async => "async",
        }
    }
}

/// Atomic cell holding the mode; set once by the first call that needs it.
#[derive(Debug)]
pub(crate) struct ModeCell(AtomicU8);

impl ModeCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub(crate) fn get(&self) -> DeliveryMode {
        DeliveryMode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Lock the mode to `requested`, or confirm it is already that mode.
    pub(crate) fn claim(&self, requested: DeliveryMode) -> Result<()> {
        match self.0.compare_exchange(
            DeliveryMode::Unset.as_u8(),
            requested.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) if current == requested.as_u8() => Ok(()),
            Err(current) => Err(Error::DeliveryModeConflict {
                active: DeliveryMode::from_u8(current).name(),
                requested: requested.name(),
            }),
        }
    }
}
