//! Outgoing byte backlog shared by every writer of one connection.

use bytes::{Buf, BytesMut};

/// Encoded frames the channel has not accepted yet.
///
/// Frames are appended whole and leave in order, so writers on different
/// threads never interleave partial frames. Positions are running byte counts
/// since the connection was opened.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    pending: BytesMut,
    queued: u64,
    written: u64,
    close_queued: bool,
}

impl Outbox {
    /// Append one frame. Returns the position at which it has been fully
    /// written, or `None` if a close frame was queued earlier.
    pub(crate) fn push(&mut self, bytes: &[u8], is_close: bool) -> Option<u64> {
        if self.close_queued {
            return None;
        }
        self.close_queued = is_close;
        self.pending.extend_from_slice(bytes);
        self.queued += bytes.len() as u64;
        Some(self.queued)
    }

    pub(crate) fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Mark `n` bytes from the front as accepted by the channel.
    pub(crate) fn advance(&mut self, n: usize) {
        self.pending.advance(n);
        self.written += n as u64;
    }

    pub(crate) fn reached(&self, position: u64) -> bool {
        self.written >= position
    }

    /// Forget unsent bytes for a fresh connection. Positions handed out
    /// earlier count as reached.
    pub(crate) fn reset(&mut self) {
        self.pending.clear();
        self.written = self.queued;
        self.close_queued = false;
    }
}
