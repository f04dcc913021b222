//! Non-blocking byte transports underneath a connection.
//!
//! A [`ByteChannel`] never blocks in `read`, `write` or `flush`: when the
//! socket cannot make progress it reports which readiness it is waiting for,
//! and the caller decides how long to wait through
//! [`ByteChannel::wait_readable`] / [`ByteChannel::wait_writable`]. Methods
//! take `&self` so one channel can be shared between the caller and the
//! background poller.

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

mod plain;
#[cfg(feature = "tls-rustls")]
mod tls;

pub use plain::PlainChannel;
#[cfg(feature = "tls-rustls")]
pub use tls::{NoVerification, TlsChannel, build_client_config, load_certs_from_file};

/// Pause bounds between readiness checks.
const MIN_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(10);

/// Readiness a blocked operation is waiting for.
///
/// TLS can report a blocked write as `Read` (and the reverse) while a
/// record exchange is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Outcome of a non-blocking channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Progress was made. For `read`, `Ready(0)` is end of stream.
    Ready(usize),
    /// No progress until the given readiness.
    Blocked(Interest),
}

/// A non-blocking, internally synchronized byte stream.
pub trait ByteChannel: Send + Sync + fmt::Debug {
    /// Read available bytes into `buf`.
    fn read(&self, buf: &mut [u8]) -> io::Result<Transfer>;

    /// Write a prefix of `buf`.
    fn write(&self, buf: &[u8]) -> io::Result<Transfer>;

    /// Push out anything the channel holds internally. `Ready(0)` when done.
    fn flush(&self) -> io::Result<Transfer>;

    /// True when decrypted bytes are staged in the channel, so a read will
    /// succeed without the socket becoming readable again.
    fn has_buffered_bytes(&self) -> bool;

    /// Wait up to `timeout` for readable data. `Ok(false)` on timeout.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    /// Wait up to `timeout` for send buffer space.
    fn wait_writable(&self, timeout: Duration) -> io::Result<bool>;

    /// Shut the transport down in both directions. Wakes pending waits.
    fn shutdown(&self);
}

/// Map the "try again" error kinds onto `Blocked`.
pub(crate) fn blocked_or(err: io::Error, interest: Interest) -> io::Result<Transfer> {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(Transfer::Blocked(interest)),
        _ => Err(err),
    }
}

/// Poll with a non-blocking one-byte peek until data shows up or `timeout`
/// passes, backing off between attempts.
///
/// The socket stays in non-blocking mode throughout. End of stream and socket
/// errors count as readable so the next read observes them.
pub(crate) fn wait_for_read(stream: &TcpStream, timeout: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut backoff = MIN_BACKOFF;
    let mut byte = [0u8; 1];

    loop {
        match stream.peek(&mut byte) {
            Ok(_) => return Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(_) => return Ok(true),
        }

        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Ok(false);
        }
        thread::sleep(backoff.min(left));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Writability has no std readiness check; back off for `timeout` and let the caller retry.
pub(crate) fn wait_for_write(timeout: Duration) -> bool {
    thread::sleep(timeout);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;

    #[test]
    fn test_blocked_or_maps_retry_kinds() {
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(
            blocked_or(would_block, Interest::Read).unwrap(),
            Transfer::Blocked(Interest::Read)
        );
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        assert_eq!(
            blocked_or(interrupted, Interest::Write).unwrap(),
            Transfer::Blocked(Interest::Write)
        );
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(blocked_or(reset, Interest::Read).is_err());
    }

    #[test]
    fn test_wait_for_read_times_out_then_sees_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();

        let start = Instant::now();
        assert!(!wait_for_read(&client, Duration::from_millis(20)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(15));

        server.write_all(b"x").unwrap();
        assert!(wait_for_read(&client, Duration::from_secs(2)).unwrap());

        // still non-blocking afterwards
        let mut buf = [0u8; 8];
        let mut reader = &client;
        assert_eq!(io::Read::read(&mut reader, &mut buf).unwrap(), 1);
        let err = io::Read::read(&mut reader, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_wait_for_read_reports_eof_as_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);
        assert!(wait_for_read(&client, Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn test_wait_for_read_leaves_writers_nonblocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (_server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();
        let client = Arc::new(client);

        let waiter = {
            let client = Arc::clone(&client);
            std::thread::spawn(move || wait_for_read(&client, Duration::from_millis(300)))
        };
        std::thread::sleep(Duration::from_millis(20));

        // the peer never reads, so filling the send buffer must end in WouldBlock
        let chunk = [0u8; 64 * 1024];
        let mut writer = &*client;
        let kind = loop {
            match writer.write(&chunk) {
                Ok(_) => {}
                Err(e) => break e.kind(),
            }
        };
        assert_eq!(kind, io::ErrorKind::WouldBlock);
        assert!(!waiter.join().unwrap().unwrap());
    }
}
