use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use super::{ByteChannel, Interest, Transfer, blocked_or, wait_for_read, wait_for_write};

/// Unencrypted TCP channel.
#[derive(Debug)]
pub struct PlainChannel {
    stream: TcpStream,
}

impl PlainChannel {
    /// Wrap a connected stream and switch it to non-blocking mode.
    ///
    /// # Errors
    ///
    /// Fails if the socket mode cannot be changed.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }
}

impl ByteChannel for PlainChannel {
    fn read(&self, buf: &mut [u8]) -> io::Result<Transfer> {
        match (&self.stream).read(buf) {
            Ok(n) => Ok(Transfer::Ready(n)),
            Err(e) => blocked_or(e, Interest::Read),
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<Transfer> {
        match (&self.stream).write(buf) {
            Ok(n) => Ok(Transfer::Ready(n)),
            Err(e) => blocked_or(e, Interest::Write),
        }
    }

    fn flush(&self) -> io::Result<Transfer> {
        (&self.stream).flush()?;
        Ok(Transfer::Ready(0))
    }

    fn has_buffered_bytes(&self) -> bool {
        false
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        wait_for_read(&self.stream, timeout)
    }

    fn wait_writable(&self, timeout: Duration) -> io::Result<bool> {
        Ok(wait_for_write(timeout))
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
