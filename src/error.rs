//! Error types for the WebSocket client engine.
//!
//! Every failure the engine can report, from connect-time configuration
//! problems down to frame-level protocol violations. Errors are `Clone` so the
//! background poller can hand them to `error` listeners.

use thiserror::Error;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while connecting, sending, or receiving.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The client was asked to connect without a usable URL or configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// TCP or TLS connection could not be established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// TLS session failure after the connection was established.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The peer closed its side of the connection; the write could not complete.
    #[error("Broken pipe: peer closed the connection")]
    PipeBroken,

    /// The connection is closed (or was never opened).
    #[error("Connection closed")]
    ConnectionClosed,

    /// The upgrade handshake did not finish before the configured deadline.
    #[error("Handshake timed out after {0} ms")]
    HandshakeTimeout(u128),

    /// A synchronous call was made on a connection already driven by the
    /// background poller, or the other way around.
    #[error("Delivery mode conflict: connection is in {active} mode, {requested} call rejected")]
    DeliveryModeConflict {
        /// Mode the connection is locked to.
        active: &'static str,
        /// Mode of the rejected call.
        requested: &'static str,
    },

    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Payload length does not fit in this platform's address space.
    #[error("Payload too large for platform: {size} bytes (max: {max})")]
    PayloadTooLargeForPlatform {
        /// Declared payload length.
        size: u64,
        /// Largest length this platform can address.
        max: u64,
    },

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake response exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Header value would break the request framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Offending header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Protocol version the encoder does not know how to frame.
    #[error("Unsupported WebSocket version: {0}")]
    UnsupportedVersion(u8),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` for malformed handshake or frame-stream errors.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::InvalidFrame(_)
                | Error::ProtocolViolation(_)
                | Error::InvalidUtf8
                | Error::FrameTooLarge { .. }
                | Error::MessageTooLarge { .. }
                | Error::PayloadTooLargeForPlatform { .. }
                | Error::InvalidHandshake(_)
                | Error::HandshakeTooLarge { .. }
                | Error::ReservedOpcode(_)
                | Error::InvalidOpcode(_)
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::MaskedServerFrame
                | Error::ReservedBitsSet
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Configuration(format!("invalid URL: {err}"))
    }
}

#[cfg(feature = "tls-rustls")]
impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(err.to_string())
    }
}
