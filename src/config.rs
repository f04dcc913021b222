//! Connect-time configuration: limits, timeouts, headers and TLS options.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

/// Bytes read from the channel per non-blocking read.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Configuration limits for inbound data.
///
/// These limits prevent a misbehaving server from exhausting memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes, after reassembling
    /// continuation frames.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the handshake response in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`](crate::Error::ProtocolViolation) if `count` exceeds the configured maximum.
    pub fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::ProtocolViolation(format!(
                "Too many fragments: {} (max: {})",
                count, self.max_fragment_count
            )))
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timing knobs for the handshake driver and the read pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Overall deadline for the upgrade handshake.
    ///
    /// `None` keeps waiting for as long as the server keeps the socket open.
    /// Default: 30 seconds
    pub handshake: Option<Duration>,

    /// Single readiness wait inside the handshake loop.
    ///
    /// Default: 10 seconds
    pub handshake_poll: Duration,

    /// Readiness wait used by each background poller pass.
    ///
    /// Default: 10 seconds
    pub poll: Duration,

    /// Wait used after a complete message to drain frames that are already
    /// buffered.
    ///
    /// Default: 2 milliseconds
    pub follow_up: Duration,

    /// Listen window used by [`Client::send_and_wait_default`](crate::Client::send_and_wait_default).
    ///
    /// Default: 2 milliseconds
    pub response: Duration,

    /// Pause between write attempts while the socket send buffer is full.
    ///
    /// Default: 1 millisecond
    pub write_retry: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Some(Duration::from_secs(30)),
            handshake_poll: Duration::from_secs(10),
            poll: Duration::from_secs(10),
            follow_up: Duration::from_millis(2),
            response: Duration::from_millis(2),
            write_retry: Duration::from_millis(1),
        }
    }
}

impl Timeouts {
    /// Set the overall handshake deadline.
    #[must_use]
    pub const fn with_handshake(mut self, deadline: Option<Duration>) -> Self {
        self.handshake = deadline;
        self
    }

    /// Set the background poller's readiness wait.
    #[must_use]
    pub const fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Set the default listen window for synchronous sends.
    #[must_use]
    pub const fn with_response(mut self, response: Duration) -> Self {
        self.response = response;
        self
    }
}

/// Server certificate verification policy.
///
/// The default is [`VerifyMode::None`]: the server certificate is accepted
/// without any check. This matches the historical behavior of this client and
/// is only appropriate for trusted networks. Use [`VerifyMode::Peer`] for
/// anything that crosses the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerifyMode {
    /// Accept any certificate. Traffic is encrypted but not authenticated.
    #[default]
    None,
    /// Verify the certificate chain and host name against the trust store.
    Peer,
}

/// TLS protocol version pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsVersion {
    /// TLS 1.2 only.
    Tls12,
    /// TLS 1.3 only.
    Tls13,
}

/// TLS settings applied when the URL scheme is `wss` or `https`.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Certificate verification policy. Default: [`VerifyMode::None`].
    pub verify_mode: VerifyMode,

    /// Restrict the session to one protocol version. Default: both 1.2 and 1.3.
    pub version: Option<TlsVersion>,

    /// PEM bundle added to the webpki root store when verifying peers.
    pub ca_file: Option<PathBuf>,

    /// Fully prepared rustls configuration. When present every other field is
    /// ignored.
    #[cfg(feature = "tls-rustls")]
    pub client_config: Option<Arc<rustls::ClientConfig>>,
}

impl TlsOptions {
    /// Options with peer verification enabled.
    #[must_use]
    pub fn verified() -> Self {
        Self {
            verify_mode: VerifyMode::Peer,
            ..Default::default()
        }
    }

    /// Set the verification policy.
    #[must_use]
    pub fn with_verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    /// Pin the protocol version.
    #[must_use]
    pub fn with_version(mut self, version: TlsVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Trust the certificates in a PEM bundle.
    #[must_use]
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Use a prepared rustls configuration as-is.
    #[cfg(feature = "tls-rustls")]
    #[must_use]
    pub fn with_client_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.client_config = Some(config);
        self
    }
}

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Timing knobs.
    pub timeouts: Timeouts,

    /// Extra headers sent with the upgrade request, in order.
    pub headers: Vec<(String, String)>,

    /// TLS settings for secure schemes.
    pub tls: TlsOptions,

    /// Bytes requested per non-blocking read.
    ///
    /// Default: 2048
    pub chunk_size: usize,

    /// Upper bound on the TCP connect. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            timeouts: Timeouts::default(),
            headers: Vec::new(),
            tls: TlsOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timing knobs.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Add one handshake header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add several handshake headers.
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set TLS options.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Set the read chunk size. Zero is bumped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Bound the TCP connect.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}
