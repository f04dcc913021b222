//! Client side of the WebSocket opening handshake (RFC 6455 Section 4).
//!
//! [`ClientHandshake`] renders the upgrade request and then consumes the
//! server response incrementally, in whatever chunks the channel delivers.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use url::Url;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this client speaks.
pub const WS_VERSION: u8 = 13;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse header lines into a map keyed by lowercase name.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }
    headers
}

/// Reject header names and values that would break the request framing.
fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || name.contains([':', '\r', '\n', ' ']) {
        return Err(Error::InvalidHeaderValue {
            header: name.to_string(),
            reason: "invalid header name".to_string(),
        });
    }
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsclient::protocol::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Fresh Sec-WebSocket-Key: 16 random bytes, base64 encoded.
///
/// # Errors
///
/// Returns `Error::Io` if the OS RNG is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::Io(format!("failed to generate handshake key: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// WebSocket handshake response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
    /// The negotiated Sec-WebSocket-Extensions (optional).
    pub extensions: Vec<String>,
}

impl HandshakeResponse {
    /// Parse a WebSocket handshake response from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The response is empty or the status line is missing.
    /// - The status code is not `101 Switching Protocols`.
    /// - Any required headers are missing: `Upgrade`, `Connection`, `Sec-WebSocket-Accept`.
    /// - The `Upgrade` header is not `websocket`.
    /// - The `Connection` header does not contain `upgrade`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        let mut status = status_line.split_whitespace();
        match (status.next(), status.next()) {
            (Some(version), Some("101")) if version.starts_with("HTTP/1.") => {}
            _ => {
                return Err(Error::InvalidHandshake(format!(
                    "Expected 101 status, got: {status_line}"
                )));
            }
        }

        let headers = parse_headers(lines);

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = headers.get("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !connection.to_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .clone();

        let protocol = headers.get("sec-websocket-protocol").cloned();

        let extensions = headers
            .get("sec-websocket-extensions")
            .map(|e| e.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            accept,
            protocol,
            extensions,
        })
    }
}

/// Client handshake state machine: *awaiting response* until the response
/// headers are complete and validated, then *finished*.
#[derive(Debug)]
pub struct ClientHandshake {
    key: String,
    request: Vec<u8>,
    buffer: Vec<u8>,
    max_size: usize,
    // subprotocols offered through a Sec-WebSocket-Protocol request header
    protocols: Vec<String>,
    response: Option<HandshakeResponse>,
    leftover: Vec<u8>,
}

impl ClientHandshake {
    /// Prepare a handshake for `url` with extra request headers.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` if the URL has no host
    /// - `Error::InvalidHeaderValue` if a header would break request framing
    pub fn new(url: &Url, headers: &[(String, String)], max_size: usize) -> Result<Self> {
        Self::with_key(url, headers, max_size, generate_key()?)
    }

    /// Same as [`ClientHandshake::new`] with a caller-chosen key.
    ///
    /// # Errors
    ///
    /// See [`ClientHandshake::new`].
    pub fn with_key(
        url: &Url,
        headers: &[(String, String)],
        max_size: usize,
        key: String,
    ) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::Configuration(format!("URL has no host: {url}")))?;

        let mut target = url.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut request = Vec::with_capacity(256);
        request.extend_from_slice(format!("GET {target} HTTP/1.1\r\n").as_bytes());
        match url.port() {
            Some(port) => request.extend_from_slice(format!("Host: {host}:{port}\r\n").as_bytes()),
            None => request.extend_from_slice(format!("Host: {host}\r\n").as_bytes()),
        }
        request.extend_from_slice(b"Upgrade: websocket\r\n");
        request.extend_from_slice(b"Connection: Upgrade\r\n");
        request.extend_from_slice(format!("Sec-WebSocket-Key: {key}\r\n").as_bytes());
        request.extend_from_slice(format!("Sec-WebSocket-Version: {WS_VERSION}\r\n").as_bytes());
        let mut protocols = Vec::new();
        for (name, value) in headers {
            validate_header(name, value)?;
            request.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
            if name.eq_ignore_ascii_case("sec-websocket-protocol") {
                protocols.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from),
                );
            }
        }
        request.extend_from_slice(b"\r\n");

        Ok(Self {
            key,
            request,
            buffer: Vec::new(),
            max_size,
            protocols,
            response: None,
            leftover: Vec::new(),
        })
    }

    /// The rendered upgrade request.
    #[must_use]
    pub fn request_bytes(&self) -> &[u8] {
        &self.request
    }

    /// The Sec-WebSocket-Key sent with the request.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Feed response bytes. Once the header block is complete the response is
    /// validated and any trailing bytes are kept as leftover frame data.
    ///
    /// Bytes fed after the handshake finished go straight to the leftover.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if the header block exceeds the limit
    /// - `Error::InvalidHandshake` if the response is not a valid upgrade
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if self.is_finished() {
            self.leftover.extend_from_slice(data);
            return Ok(());
        }

        // resume the terminator search a few bytes back in case it straddles chunks
        let search_from = self.buffer.len().saturating_sub(HEADER_END.len() - 1);
        self.buffer.extend_from_slice(data);

        let Some(pos) = self.buffer[search_from..]
            .windows(HEADER_END.len())
            .position(|w| w == HEADER_END)
        else {
            if self.buffer.len() > self.max_size {
                return Err(Error::HandshakeTooLarge {
                    size: self.buffer.len(),
                    max: self.max_size,
                });
            }
            return Ok(());
        };

        let end = search_from + pos + HEADER_END.len();
        if end > self.max_size {
            return Err(Error::HandshakeTooLarge {
                size: end,
                max: self.max_size,
            });
        }

        let response = HandshakeResponse::parse(&self.buffer[..end])?;
        let expected = compute_accept_key(&self.key);
        if response.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected}, got {}",
                response.accept
            )));
        }
        // no extensions are ever requested
        if response.extensions.iter().any(|e| !e.is_empty()) {
            return Err(Error::InvalidHandshake(format!(
                "server selected unrequested extensions: {}",
                response.extensions.join(", ")
            )));
        }
        if let Some(protocol) = &response.protocol {
            if !self.protocols.iter().any(|offered| offered == protocol) {
                return Err(Error::InvalidHandshake(format!(
                    "server selected unrequested subprotocol: {protocol}"
                )));
            }
        }

        self.leftover = self.buffer.split_off(end);
        self.buffer = Vec::new();
        self.response = Some(response);
        Ok(())
    }

    /// True once a valid response has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.response.is_some()
    }

    /// Negotiated protocol version.
    #[must_use]
    pub fn version(&self) -> u8 {
        WS_VERSION
    }

    /// The validated server response, once finished.
    #[must_use]
    pub fn response(&self) -> Option<&HandshakeResponse> {
        self.response.as_ref()
    }

    /// Bytes received after the response headers.
    pub fn take_leftover(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.leftover)
    }
}
