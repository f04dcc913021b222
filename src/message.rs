//! Application-level messages and close codes (RFC 6455).

use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001), e.g. server shutdown.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007), e.g. non-UTF-8 text.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code (registered 1012-1014, application 3000-4999, or invalid).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Reserved codes (1004-1006, 1015) MUST NOT appear in a close frame.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason (UTF-8, at most 123 bytes on the wire).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close payload. An empty payload carries no status.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a one-byte payload
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload {
            [] => Ok(None),
            [_] => Err(Error::ProtocolViolation(
                "Close payload must be empty or at least 2 bytes".into(),
            )),
            [hi, lo, reason @ ..] => {
                let reason = std::str::from_utf8(reason)?;
                Ok(Some(Self::new(
                    CloseCode::from_u16(u16::from_be_bytes([*hi, *lo])),
                    reason,
                )))
            }
        }
    }
}

/// A complete WebSocket message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
    /// A ping frame (control frame, payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong frame (control frame, payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close frame (control frame, may include status code and reason).
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Create a ping message.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Message::Ping(data.into())
    }

    /// Create a pong message.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Message::Pong(data.into())
    }

    /// Create a close message with status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Opcode this message is framed with.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
            Message::Close(_) => OpCode::Close,
        }
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Returns `true` if this is a close message.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Message::Close(_))
    }

    /// Returns `true` if this is a control message (ping, pong, or close).
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.opcode().is_control()
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw payload bytes as they travel on the wire.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(None) => Vec::new(),
            Message::Close(Some(frame)) => {
                let mut data = frame.code.as_u16().to_be_bytes().to_vec();
                data.extend_from_slice(frame.reason.as_bytes());
                data
            }
        }
    }

    /// Build a message from a complete, reassembled payload.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUtf8` for a text payload that is not UTF-8
    /// - `Error::ProtocolViolation` for a continuation opcode or a malformed close payload
    pub fn from_parts(opcode: OpCode, payload: Vec<u8>) -> Result<Self> {
        match opcode {
            OpCode::Text => String::from_utf8(payload)
                .map(Message::Text)
                .map_err(|_| Error::InvalidUtf8),
            OpCode::Binary => Ok(Message::Binary(payload)),
            OpCode::Ping => Ok(Message::Ping(payload)),
            OpCode::Pong => Ok(Message::Pong(payload)),
            OpCode::Close => Ok(Message::Close(CloseFrame::parse(&payload)?)),
            OpCode::Continuation => Err(Error::ProtocolViolation(
                "Continuation frame outside of a fragmented message".into(),
            )),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        let opcode = message.opcode();
        Frame::new(true, opcode, message.into_payload())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_owned())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(data)
    }
}

impl From<&[u8]> for Message {
    fn from(data: &[u8]) -> Self {
        Message::Binary(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_converts_to_text() {
        let msg: Message = "hello".into();
        assert!(matches!(msg, Message::Text(ref s) if s == "hello"));
        assert_eq!(msg.opcode(), OpCode::Text);
    }

    #[test]
    fn test_bytes_convert_to_binary() {
        let msg: Message = vec![1u8, 2, 3].into();
        assert!(msg.is_binary());
        let msg: Message = [4u8, 5].as_slice().into();
        assert_eq!(msg.into_payload(), vec![4, 5]);
    }

    #[test]
    fn test_close_payload_encoding() {
        let msg = Message::close(CloseCode::Normal, "bye");
        assert_eq!(msg.into_payload(), vec![0x03, 0xe8, b'b', b'y', b'e']);
        assert!(Message::Close(None).into_payload().is_empty());
    }

    #[test]
    fn test_close_frame_parse() {
        assert_eq!(CloseFrame::parse(&[]).unwrap(), None);

        let frame = CloseFrame::parse(&[0x03, 0xe9, b'o', b'k']).unwrap().unwrap();
        assert_eq!(frame.code, CloseCode::GoingAway);
        assert_eq!(frame.reason, "ok");

        assert!(matches!(
            CloseFrame::parse(&[0x03]),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            CloseFrame::parse(&[0x03, 0xe8, 0xff]),
            Err(Error::InvalidUtf8)
        ));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            Message::from_parts(OpCode::Text, b"hi".to_vec()).unwrap(),
            Message::text("hi")
        );
        assert_eq!(
            Message::from_parts(OpCode::Ping, b"p".to_vec()).unwrap(),
            Message::ping(b"p".to_vec())
        );
        assert!(matches!(
            Message::from_parts(OpCode::Text, vec![0xc3, 0x28]),
            Err(Error::InvalidUtf8)
        ));
        assert!(Message::from_parts(OpCode::Continuation, vec![]).is_err());
    }

    #[test]
    fn test_message_into_frame() {
        let frame = Frame::from(Message::pong(b"abc".to_vec()));
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Pong);
        assert_eq!(frame.payload(), b"abc");
    }

    #[test]
    fn test_message_is_control() {
        assert!(!Message::text("hello").is_control());
        assert!(!Message::binary(vec![1]).is_control());
        assert!(Message::ping(vec![]).is_control());
        assert!(Message::pong(vec![]).is_control());
        assert!(Message::Close(None).is_control());
        assert!(Message::Close(None).is_close());
    }

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000u16, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3000] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from_u16(4000), CloseCode::Other(4000));
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1005).is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());
        assert!(!CloseCode::Normal.is_reserved());
    }
}
