//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Reassembles continuation frames into one payload.
///
/// Control frames are not handled here; the decoder passes them through
/// while a fragmented message is still open.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    /// Returns Some(complete_message) when FIN=1, None otherwise.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for an unexpected or missing continuation,
    ///   or too many fragments
    /// - `Error::MessageTooLarge` past the message size limit
    /// - `Error::InvalidUtf8` if a completed text message is not UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        let opcode = match (frame.opcode, self.opcode) {
            (OpCode::Continuation, Some(opcode)) => opcode,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (opcode, None) => opcode,
        };

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if frame.fin && self.opcode.is_none() {
            // unfragmented: skip the staging buffer
            return AssembledMessage::new(opcode, frame.into_payload()).map(Some);
        }

        self.opcode = Some(opcode);
        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        self.reset();
        AssembledMessage::new(opcode, payload).map(Some)
    }

    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}

/// A fully assembled data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    fn new(opcode: OpCode, payload: Vec<u8>) -> Result<Self> {
        if opcode == OpCode::Text {
            std::str::from_utf8(&payload)?;
        }
        Ok(Self { opcode, payload })
    }
}
