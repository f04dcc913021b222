use bytes::{Buf, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::frame::parse_header;
use crate::protocol::{Frame, FrameValidator, MessageAssembler};

/// Incremental decoder for server-to-client frames.
///
/// Partial frames stay buffered between calls, so a frame split across any
/// number of reads decodes the same as one delivered whole. Control frames
/// that arrive in the middle of a fragmented message are returned as soon as
/// they are complete.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    validator: FrameValidator,
    assembler: MessageAssembler,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            assembler: MessageAssembler::new(limits.clone()),
            validator: FrameValidator::new(limits),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of bytes buffered but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete message, if the buffer holds one.
    ///
    /// # Errors
    ///
    /// Any framing, validation or reassembly error. The connection should be
    /// torn down afterwards; the decoder state is not recoverable.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            let header = match parse_header(&self.buffer) {
                Ok(header) => header,
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };
            self.validator.validate_header(&header)?;

            let (frame, consumed) = match Frame::parse_with_header(&self.buffer, &header) {
                Ok(parsed) => parsed,
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };
            self.buffer.advance(consumed);

            if frame.opcode.is_control() {
                let opcode = frame.opcode;
                return Message::from_parts(opcode, frame.into_payload()).map(Some);
            }

            if let Some(assembled) = self.assembler.push(frame)? {
                return Message::from_parts(assembled.opcode, assembled.payload).map(Some);
            }
        }
    }

    /// Drop all buffered and partially assembled data.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.assembler.reset();
    }
}
