//! Header checks for frames arriving from the server (RFC 6455).
//!
//! Everything here runs on the decoded header, before the payload is buffered:
//! - Masking rules per RFC 6455 Section 5.1
//! - RSV bits validation
//! - Control frame rules per Section 5.5
//! - Frame size limits

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Validator for server-to-client frames.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    limits: Limits,
}

impl FrameValidator {
    /// Create a new frame validator with the given size limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate an incoming frame header.
    ///
    /// # Errors
    ///
    /// - `Error::MaskedServerFrame` - the server masked its frame
    /// - `Error::ReservedBitsSet` - RSV bits set without negotiated extension
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge`
    /// - `Error::FrameTooLarge` - frame exceeds size limit
    pub fn validate_incoming(
        &self,
        masked: bool,
        rsv1: bool,
        rsv2: bool,
        rsv3: bool,
        payload_len: usize,
    ) -> Result<()> {
        // a client MUST close on a masked frame (Section 5.1)
        if masked {
            return Err(Error::MaskedServerFrame);
        }
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        self.limits.check_frame_size(payload_len)
    }

    pub(crate) fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        self.validate_incoming(
            header.mask.is_some(),
            header.rsv1,
            header.rsv2,
            header.rsv3,
            header.payload_len,
        )?;

        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
        }
        Ok(())
    }

    /// Limits this validator enforces.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}
