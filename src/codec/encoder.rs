use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, MAX_CONTROL_FRAME_PAYLOAD, WS_VERSION, random_mask};

/// Renders outgoing messages as masked client frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    version: u8,
}

impl FrameEncoder {
    /// Encoder for the negotiated protocol version.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedVersion` for anything but version 13.
    pub fn new(version: u8) -> Result<Self> {
        if version != WS_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(Self { version })
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Encode one message as a single final frame with a fresh masking key.
    ///
    /// # Errors
    ///
    /// Returns `Error::ControlFrameTooLarge` for a ping, pong or close whose
    /// payload exceeds 125 bytes.
    pub fn encode(&self, message: Message) -> Result<Vec<u8>> {
        let frame = Frame::from(message);
        if frame.opcode.is_control() && frame.payload().len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(frame.payload().len()));
        }
        Ok(frame.encode(Some(random_mask())))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            version: WS_VERSION,
        }
    }
}
