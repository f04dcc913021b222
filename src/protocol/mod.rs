//! WebSocket protocol core (RFC 6455): framing, masking, the client
//! handshake and inbound validation.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod validation;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{
    ClientHandshake, HandshakeResponse, WS_GUID, WS_VERSION, compute_accept_key, generate_key,
};
pub use mask::{apply_mask, apply_mask_fast, random_mask};
pub use opcode::OpCode;
pub use validation::FrameValidator;
