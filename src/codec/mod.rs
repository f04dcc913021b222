//! Message-level codec for the client side of a connection.
//!
//! [`FrameDecoder`] is fed raw bytes in whatever chunks the transport produces
//! and yields complete messages; [`FrameEncoder`] renders outgoing messages as
//! masked frames.

mod decoder;
mod encoder;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
