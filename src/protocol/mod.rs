//! Protocol module - version gates, string limits and message framing.
//!
//! - [`version`]: which optional fields and element types exist at which
//!   protocol version
//! - 11-byte frame header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
pub mod version;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use version::PROTOCOL_VERSION;
pub use wire_format::{
    flags, Header, MessageType, ABSOLUTE_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
};

/// Default cap for string fields.
pub const STRING_LENGTH: usize = 1024;

/// Cap for signal and source text.
pub const MAX_META: usize = 10240;

/// Cap for short names such as the API delimiter.
pub const MAX_NAME: usize = 1024;
