//! Frame struct with typed accessors.
//!
//! Represents a complete message frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use uda_core::protocol::{Frame, Header, MessageType};
//! use bytes::Bytes;
//!
//! let header = Header::new(MessageType::RequestBlock, 0, 42, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.message_type(), Some(MessageType::RequestBlock));
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, MessageType, HEADER_SIZE};

/// A complete message frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    #[inline]
    pub fn message_type(&self) -> Option<MessageType> {
        self.header.kind()
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    /// Check if this is a closedown notice.
    #[inline]
    pub fn is_closedown(&self) -> bool {
        self.message_type() == Some(MessageType::Closedown)
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use uda_core::protocol::{build_frame, Header, MessageType};
///
/// let header = Header::new(MessageType::DataBlockList, 0, 42, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), 11 + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
