//! Message frame header.
//!
//! Every encoded block travels behind an 11-byte header:
//! ```text
//! ┌──────────┬───────┬──────────┬──────────┐
//! │ Msg Type │ Flags │ Sequence │ Length   │
//! │ 2 bytes  │ 1 byte│ 4 bytes  │ 4 bytes  │
//! │ uint16 BE│       │ uint32 BE│ uint32 BE│
//! └──────────┴───────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{protocol_codes, Result, UdaError};

/// Header size in bytes (fixed, exactly 11).
pub const HEADER_SIZE: usize = 11;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Absolute maximum payload size (~2 GB, max i32).
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = 2_147_483_647;

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ClientState = 1,
    ServerState = 2,
    RequestBlock = 3,
    DataBlockList = 4,
    /// The peer is shutting the connection down; no payload.
    Closedown = 0xFFFF,
}

impl MessageType {
    /// Wire value.
    #[inline]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a wire value; 0 and unassigned values are `None`.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(MessageType::ClientState),
            2 => Some(MessageType::ServerState),
            3 => Some(MessageType::RequestBlock),
            4 => Some(MessageType::DataBlockList),
            0xFFFF => Some(MessageType::Closedown),
            _ => None,
        }
    }
}

/// Flag constants for the frame header.
pub mod flags {
    /// Direction: server to client (1) or client to server (0).
    pub const TO_CLIENT: u8 = 0b0000_0001;
    /// The accompanying server state carries at least one error.
    pub const HAS_ERRORS: u8 = 0b0000_0010;

    /// Reserved bits mask (bits 2-7).
    pub const RESERVED_MASK: u8 = 0b1111_1100;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw message type (see [`MessageType`]).
    pub message_type: u16,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Per-session sequence number, echoed in the reply.
    pub sequence: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(message_type: MessageType, flags: u8, sequence: u32, payload_length: u32) -> Self {
        Self {
            message_type: message_type.as_u16(),
            flags,
            sequence,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use uda_core::protocol::{Header, MessageType};
    ///
    /// let header = Header::new(MessageType::RequestBlock, 0, 42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 11);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.message_type.to_be_bytes());
        buf[2] = self.flags;
        buf[3..7].copy_from_slice(&self.sequence.to_be_bytes());
        buf[7..11].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            message_type: u16::from_be_bytes([buf[0], buf[1]]),
            flags: buf[2],
            sequence: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
            payload_length: u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Message type is assigned
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if MessageType::from_u16(self.message_type).is_none() {
            return Err(UdaError::protocol(
                protocol_codes::HEADER,
                format!("Unknown message type {}", self.message_type),
            ));
        }

        if self.payload_length > max_payload_size {
            return Err(UdaError::protocol(
                protocol_codes::HEADER,
                format!(
                    "Payload size {} exceeds maximum {}",
                    self.payload_length, max_payload_size
                ),
            ));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(UdaError::protocol(
                protocol_codes::HEADER,
                "Reserved flag bits must be 0",
            ));
        }

        Ok(())
    }

    /// The message type, if assigned.
    #[inline]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_u16(self.message_type)
    }

    /// Check if this frame travels server to client.
    #[inline]
    pub fn is_to_client(&self) -> bool {
        flags::has_flag(self.flags, flags::TO_CLIENT)
    }

    /// Check if the server reported errors.
    #[inline]
    pub fn has_errors(&self) -> bool {
        flags::has_flag(self.flags, flags::HAS_ERRORS)
    }
}
