//! The encode/decode contract shared by every wire block.

use bytes::Bytes;

use super::xdr::{WireReader, WireWriter};
use crate::error::Result;

/// A value that travels as one block at a negotiated protocol version.
///
/// `decode(encode(v, V), V) == v` holds for every valid value at every
/// supported version `V`.
pub trait WireCodec: Sized {
    /// Block name used in log lines.
    const NAME: &'static str;

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()>;

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self>;

    /// Encode into a fresh buffer.
    fn encode(&self, version: i32) -> Result<Bytes> {
        let mut writer = WireWriter::new();
        self.encode_into(&mut writer, version)?;
        tracing::debug!(block = Self::NAME, version, bytes = writer.len(), "encoded");
        Ok(writer.freeze())
    }

    /// Decode a complete buffer; trailing bytes are a protocol error.
    fn decode(bytes: Bytes, version: i32) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        let value = Self::decode_from(&mut reader, version).map_err(|e| {
            tracing::error!(block = Self::NAME, version, "decode failed: {}", e);
            e
        })?;
        if !reader.is_empty() {
            let err = reader.error(format!("{} trailing bytes after {}", reader.remaining(), Self::NAME));
            tracing::error!(block = Self::NAME, version, "decode failed: {}", err);
            return Err(err);
        }
        Ok(value)
    }
}
