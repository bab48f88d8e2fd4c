//! Codec module - the versioned binary encoding of data and request blocks.
//!
//! - [`WireWriter`] / [`WireReader`] - big-endian primitives with capped strings
//! - [`ArrayData`] - typed element vectors keyed by [`DataType`]
//! - [`DataBlock`] / [`DataBlockList`] - data, error bars, dimensions, opaque payloads
//! - [`ClientState`] / [`ServerState`] - the handshake blocks
//! - [`RequestBlock`] - raw request fields sent client to server
//! - [`MsgPackCodec`] - MessagePack for serialized-object packages
//!
//! Every block implements [`WireCodec`], so encoding and decoding always
//! take the negotiated protocol version.
//!
//! # Example
//!
//! ```
//! use uda_core::codec::{ArrayData, DataBlock, WireCodec};
//! use uda_core::protocol::PROTOCOL_VERSION;
//!
//! let block = DataBlock::new(ArrayData::Double(vec![1.0, 2.0, 3.0]));
//! let bytes = block.encode(PROTOCOL_VERSION).unwrap();
//! let decoded = DataBlock::decode(bytes, PROTOCOL_VERSION).unwrap();
//! assert_eq!(decoded, block);
//! ```

mod compress;
mod data_block;
mod dimension;
mod error_bars;
mod msgpack;
mod opaque;
mod request_block;
mod state;
mod types;
mod wire_codec;
mod xdr;

pub use compress::{compress_dim, decompress_dim, Numeric};
pub use data_block::{DataBlock, DataBlockList};
pub use dimension::{DimValues, Dimension};
pub use error_bars::ErrorBars;
pub use msgpack::MsgPackCodec;
pub use opaque::{
    FieldDef, FieldKind, FieldValue, OpaquePackage, Structure, StructureGraph, TypeDef,
    CARRIER_TYPE,
};
pub use request_block::RequestBlock;
pub use state::{ClientState, DataOptions, ServerState};
pub use types::{ArrayData, Complex, DataType};
pub use wire_codec::WireCodec;
pub use xdr::{WireElement, WireReader, WireWriter};
