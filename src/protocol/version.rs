//! Protocol version gates.
//!
//! Every optional wire field and every element type that did not exist in
//! the first protocol revision is listed here once, with the version that
//! introduced it. The codec consults [`has`] and [`type_available`] instead
//! of comparing version numbers inline.
//!
//! ```text
//! field                          since
//! ─────────────────────────────  ─────
//! DataBlock opaque_type/count      3
//! ClientState private_flags        5
//! ClientState client_flags/rank    6
//! Request source/api_delim         6
//! ClientState os_name/doi          7
//! ServerState os_name/doi          7
//! Request put                      7
//! Request block count              8
//! DataBlockList count              8
//! ```

use crate::codec::DataType;

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: i32 = 8;

/// Optional fields whose presence depends on the negotiated version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DataBlockOpaque,
    ClientPrivateFlags,
    ClientFlags,
    RequestSource,
    ClientOsName,
    ServerOsName,
    RequestPut,
    RequestBlockCount,
    DataBlockCount,
}

/// The compatibility matrix: field and the version that introduced it.
pub const FIELD_GATES: &[(Field, i32)] = &[
    (Field::DataBlockOpaque, 3),
    (Field::ClientPrivateFlags, 5),
    (Field::ClientFlags, 6),
    (Field::RequestSource, 6),
    (Field::ClientOsName, 7),
    (Field::ServerOsName, 7),
    (Field::RequestPut, 7),
    (Field::RequestBlockCount, 8),
    (Field::DataBlockCount, 8),
];

impl Field {
    /// Version that introduced this field.
    pub fn introduced(self) -> i32 {
        FIELD_GATES
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, version)| *version)
            .unwrap_or(0)
    }
}

/// Whether `field` is on the wire at `version`.
#[inline]
pub fn has(version: i32, field: Field) -> bool {
    version >= field.introduced()
}

/// Version that introduced an element type.
pub fn type_introduced(data_type: DataType) -> i32 {
    match data_type {
        DataType::UnsignedChar
        | DataType::UnsignedShort
        | DataType::UnsignedInt
        | DataType::UnsignedLong
        | DataType::UnsignedLong64
        | DataType::Complex
        | DataType::DComplex => 3,
        DataType::Compound => 4,
        DataType::String => 6,
        _ => 0,
    }
}

/// Whether a peer at `version` understands `data_type`.
#[inline]
pub fn type_available(data_type: DataType, version: i32) -> bool {
    version >= type_introduced(data_type)
}

/// The version governing a session: the lower of the two advertised.
#[inline]
pub fn negotiate(client: i32, server: i32) -> i32 {
    client.min(server)
}
