//! Opaque packages: payloads that are not a flat typed array.
//!
//! ```text
//! type 1  file       u32 length + raw bytes
//! type 2  structures type table, carrier, items
//! type 3  object     u32 length + MessagePack of a StructureGraph
//! ```
//!
//! The structure package is self-describing. The type table comes first
//! so a receiver can rebuild types it has never seen:
//!
//! ```text
//! u32 ntypes
//!   string name, u32 nfields
//!     string field name, i32 tag (0 array, 1 text, 2 structures)
//!       tag 0: i32 data_type, u32 count
//!       tag 2: string type name
//! string carrier ("SArray"), u32 item count, string item type
//! items, field by field:
//!   array       count-prefixed elements (count must match the type table)
//!   text        length-prefixed string
//!   structures  u32 n, then n nested items
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::msgpack::MsgPackCodec;
use super::types::{get_data_type, ArrayData, DataType};
use super::xdr::{WireReader, WireWriter};
use crate::error::Result;
use crate::protocol::{MAX_META, STRING_LENGTH};

/// Name of the carrier type wrapping the items of a structure package.
pub const CARRIER_TYPE: &str = "SArray";

/// Nesting bound for structure graphs received from a peer.
const MAX_DEPTH: usize = 64;

const TAG_ARRAY: i32 = 0;
const TAG_TEXT: i32 = 1;
const TAG_STRUCTURES: i32 = 2;

/// Shape of one field of a user-defined type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A fixed-length array of an element type.
    Array { data_type: DataType, count: usize },
    Text,
    /// Any number of nested items of the named type.
    Structures(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// A user-defined structure type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// Field contents, positionally matching the owning [`TypeDef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Array(ArrayData),
    Text(String),
    Structures(Vec<Structure>),
}

/// One instance of a user-defined type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub fields: Vec<FieldValue>,
}

/// A type table and the items of the carrier array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureGraph {
    pub types: Vec<TypeDef>,
    /// Type of every item in `items`.
    pub item_type: String,
    pub items: Vec<Structure>,
}

impl StructureGraph {
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    fn check_item(&self, writer: &WireWriter, type_name: &str, item: &Structure, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(writer.error("Structure graph nests too deeply"));
        }
        let def = self
            .type_def(type_name)
            .ok_or_else(|| writer.error(format!("Type '{}' is not in the type table", type_name)))?;
        if def.fields.len() != item.fields.len() {
            return Err(writer.error(format!(
                "'{}' declares {} fields, item has {}",
                def.name,
                def.fields.len(),
                item.fields.len()
            )));
        }
        for (field, value) in def.fields.iter().zip(&item.fields) {
            match (&field.kind, value) {
                (FieldKind::Array { data_type, count }, FieldValue::Array(array))
                    if array.data_type() == *data_type && array.len() == *count => {}
                (FieldKind::Text, FieldValue::Text(_)) => {}
                (FieldKind::Structures(child), FieldValue::Structures(children)) => {
                    for nested in children {
                        self.check_item(writer, child, nested, depth + 1)?;
                    }
                }
                _ => {
                    return Err(writer.error(format!(
                        "Field '{}.{}' does not match its declaration",
                        def.name, field.name
                    )))
                }
            }
        }
        Ok(())
    }

    fn encode(&self, writer: &mut WireWriter) -> Result<()> {
        for item in &self.items {
            self.check_item(writer, &self.item_type, item, 0)?;
        }

        writer.put_count(self.types.len())?;
        for def in &self.types {
            writer.put_string(&def.name, STRING_LENGTH)?;
            writer.put_count(def.fields.len())?;
            for field in &def.fields {
                writer.put_string(&field.name, STRING_LENGTH)?;
                match &field.kind {
                    FieldKind::Array { data_type, count } => {
                        writer.put_i32(TAG_ARRAY);
                        writer.put_i32(data_type.code());
                        writer.put_count(*count)?;
                    }
                    FieldKind::Text => writer.put_i32(TAG_TEXT),
                    FieldKind::Structures(child) => {
                        writer.put_i32(TAG_STRUCTURES);
                        writer.put_string(child, STRING_LENGTH)?;
                    }
                }
            }
        }

        writer.put_string(CARRIER_TYPE, STRING_LENGTH)?;
        writer.put_count(self.items.len())?;
        writer.put_string(&self.item_type, STRING_LENGTH)?;
        for item in &self.items {
            encode_item(writer, item)?;
        }
        Ok(())
    }

    fn decode(reader: &mut WireReader, expected_items: usize) -> Result<Self> {
        let ntypes = reader.get_count()?;
        let mut types = Vec::new();
        for _ in 0..ntypes {
            let name = reader.get_string(STRING_LENGTH)?;
            let nfields = reader.get_count()?;
            let mut fields = Vec::new();
            for _ in 0..nfields {
                let field_name = reader.get_string(STRING_LENGTH)?;
                let kind = match reader.get_i32()? {
                    TAG_ARRAY => {
                        let data_type = get_data_type(reader)?;
                        let count = reader.get_count()?;
                        FieldKind::Array { data_type, count }
                    }
                    TAG_TEXT => FieldKind::Text,
                    TAG_STRUCTURES => FieldKind::Structures(reader.get_string(STRING_LENGTH)?),
                    tag => return Err(reader.error(format!("Unknown field tag {}", tag))),
                };
                fields.push(FieldDef {
                    name: field_name,
                    kind,
                });
            }
            types.push(TypeDef { name, fields });
        }

        let carrier = reader.get_string(STRING_LENGTH)?;
        if carrier != CARRIER_TYPE {
            return Err(reader.error(format!(
                "Received structure type '{}' where '{}' was expected",
                carrier, CARRIER_TYPE
            )));
        }
        let count = reader.get_count()?;
        if count != expected_items {
            return Err(reader.error(format!(
                "Carrier holds {} items, block header declares {}",
                count, expected_items
            )));
        }
        let item_type = reader.get_string(STRING_LENGTH)?;

        let mut graph = Self {
            types,
            item_type,
            items: Vec::new(),
        };
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(graph.decode_item(reader, &graph.item_type, 0)?);
        }
        graph.items = items;
        Ok(graph)
    }

    fn decode_item(&self, reader: &mut WireReader, type_name: &str, depth: usize) -> Result<Structure> {
        if depth > MAX_DEPTH {
            return Err(reader.error("Structure graph nests too deeply"));
        }
        let def = self
            .type_def(type_name)
            .ok_or_else(|| reader.error(format!("Type '{}' is not in the type table", type_name)))?;
        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            fields.push(match &field.kind {
                FieldKind::Array { data_type, count } => {
                    FieldValue::Array(ArrayData::decode(reader, *data_type, *count)?)
                }
                FieldKind::Text => FieldValue::Text(reader.get_string(MAX_META)?),
                FieldKind::Structures(child) => {
                    let n = reader.get_count()?;
                    let mut children = Vec::new();
                    for _ in 0..n {
                        children.push(self.decode_item(reader, child, depth + 1)?);
                    }
                    FieldValue::Structures(children)
                }
            });
        }
        Ok(Structure { fields })
    }
}

fn encode_item(writer: &mut WireWriter, item: &Structure) -> Result<()> {
    for value in &item.fields {
        match value {
            FieldValue::Array(array) => array.encode(writer)?,
            FieldValue::Text(text) => writer.put_string(text, MAX_META)?,
            FieldValue::Structures(children) => {
                writer.put_count(children.len())?;
                for child in children {
                    encode_item(writer, child)?;
                }
            }
        }
    }
    Ok(())
}

/// A non-array payload attached to a data block.
#[derive(Debug, Clone, PartialEq)]
pub enum OpaquePackage {
    /// Raw file contents.
    File(Bytes),
    Structures(StructureGraph),
    /// A structure graph serialized as a single MessagePack object.
    Object(StructureGraph),
}

impl OpaquePackage {
    /// Package type code carried in the block header.
    pub fn code(&self) -> i32 {
        match self {
            OpaquePackage::File(_) => 1,
            OpaquePackage::Structures(_) => 2,
            OpaquePackage::Object(_) => 3,
        }
    }

    /// Item count carried in the block header.
    pub fn count(&self) -> usize {
        match self {
            OpaquePackage::Structures(graph) => graph.items.len(),
            _ => 1,
        }
    }

    pub(crate) fn encode(&self, writer: &mut WireWriter) -> Result<()> {
        match self {
            OpaquePackage::File(bytes) => writer.put_bytes(bytes),
            OpaquePackage::Structures(graph) => graph.encode(writer),
            OpaquePackage::Object(graph) => writer.put_bytes(&MsgPackCodec::encode(graph)?),
        }
    }

    /// Decode the package announced by `code` and `count` in the header.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on an unknown package type, a carrier name
    /// other than [`CARRIER_TYPE`], or an item count that disagrees with
    /// the header.
    pub(crate) fn decode(reader: &mut WireReader, code: i32, count: usize) -> Result<Self> {
        let package = match code {
            1 => OpaquePackage::File(reader.get_bytes()?),
            2 => OpaquePackage::Structures(StructureGraph::decode(reader, count)?),
            3 => OpaquePackage::Object(MsgPackCodec::decode(&reader.get_bytes()?)?),
            other => return Err(reader.error(format!("Unknown opaque package type {}", other))),
        };
        if package.count() != count {
            return Err(reader.error(format!(
                "Opaque package holds {} items, header declares {}",
                package.count(),
                count
            )));
        }
        Ok(package)
    }
}
