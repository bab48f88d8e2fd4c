//! Data blocks: the typed array returned for a request, with its
//! coordinate axes, error bars and optional opaque payload.
//!
//! Transmission order of one block:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ header   data_n rank order data_type error_type error_model│
//! │          errasymmetry error_param_n errcode source_status  │
//! │          signal_status units label description error_msg   │
//! │          [opaque_type opaque_count]            (v3+)       │
//! ├────────────────────────────────────────────────────────────┤
//! │ data     flat types with data_n > 0                        │
//! │ errors   params, err_hi, err_lo                            │
//! ├────────────────────────────────────────────────────────────┤
//! │ dims     every header, then every value set, then every    │
//! │          error set                                         │
//! ├────────────────────────────────────────────────────────────┤
//! │ opaque   package, when opaque_type != 0                    │
//! └────────────────────────────────────────────────────────────┘
//! ```

use super::dimension::{DimHeader, Dimension};
use super::error_bars::{ErrorBars, ErrorHeader};
use super::opaque::OpaquePackage;
use super::types::{get_data_type, ArrayData, DataType};
use super::wire_codec::WireCodec;
use super::xdr::{WireReader, WireWriter};
use crate::error::{protocol_codes, Result, UdaError};
use crate::protocol::version::{self, Field};
use crate::protocol::STRING_LENGTH;

/// The data returned for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub data_type: DataType,
    /// Element count; complex values count once.
    pub data_n: usize,
    /// Present exactly when `data_type` has a flat representation.
    pub data: Option<ArrayData>,
    /// Index of the time dimension, -1 when there is none.
    pub order: i32,
    pub errors: ErrorBars,
    pub errcode: i32,
    pub source_status: i32,
    pub signal_status: i32,
    pub units: String,
    pub label: String,
    pub description: String,
    pub error_msg: String,
    pub dims: Vec<Dimension>,
    pub opaque: Option<OpaquePackage>,
}

impl Default for DataBlock {
    fn default() -> Self {
        Self {
            data_type: DataType::Unknown,
            data_n: 0,
            data: None,
            order: -1,
            errors: ErrorBars::default(),
            errcode: 0,
            source_status: 0,
            signal_status: 0,
            units: String::new(),
            label: String::new(),
            description: String::new(),
            error_msg: String::new(),
            dims: Vec::new(),
            opaque: None,
        }
    }
}

impl DataBlock {
    /// A block holding `data` with no axes.
    pub fn new(data: ArrayData) -> Self {
        Self {
            data_type: data.data_type(),
            data_n: data.len(),
            data: Some(data),
            ..Self::default()
        }
    }

    /// A compound block whose items travel in an opaque package.
    pub fn compound(package: OpaquePackage) -> Self {
        Self {
            data_type: DataType::Compound,
            data_n: package.count(),
            opaque: Some(package),
            ..Self::default()
        }
    }

    pub fn with_dims(mut self, dims: Vec<Dimension>) -> Self {
        self.dims = dims;
        self
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    fn validate(&self, writer: &WireWriter, version: i32) -> Result<()> {
        let mut types = vec![self.data_type, self.errors.error_type()];
        for dim in &self.dims {
            types.push(dim.data_type);
            types.push(dim.errors.error_type());
        }
        if let Some(unavailable) = types.into_iter().find(|t| !version::type_available(*t, version)) {
            return Err(UdaError::protocol(
                protocol_codes::VERSION,
                format!(
                    "{:?} data cannot be sent to a protocol version {} peer",
                    unavailable, version
                ),
            ));
        }

        match (&self.data, self.data_type.is_flat()) {
            (Some(data), true) if data.data_type() == self.data_type && data.len() == self.data_n => {}
            (None, false) => {}
            _ => {
                return Err(writer.error(format!(
                    "Data array does not match data_type {:?} and data_n {}",
                    self.data_type, self.data_n
                )))
            }
        }

        if self.opaque.is_some() && !version::has(version, Field::DataBlockOpaque) {
            return Err(writer.error(format!(
                "Opaque packages cannot be sent to a protocol version {} peer",
                version
            )));
        }

        self.errors.validate(writer, self.data_n)
    }
}

impl WireCodec for DataBlock {
    const NAME: &'static str = "DataBlock";

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()> {
        writer.set_section(protocol_codes::HEADER);
        self.validate(writer, version)?;

        let errors = self.errors.header();
        writer.put_count(self.data_n)?;
        writer.put_count(self.rank())?;
        writer.put_i32(self.order);
        writer.put_i32(self.data_type.code());
        writer.put_i32(errors.error_type.code());
        writer.put_i32(errors.model);
        writer.put_bool(errors.asymmetric);
        writer.put_count(errors.param_n)?;
        writer.put_i32(self.errcode);
        writer.put_i32(self.source_status);
        writer.put_i32(self.signal_status);
        writer.put_string(&self.units, STRING_LENGTH)?;
        writer.put_string(&self.label, STRING_LENGTH)?;
        writer.put_string(&self.description, STRING_LENGTH)?;
        writer.put_string(&self.error_msg, STRING_LENGTH)?;
        if version::has(version, Field::DataBlockOpaque) {
            writer.put_i32(self.opaque.as_ref().map_or(0, OpaquePackage::code));
            writer.put_count(self.opaque.as_ref().map_or(0, OpaquePackage::count))?;
        }

        writer.set_section(protocol_codes::DATA);
        if let Some(data) = &self.data {
            if self.data_n > 0 {
                data.encode(writer)?;
            }
        }
        self.errors.encode_values(writer)?;

        writer.set_section(protocol_codes::DIMENSION);
        for dim in &self.dims {
            dim.encode_header(writer)?;
        }
        for dim in &self.dims {
            dim.encode_values(writer)?;
        }
        for dim in &self.dims {
            dim.encode_errors(writer)?;
        }

        if let Some(package) = &self.opaque {
            writer.set_section(protocol_codes::OPAQUE);
            package.encode(writer)?;
        }
        Ok(())
    }

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self> {
        reader.set_section(protocol_codes::HEADER);
        let data_n = reader.get_count()?;
        let rank = reader.get_count()?;
        let order = reader.get_i32()?;
        let data_type = get_data_type(reader)?;
        let error_type = get_data_type(reader)?;
        let model = reader.get_i32()?;
        let asymmetric = reader.get_bool()?;
        let param_n = reader.get_count()?;
        let errcode = reader.get_i32()?;
        let source_status = reader.get_i32()?;
        let signal_status = reader.get_i32()?;
        let units = reader.get_string(STRING_LENGTH)?;
        let label = reader.get_string(STRING_LENGTH)?;
        let description = reader.get_string(STRING_LENGTH)?;
        let error_msg = reader.get_string(STRING_LENGTH)?;
        let (opaque_type, opaque_count) = if version::has(version, Field::DataBlockOpaque) {
            (reader.get_i32()?, reader.get_count()?)
        } else {
            (0, 0)
        };
        tracing::debug!(?data_type, data_n, rank, opaque_type, "data block header");

        reader.set_section(protocol_codes::DATA);
        let data = match (data_type.is_flat(), data_n) {
            (false, _) => None,
            (true, 0) => ArrayData::zeroed(data_type, 0),
            (true, n) => Some(ArrayData::decode(reader, data_type, n)?),
        };
        let error_header = ErrorHeader {
            error_type,
            model,
            asymmetric,
            param_n,
        };
        let errors = ErrorBars::decode_values(reader, error_header, data_n)?;

        reader.set_section(protocol_codes::DIMENSION);
        let headers = (0..rank)
            .map(|_| Dimension::decode_header(reader))
            .collect::<Result<Vec<DimHeader>>>()?;
        let values = headers
            .iter()
            .map(|header| Dimension::decode_values(reader, header))
            .collect::<Result<Vec<_>>>()?;
        let dims = headers
            .into_iter()
            .zip(values)
            .map(|(header, values)| Dimension::decode_errors(reader, header, values))
            .collect::<Result<Vec<_>>>()?;

        let opaque = if opaque_type != 0 {
            reader.set_section(protocol_codes::OPAQUE);
            Some(OpaquePackage::decode(reader, opaque_type, opaque_count)?)
        } else {
            None
        };

        Ok(Self {
            data_type,
            data_n,
            data,
            order,
            errors,
            errcode,
            source_status,
            signal_status,
            units,
            label,
            description,
            error_msg,
            dims,
            opaque,
        })
    }
}

/// The data blocks answering one request list.
///
/// The count is on the wire from protocol version 8; older peers exchange
/// exactly one block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataBlockList(pub Vec<DataBlock>);

impl WireCodec for DataBlockList {
    const NAME: &'static str = "DataBlockList";

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()> {
        writer.set_section(protocol_codes::HEADER);
        if version::has(version, Field::DataBlockCount) {
            writer.put_count(self.0.len())?;
        } else if self.0.len() != 1 {
            return Err(writer.error(format!(
                "Protocol version {} carries exactly one data block, not {}",
                version,
                self.0.len()
            )));
        }
        for block in &self.0 {
            block.encode_into(writer, version)?;
        }
        Ok(())
    }

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self> {
        reader.set_section(protocol_codes::HEADER);
        let count = if version::has(version, Field::DataBlockCount) {
            reader.get_count()?
        } else {
            1
        };
        (0..count)
            .map(|_| DataBlock::decode_from(reader, version))
            .collect::<Result<Vec<_>>>()
            .map(DataBlockList)
    }
}
