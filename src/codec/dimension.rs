//! Dimension (coordinate axis) records.
//!
//! A dimension travels in three phases, each phase covering every
//! dimension of the block before the next phase starts:
//!
//! ```text
//! headers   type, error fields, dim_n, compressed, dim0, diff,
//!           method, udoms, units, label
//! values    literal array, or the compressed method's arrays
//! errors    params, err_hi, err_lo (asymmetric only)
//! ```
//!
//! Compressed methods:
//!
//! | method | wire arrays                         | value `i`                  |
//! |--------|-------------------------------------|----------------------------|
//! | 0      | none (`dim0`, `diff` in the header) | `dim0 + i*diff`            |
//! | 1      | samples, offsets, intervals (udoms) | run `k`: `offs[k] + j*ints[k]` |
//! | 2      | offsets (udoms)                     | `offs[i]`                  |
//! | 3      | one offset, one interval            | `offs[0] + i*ints[0]`      |

use super::error_bars::{ErrorBars, ErrorHeader};
use super::types::{get_data_type, ArrayData, DataType};
use super::xdr::{WireReader, WireWriter};
use crate::error::Result;
use crate::protocol::STRING_LENGTH;

/// How the coordinate values of a dimension are represented.
#[derive(Debug, Clone, PartialEq)]
pub enum DimValues {
    /// Every coordinate transmitted.
    Literal(ArrayData),
    /// Method 0: a regular axis.
    Linear { dim0: f64, diff: f64 },
    /// Method 1: runs of regularly spaced samples.
    Domains {
        samples: Vec<i32>,
        offsets: ArrayData,
        intervals: ArrayData,
    },
    /// Method 2: one offset per coordinate.
    Offsets(ArrayData),
    /// Method 3: a single arithmetic sequence of `count` values.
    Arithmetic {
        count: u32,
        offset: ArrayData,
        interval: ArrayData,
    },
}

impl DimValues {
    pub fn is_compressed(&self) -> bool {
        !matches!(self, DimValues::Literal(_))
    }

    /// Compression method code; literal values report 0.
    pub fn method(&self) -> i32 {
        match self {
            DimValues::Literal(_) | DimValues::Linear { .. } => 0,
            DimValues::Domains { .. } => 1,
            DimValues::Offsets(_) => 2,
            DimValues::Arithmetic { .. } => 3,
        }
    }

    fn udoms(&self) -> usize {
        match self {
            DimValues::Domains { samples, .. } => samples.len(),
            DimValues::Offsets(offsets) => offsets.len(),
            DimValues::Arithmetic { count, .. } => *count as usize,
            _ => 0,
        }
    }

    fn arrays(&self) -> Vec<&ArrayData> {
        match self {
            DimValues::Literal(values) | DimValues::Offsets(values) => vec![values],
            DimValues::Linear { .. } => Vec::new(),
            DimValues::Domains {
                offsets, intervals, ..
            } => vec![offsets, intervals],
            DimValues::Arithmetic {
                offset, interval, ..
            } => vec![offset, interval],
        }
    }
}

/// One coordinate axis of a data block.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub data_type: DataType,
    pub dim_n: usize,
    pub values: DimValues,
    pub errors: ErrorBars,
    pub units: String,
    pub label: String,
}

impl Dimension {
    /// An uncompressed axis over `values`.
    pub fn literal(values: ArrayData) -> Self {
        Self {
            data_type: values.data_type(),
            dim_n: values.len(),
            values: DimValues::Literal(values),
            errors: ErrorBars::default(),
            units: String::new(),
            label: String::new(),
        }
    }

    /// The conventional index axis `0, 1, .., n-1`.
    pub fn index(n: usize) -> Self {
        Self {
            data_type: DataType::Int,
            dim_n: n,
            values: DimValues::Linear { dim0: 0.0, diff: 1.0 },
            errors: ErrorBars::default(),
            units: String::new(),
            label: String::new(),
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn validate(&self, writer: &WireWriter) -> Result<()> {
        if self.values.is_compressed() && self.data_type.is_complex() {
            return Err(writer.error(format!("{:?} dimensions cannot be compressed", self.data_type)));
        }
        for array in self.values.arrays() {
            if array.data_type() != self.data_type {
                return Err(writer.error(format!(
                    "Dimension values are {:?}, header declares {:?}",
                    array.data_type(),
                    self.data_type
                )));
            }
        }
        if let DimValues::Literal(values) = &self.values {
            if values.len() != self.dim_n {
                return Err(writer.error(format!(
                    "Dimension has {} values, dim_n is {}",
                    values.len(),
                    self.dim_n
                )));
            }
        }
        if let DimValues::Domains {
            samples,
            offsets,
            intervals,
        } = &self.values
        {
            if offsets.len() != samples.len() || intervals.len() != samples.len() {
                return Err(writer.error("Domain offsets and intervals must match the sample runs"));
            }
        }
        if let DimValues::Arithmetic {
            offset, interval, ..
        } = &self.values
        {
            if offset.len() != 1 || interval.len() != 1 {
                return Err(writer.error("Arithmetic dimensions carry one offset and one interval"));
            }
        }
        self.errors.validate(writer, self.dim_n)
    }

    pub(crate) fn encode_header(&self, writer: &mut WireWriter) -> Result<()> {
        self.validate(writer)?;
        let errors = self.errors.header();
        let (dim0, diff) = match self.values {
            DimValues::Linear { dim0, diff } => (dim0, diff),
            _ => (0.0, 0.0),
        };
        writer.put_i32(self.data_type.code());
        writer.put_i32(errors.error_type.code());
        writer.put_i32(errors.model);
        writer.put_bool(errors.asymmetric);
        writer.put_count(errors.param_n)?;
        writer.put_count(self.dim_n)?;
        writer.put_bool(self.values.is_compressed());
        writer.put_f64(dim0);
        writer.put_f64(diff);
        writer.put_i32(self.values.method());
        writer.put_count(self.values.udoms())?;
        writer.put_string(&self.units, STRING_LENGTH)?;
        writer.put_string(&self.label, STRING_LENGTH)
    }

    pub(crate) fn encode_values(&self, writer: &mut WireWriter) -> Result<()> {
        match &self.values {
            DimValues::Literal(values) | DimValues::Offsets(values) => values.encode(writer),
            DimValues::Linear { .. } => Ok(()),
            DimValues::Domains {
                samples,
                offsets,
                intervals,
            } => {
                writer.put_elements(samples)?;
                offsets.encode(writer)?;
                intervals.encode(writer)
            }
            DimValues::Arithmetic {
                offset, interval, ..
            } => {
                offset.encode(writer)?;
                interval.encode(writer)
            }
        }
    }

    pub(crate) fn encode_errors(&self, writer: &mut WireWriter) -> Result<()> {
        self.errors.encode_values(writer)
    }

    pub(crate) fn decode_header(reader: &mut WireReader) -> Result<DimHeader> {
        let data_type = get_data_type(reader)?;
        let error_type = get_data_type(reader)?;
        let model = reader.get_i32()?;
        let asymmetric = reader.get_bool()?;
        let param_n = reader.get_count()?;
        let dim_n = reader.get_count()?;
        let compressed = reader.get_bool()?;
        let dim0 = reader.get_f64()?;
        let diff = reader.get_f64()?;
        let method = reader.get_i32()?;
        let udoms = reader.get_count()?;
        let units = reader.get_string(STRING_LENGTH)?;
        let label = reader.get_string(STRING_LENGTH)?;

        if compressed && data_type.is_complex() {
            return Err(reader.error(format!("{:?} dimensions cannot be compressed", data_type)));
        }
        if compressed && !(0..=3).contains(&method) {
            return Err(reader.error(format!("Unknown dimension compression method {}", method)));
        }

        Ok(DimHeader {
            data_type,
            errors: ErrorHeader {
                error_type,
                model,
                asymmetric,
                param_n,
            },
            dim_n,
            compressed,
            dim0,
            diff,
            method,
            udoms,
            units,
            label,
        })
    }

    pub(crate) fn decode_values(reader: &mut WireReader, header: &DimHeader) -> Result<DimValues> {
        let data_type = header.data_type;
        if !header.compressed {
            return ArrayData::decode(reader, data_type, header.dim_n).map(DimValues::Literal);
        }
        Ok(match header.method {
            0 => DimValues::Linear {
                dim0: header.dim0,
                diff: header.diff,
            },
            1 => DimValues::Domains {
                samples: reader.get_elements(header.udoms)?,
                offsets: ArrayData::decode(reader, data_type, header.udoms)?,
                intervals: ArrayData::decode(reader, data_type, header.udoms)?,
            },
            2 => DimValues::Offsets(ArrayData::decode(reader, data_type, header.udoms)?),
            _ => DimValues::Arithmetic {
                count: u32::try_from(header.udoms)
                    .map_err(|_| reader.error("Arithmetic dimension count overflows"))?,
                offset: ArrayData::decode(reader, data_type, 1)?,
                interval: ArrayData::decode(reader, data_type, 1)?,
            },
        })
    }

    pub(crate) fn decode_errors(
        reader: &mut WireReader,
        header: DimHeader,
        values: DimValues,
    ) -> Result<Self> {
        let errors = ErrorBars::decode_values(reader, header.errors, header.dim_n)?;
        Ok(Self {
            data_type: header.data_type,
            dim_n: header.dim_n,
            values,
            errors,
            units: header.units,
            label: header.label,
        })
    }
}

/// A decoded dimension header, held while the value and error phases of
/// the other dimensions are read.
#[derive(Debug, Clone)]
pub(crate) struct DimHeader {
    pub data_type: DataType,
    pub errors: ErrorHeader,
    pub dim_n: usize,
    pub compressed: bool,
    pub dim0: f64,
    pub diff: f64,
    pub method: i32,
    pub udoms: usize,
    pub units: String,
    pub label: String,
}
