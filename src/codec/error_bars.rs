//! Error bars attached to data and dimension arrays.

use super::types::{ArrayData, DataType};
use super::xdr::{WireReader, WireWriter};
use crate::error::Result;

/// Error model, parameters and the upper/lower error arrays.
///
/// The wire header fields are derived from the contents: `error_type` is
/// the element type of `hi` (Unknown when absent) and `errasymmetry` is
/// set exactly when `lo` is present. Symmetric errors carry only `hi`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorBars {
    pub model: i32,
    pub params: Vec<f32>,
    pub hi: Option<ArrayData>,
    pub lo: Option<ArrayData>,
}

impl ErrorBars {
    pub fn error_type(&self) -> DataType {
        self.hi.as_ref().map(ArrayData::data_type).unwrap_or_default()
    }

    pub fn is_asymmetric(&self) -> bool {
        self.lo.is_some()
    }

    /// The lower error array; equal to the upper one when symmetric.
    pub fn lower(&self) -> Option<&ArrayData> {
        self.lo.as_ref().or(self.hi.as_ref())
    }

    /// Check the arrays against the element count of the owning block.
    pub(crate) fn validate(&self, writer: &WireWriter, count: usize) -> Result<()> {
        let Some(hi) = &self.hi else {
            if self.lo.is_some() {
                return Err(writer.error("Lower error bars given without upper error bars"));
            }
            return Ok(());
        };
        if hi.len() != count {
            return Err(writer.error(format!(
                "Upper error array has {} elements, expected {}",
                hi.len(),
                count
            )));
        }
        if let Some(lo) = &self.lo {
            if lo.data_type() != hi.data_type() || lo.len() != count {
                return Err(writer.error("Lower error array does not match the upper error array"));
            }
        }
        Ok(())
    }

    /// Parameters, then `hi`, then `lo` when asymmetric.
    pub(crate) fn encode_values(&self, writer: &mut WireWriter) -> Result<()> {
        if !self.params.is_empty() {
            writer.put_elements(&self.params)?;
        }
        if let Some(hi) = &self.hi {
            hi.encode(writer)?;
        }
        if let Some(lo) = &self.lo {
            lo.encode(writer)?;
        }
        Ok(())
    }

    /// Inverse of [`ErrorBars::encode_values`] driven by the header fields.
    pub(crate) fn decode_values(
        reader: &mut WireReader,
        header: ErrorHeader,
        count: usize,
    ) -> Result<Self> {
        let params = if header.param_n > 0 {
            reader.get_elements(header.param_n)?
        } else {
            Vec::new()
        };
        let (hi, lo) = if header.error_type == DataType::Unknown {
            (None, None)
        } else {
            let hi = ArrayData::decode(reader, header.error_type, count)?;
            let lo = if header.asymmetric {
                Some(ArrayData::decode(reader, header.error_type, count)?)
            } else {
                None
            };
            (Some(hi), lo)
        };
        Ok(Self {
            model: header.model,
            params,
            hi,
            lo,
        })
    }

    pub(crate) fn header(&self) -> ErrorHeader {
        ErrorHeader {
            error_type: self.error_type(),
            model: self.model,
            asymmetric: self.is_asymmetric(),
            param_n: self.params.len(),
        }
    }
}

/// The error fields of a block header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ErrorHeader {
    pub error_type: DataType,
    pub model: i32,
    pub asymmetric: bool,
    pub param_n: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_header() {
        let bars = ErrorBars {
            model: 2,
            params: vec![0.5],
            hi: Some(ArrayData::Float(vec![0.1, 0.2])),
            lo: None,
        };
        let header = bars.header();
        assert_eq!(header.error_type, DataType::Float);
        assert!(!header.asymmetric);
        assert_eq!(header.param_n, 1);
        assert_eq!(bars.lower(), bars.hi.as_ref());
    }

    #[test]
    fn test_asymmetric_values() {
        let bars = ErrorBars {
            model: 0,
            params: vec![],
            hi: Some(ArrayData::Double(vec![1.0, 2.0])),
            lo: Some(ArrayData::Double(vec![0.5, 0.25])),
        };
        let mut writer = WireWriter::new();
        bars.validate(&writer, 2).unwrap();
        bars.encode_values(&mut writer).unwrap();
        let mut reader = WireReader::new(writer.freeze());
        let decoded = ErrorBars::decode_values(&mut reader, bars.header(), 2).unwrap();
        assert_eq!(decoded, bars);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_validation() {
        let writer = WireWriter::new();
        let lo_only = ErrorBars {
            lo: Some(ArrayData::Int(vec![1])),
            ..ErrorBars::default()
        };
        assert!(lo_only.validate(&writer, 1).is_err());

        let short = ErrorBars {
            hi: Some(ArrayData::Int(vec![1])),
            ..ErrorBars::default()
        };
        let err = short.validate(&writer, 3).unwrap_err();
        assert!(err.to_string().contains("expected 3"));

        let mismatched = ErrorBars {
            hi: Some(ArrayData::Int(vec![1])),
            lo: Some(ArrayData::Float(vec![1.0])),
            ..ErrorBars::default()
        };
        assert!(mismatched.validate(&writer, 1).is_err());
    }
}
