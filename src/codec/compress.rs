//! Dimension compression and reconstruction.

use super::dimension::{DimValues, Dimension};
use super::types::ArrayData;
use super::xdr::WireElement;
use crate::error::{protocol_codes, Result, UdaError};

/// Element types that support coordinate arithmetic.
pub trait Numeric: WireElement {
    /// Largest difference between consecutive steps still treated as equal.
    const PRECISION: f64;

    /// Largest magnitude `to_f64` represents exactly.
    const EXACT_LIMIT: f64;

    fn to_f64(self) -> f64;

    /// Convert back, truncating toward zero for integer types.
    fn from_f64(value: f64) -> Self;
}

macro_rules! numeric {
    ($($ty:ty => $precision:expr, $limit:expr;)*) => {
        $(
            impl Numeric for $ty {
                const PRECISION: f64 = $precision;
                const EXACT_LIMIT: f64 = $limit;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

/// 2^53: integers beyond this lose precision as f64.
const F64_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

numeric! {
    i8 => 0.0, f64::INFINITY;
    u8 => 0.0, f64::INFINITY;
    i16 => 0.0, f64::INFINITY;
    u16 => 0.0, f64::INFINITY;
    i32 => 0.0, f64::INFINITY;
    u32 => 0.0, f64::INFINITY;
    i64 => 0.0, F64_INTEGER_LIMIT;
    u64 => 0.0, F64_INTEGER_LIMIT;
    f32 => f32::EPSILON as f64, f64::INFINITY;
    f64 => f64::EPSILON, f64::INFINITY;
}

/// Visit the numeric variants of an [`ArrayData`]; everything else takes
/// the fallback arm.
macro_rules! with_numeric {
    ($array:expr, $values:ident => $body:expr, _ => $otherwise:expr) => {
        match $array {
            ArrayData::Char($values) => $body,
            ArrayData::Short($values) => $body,
            ArrayData::Int($values) => $body,
            ArrayData::UnsignedInt($values) => $body,
            ArrayData::Long($values) => $body,
            ArrayData::Float($values) => $body,
            ArrayData::Double($values) => $body,
            ArrayData::UnsignedChar($values) => $body,
            ArrayData::UnsignedShort($values) => $body,
            ArrayData::UnsignedLong($values) => $body,
            ArrayData::Long64($values) => $body,
            ArrayData::UnsignedLong64($values) => $body,
            _ => $otherwise,
        }
    };
}

/// `(first, mean step)` when consecutive steps are constant within the
/// element type's precision. Values f64 cannot hold exactly never fit.
fn linear_fit<T: Numeric>(values: &[T]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 3 || values.iter().any(|v| v.to_f64().abs() > T::EXACT_LIMIT) {
        return None;
    }
    let first = values[0].to_f64();
    let mean = T::from_f64((values[n - 1].to_f64() - first) / (n - 1) as f64).to_f64();

    let mut previous = values[1].to_f64() - first;
    for pair in values.windows(2) {
        let step = pair[1].to_f64() - pair[0].to_f64();
        if (step - previous).abs() > T::PRECISION {
            return None;
        }
        previous = step;
    }
    Some((first, mean))
}

/// Replace a regular literal axis by its method-0 form.
///
/// Axes shorter than three values, irregular axes, axes that are already
/// compressed and non-numeric (including complex) axes are left alone.
/// Returns whether the dimension was compressed.
pub fn compress_dim(dim: &mut Dimension) -> bool {
    let DimValues::Literal(values) = &dim.values else {
        return false;
    };
    let fit = with_numeric!(values, v => linear_fit(v.as_slice()), _ => None);
    let Some((dim0, diff)) = fit else {
        return false;
    };
    tracing::debug!(n = dim.dim_n, dim0, diff, "dimension compressed");
    dim.values = DimValues::Linear { dim0, diff };
    true
}

fn as_f64(array: &ArrayData) -> Option<Vec<f64>> {
    with_numeric!(array, v => Some(v.iter().map(|x| x.to_f64()).collect()), _ => None)
}

fn fill<T: Numeric>(target: &mut [T], source: &[f64]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t = T::from_f64(*s);
    }
}

fn dimension_error(message: impl Into<String>) -> UdaError {
    UdaError::protocol(protocol_codes::DIMENSION, message)
}

/// Reconstruct the literal coordinate values of a dimension.
///
/// # Errors
///
/// Returns a protocol error when a compressed axis is not numeric or when
/// the compressed form does not produce exactly `dim_n` values.
pub fn decompress_dim(dim: &Dimension) -> Result<ArrayData> {
    let values: Vec<f64> = match &dim.values {
        DimValues::Literal(values) => return Ok(values.clone()),
        DimValues::Linear { dim0, diff } => {
            let mut out = Vec::with_capacity(dim.dim_n);
            let mut value = *dim0;
            for _ in 0..dim.dim_n {
                out.push(value);
                value += diff;
            }
            out
        }
        DimValues::Domains {
            samples,
            offsets,
            intervals,
        } => {
            let (Some(offsets), Some(intervals)) = (as_f64(offsets), as_f64(intervals)) else {
                return Err(dimension_error("Domain offsets and intervals must be numeric"));
            };
            let mut out = Vec::with_capacity(dim.dim_n);
            for ((run, offset), interval) in samples.iter().zip(offsets).zip(intervals) {
                out.extend((0..(*run).max(0)).map(|j| offset + f64::from(j) * interval));
            }
            out
        }
        DimValues::Offsets(offsets) => {
            as_f64(offsets).ok_or_else(|| dimension_error("Dimension offsets must be numeric"))?
        }
        DimValues::Arithmetic {
            count,
            offset,
            interval,
        } => {
            let (Some(offset), Some(interval)) = (as_f64(offset), as_f64(interval)) else {
                return Err(dimension_error("Arithmetic offset and interval must be numeric"));
            };
            let (Some(offset), Some(interval)) = (offset.first(), interval.first()) else {
                return Err(dimension_error("Arithmetic dimension without offset or interval"));
            };
            (0..*count).map(|i| offset + f64::from(i) * interval).collect()
        }
    };

    if values.len() != dim.dim_n {
        return Err(dimension_error(format!(
            "Decompressed {} values, dim_n is {}",
            values.len(),
            dim.dim_n
        )));
    }

    let mut array = ArrayData::zeroed(dim.data_type, dim.dim_n)
        .ok_or_else(|| dimension_error(format!("{:?} dimensions cannot be decompressed", dim.data_type)))?;
    with_numeric!(&mut array, v => fill(v.as_mut_slice(), &values), _ => {
        return Err(dimension_error(format!("{:?} dimensions cannot be decompressed", dim.data_type)))
    });
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;

    #[test]
    fn test_regular_axis_compressed() {
        let mut dim = Dimension::literal(ArrayData::Double(vec![1.0, 1.5, 2.0, 2.5]));
        assert!(compress_dim(&mut dim));
        assert_eq!(dim.values, DimValues::Linear { dim0: 1.0, diff: 0.5 });
        assert_eq!(
            decompress_dim(&dim).unwrap(),
            ArrayData::Double(vec![1.0, 1.5, 2.0, 2.5])
        );
    }

    #[test]
    fn test_integer_axis() {
        let mut dim = Dimension::literal(ArrayData::Int(vec![10, 7, 4, 1]));
        assert!(compress_dim(&mut dim));
        assert_eq!(dim.values, DimValues::Linear { dim0: 10.0, diff: -3.0 });
        assert_eq!(decompress_dim(&dim).unwrap(), ArrayData::Int(vec![10, 7, 4, 1]));
    }

    #[test]
    fn test_wide_integers_stay_literal() {
        // steps of 1 near 2^60 all round to the same f64 step
        let base = 1i64 << 60;
        let mut dim = Dimension::literal(ArrayData::Long64(vec![base, base + 1, base + 3, base + 4]));
        assert!(!compress_dim(&mut dim));
        assert!(matches!(dim.values, DimValues::Literal(_)));

        let mut small = Dimension::literal(ArrayData::UnsignedLong64(vec![5, 10, 15]));
        assert!(compress_dim(&mut small));
        assert_eq!(decompress_dim(&small).unwrap(), ArrayData::UnsignedLong64(vec![5, 10, 15]));
    }

    #[test]
    fn test_three_values_is_enough() {
        let mut dim = Dimension::literal(ArrayData::UnsignedShort(vec![0, 2, 4]));
        assert!(compress_dim(&mut dim));
    }

    #[test]
    fn test_not_compressed() {
        let mut short = Dimension::literal(ArrayData::Float(vec![0.0, 1.0]));
        assert!(!compress_dim(&mut short));

        let mut irregular = Dimension::literal(ArrayData::Int(vec![0, 1, 3, 4]));
        assert!(!compress_dim(&mut irregular));
        assert!(matches!(irregular.values, DimValues::Literal(_)));

        let mut text = Dimension::literal(ArrayData::String(b"abc".to_vec()));
        assert!(!compress_dim(&mut text));

        let mut already = Dimension::index(10);
        assert!(!compress_dim(&mut already));
    }

    #[test]
    fn test_decompress_domains() {
        let dim = Dimension {
            data_type: DataType::Float,
            dim_n: 5,
            values: DimValues::Domains {
                samples: vec![3, 2],
                offsets: ArrayData::Float(vec![0.0, 10.0]),
                intervals: ArrayData::Float(vec![1.0, 0.5]),
            },
            ..Dimension::index(0)
        };
        assert_eq!(
            decompress_dim(&dim).unwrap(),
            ArrayData::Float(vec![0.0, 1.0, 2.0, 10.0, 10.5])
        );
    }

    #[test]
    fn test_decompress_offsets_and_arithmetic() {
        let offsets = Dimension {
            data_type: DataType::Long,
            dim_n: 3,
            values: DimValues::Offsets(ArrayData::Long(vec![5, -1, 12])),
            ..Dimension::index(0)
        };
        assert_eq!(decompress_dim(&offsets).unwrap(), ArrayData::Long(vec![5, -1, 12]));

        let arithmetic = Dimension {
            data_type: DataType::Double,
            dim_n: 4,
            values: DimValues::Arithmetic {
                count: 4,
                offset: ArrayData::Double(vec![1.0]),
                interval: ArrayData::Double(vec![0.25]),
            },
            ..Dimension::index(0)
        };
        assert_eq!(
            decompress_dim(&arithmetic).unwrap(),
            ArrayData::Double(vec![1.0, 1.25, 1.5, 1.75])
        );
    }

    #[test]
    fn test_decompress_length_mismatch() {
        let dim = Dimension {
            data_type: DataType::Int,
            dim_n: 4,
            values: DimValues::Offsets(ArrayData::Int(vec![1, 2])),
            ..Dimension::index(0)
        };
        let err = decompress_dim(&dim).unwrap_err();
        assert_eq!(err.code(), protocol_codes::DIMENSION);
    }

    #[test]
    fn test_index_axis() {
        assert_eq!(
            decompress_dim(&Dimension::index(4)).unwrap(),
            ArrayData::Int(vec![0, 1, 2, 3])
        );
    }
}
