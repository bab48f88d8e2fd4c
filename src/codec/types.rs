//! Element types and typed arrays.
//!
//! [`DataType`] is the wire discriminant. [`ArrayData`] is the closed sum
//! over every element type that travels as a flat vector; its variants
//! share their names with the matching `DataType` variants, and the
//! per-type encode/decode/length operations are generated from a single
//! table so there is exactly one place listing the element types.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::xdr::{WireElement, WireReader, WireWriter};
use crate::error::Result;

/// Wire element type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Unknown = 0,
    Char = 1,
    Short = 2,
    Int = 3,
    UnsignedInt = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    UnsignedChar = 8,
    UnsignedShort = 9,
    UnsignedLong = 10,
    Long64 = 11,
    UnsignedLong64 = 12,
    Complex = 13,
    DComplex = 14,
    Undefined = 15,
    Vlen = 16,
    String = 17,
    Compound = 18,
    Opaque = 19,
    Enum = 20,
    Void = 21,
    Capnp = 22,
}

const ALL_TYPES: [DataType; 23] = [
    DataType::Unknown,
    DataType::Char,
    DataType::Short,
    DataType::Int,
    DataType::UnsignedInt,
    DataType::Long,
    DataType::Float,
    DataType::Double,
    DataType::UnsignedChar,
    DataType::UnsignedShort,
    DataType::UnsignedLong,
    DataType::Long64,
    DataType::UnsignedLong64,
    DataType::Complex,
    DataType::DComplex,
    DataType::Undefined,
    DataType::Vlen,
    DataType::String,
    DataType::Compound,
    DataType::Opaque,
    DataType::Enum,
    DataType::Void,
    DataType::Capnp,
];

impl DataType {
    /// Look up a wire discriminant.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| ALL_TYPES.get(i).copied())
    }

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DataType::Complex | DataType::DComplex)
    }

    /// Bytes per element on the wire, 0 for types without a flat vector.
    pub fn element_width(self) -> usize {
        match self {
            DataType::Char | DataType::UnsignedChar | DataType::String | DataType::Capnp => 1,
            DataType::Short | DataType::UnsignedShort => 2,
            DataType::Int | DataType::UnsignedInt | DataType::Float => 4,
            DataType::Long
            | DataType::UnsignedLong
            | DataType::Long64
            | DataType::UnsignedLong64
            | DataType::Double
            | DataType::Complex => 8,
            DataType::DComplex => 16,
            _ => 0,
        }
    }

    /// Whether values of this type travel as a flat [`ArrayData`] vector.
    pub fn is_flat(self) -> bool {
        self.element_width() > 0
    }
}

/// Read a type discriminant, rejecting unknown codes.
pub(crate) fn get_data_type(reader: &mut WireReader) -> Result<DataType> {
    let code = reader.get_i32()?;
    DataType::from_code(code)
        .ok_or_else(|| reader.error(format!("Unknown data type discriminant {}", code)))
}

/// A complex number; travels as interleaved real and imaginary parts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex<T> {
    pub real: T,
    pub imaginary: T,
}

impl<T> Complex<T> {
    pub fn new(real: T, imaginary: T) -> Self {
        Self { real, imaginary }
    }
}

impl<T: WireElement> WireElement for Complex<T> {
    const WIDTH: usize = 2 * T::WIDTH;

    fn put(self, buf: &mut BytesMut) {
        self.real.put(buf);
        self.imaginary.put(buf);
    }

    fn get(buf: &mut Bytes) -> Self {
        let real = T::get(buf);
        let imaginary = T::get(buf);
        Self { real, imaginary }
    }
}

macro_rules! array_types {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A typed vector of elements.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum ArrayData {
            $($variant(Vec<$ty>),)*
        }

        impl ArrayData {
            /// Wire type of the elements.
            pub fn data_type(&self) -> DataType {
                match self {
                    $(ArrayData::$variant(_) => DataType::$variant,)*
                }
            }

            /// Number of elements (complex values count once).
            pub fn len(&self) -> usize {
                match self {
                    $(ArrayData::$variant(values) => values.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Write the count-prefixed elements.
            pub fn encode(&self, writer: &mut WireWriter) -> Result<()> {
                match self {
                    $(ArrayData::$variant(values) => writer.put_elements(values),)*
                }
            }

            /// Read `count` elements of `data_type`.
            ///
            /// # Errors
            ///
            /// Returns a protocol error when `data_type` has no flat
            /// representation, on a count mismatch, or on truncation.
            pub fn decode(reader: &mut WireReader, data_type: DataType, count: usize) -> Result<Self> {
                match data_type {
                    $(DataType::$variant => reader.get_elements::<$ty>(count).map(ArrayData::$variant),)*
                    other => Err(reader.error(format!("{:?} elements have no flat encoding", other))),
                }
            }

            /// A vector of `count` default elements, `None` for non-flat types.
            pub fn zeroed(data_type: DataType, count: usize) -> Option<Self> {
                match data_type {
                    $(DataType::$variant => Some(ArrayData::$variant(vec![<$ty>::default(); count])),)*
                    _ => None,
                }
            }
        }
    };
}

array_types! {
    Char(i8),
    Short(i16),
    Int(i32),
    UnsignedInt(u32),
    Long(i64),
    Float(f32),
    Double(f64),
    UnsignedChar(u8),
    UnsignedShort(u16),
    UnsignedLong(u64),
    Long64(i64),
    UnsignedLong64(u64),
    Complex(Complex<f32>),
    DComplex(Complex<f64>),
    String(u8),
    Capnp(u8),
}
