//! Big-endian primitive writer and reader.
//!
//! ```text
//! i8/u8      1 byte
//! i16/u16    2 bytes
//! i32/u32    4 bytes   (bool travels as i32)
//! f32        4 bytes
//! i64/u64    8 bytes
//! f64        8 bytes
//! string     u32 length + bytes        (capped per field)
//! array      u32 count + count*width
//! ```
//!
//! Both sides carry a *section* code (one of the protocol codes 61..65)
//! so a failure deep inside a block is reported against the block being
//! transferred.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{protocol_codes, Result, UdaError};

/// A fixed-width element that can be written to and read from the wire.
pub trait WireElement: Copy + Default + PartialEq + fmt::Debug {
    /// Bytes per element on the wire.
    const WIDTH: usize;

    fn put(self, buf: &mut BytesMut);

    /// Read one element. The caller guarantees `WIDTH` bytes remain.
    fn get(buf: &mut Bytes) -> Self;
}

macro_rules! wire_element {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl WireElement for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn put(self, buf: &mut BytesMut) {
                    buf.$put(self)
                }

                #[inline]
                fn get(buf: &mut Bytes) -> Self {
                    buf.$get()
                }
            }
        )*
    };
}

wire_element! {
    i8 => put_i8, get_i8;
    u8 => put_u8, get_u8;
    i16 => put_i16, get_i16;
    u16 => put_u16, get_u16;
    i32 => put_i32, get_i32;
    u32 => put_u32, get_u32;
    i64 => put_i64, get_i64;
    u64 => put_u64, get_u64;
    f32 => put_f32, get_f32;
    f64 => put_f64, get_f64;
}

/// Serializes primitives into a growable buffer.
#[derive(Debug)]
pub struct WireWriter {
    buf: BytesMut,
    section: i32,
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
            section: protocol_codes::STATE,
        }
    }

    /// Set the protocol code reported by subsequent failures.
    pub fn set_section(&mut self, code: i32) {
        self.section = code;
    }

    pub fn section(&self) -> i32 {
        self.section
    }

    #[inline]
    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    #[inline]
    pub fn put_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    #[inline]
    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_i32(i32::from(value));
    }

    /// Write a length-prefixed string of at most `max` bytes.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the string is longer than `max`.
    pub fn put_string(&mut self, value: &str, max: usize) -> Result<()> {
        if value.len() > max {
            return Err(self.error(format!(
                "String of {} bytes exceeds the {} byte limit",
                value.len(),
                max
            )));
        }
        self.put_count(value.len())?;
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Write a count-prefixed array of fixed-width elements.
    pub fn put_elements<T: WireElement>(&mut self, values: &[T]) -> Result<()> {
        self.put_count(values.len())?;
        self.buf.reserve(values.len() * T::WIDTH);
        for value in values {
            value.put(&mut self.buf);
        }
        Ok(())
    }

    /// Write a count-prefixed byte blob.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_count(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write a `u32` count.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when `count` does not fit in 32 bits.
    pub fn put_count(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| self.error(format!("Count {} does not fit the wire", count)))?;
        self.buf.put_u32(count);
        Ok(())
    }

    /// Build a protocol error in the current section.
    pub fn error(&self, message: impl Into<String>) -> UdaError {
        UdaError::protocol(self.section, message)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing and hand the bytes over.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Deserializes primitives from a byte buffer.
///
/// Every read checks the remaining length first; a short buffer is a
/// protocol error, never a panic.
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    section: i32,
}

impl WireReader {
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf,
            section: protocol_codes::STATE,
        }
    }

    /// Set the protocol code reported by subsequent failures.
    pub fn set_section(&mut self, code: i32) {
        self.section = code;
    }

    pub fn section(&self) -> i32 {
        self.section
    }

    /// Build a protocol error in the current section.
    pub fn error(&self, message: impl Into<String>) -> UdaError {
        UdaError::protocol(self.section, message)
    }

    fn need(&self, bytes: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < bytes {
            return Err(self.error(format!(
                "Truncated {}: need {} bytes, {} remain",
                what,
                bytes,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.need(4, "i32")?;
        Ok(self.buf.get_i32())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4, "u32")?;
        Ok(self.buf.get_u32())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.need(8, "f64")?;
        Ok(self.buf.get_f64())
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_i32()? != 0)
    }

    /// Read a `u32` count as `usize`.
    pub fn get_count(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }

    /// Read a length-prefixed string of at most `max` bytes.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on truncation, on a length above `max`, or
    /// when the bytes are not UTF-8.
    pub fn get_string(&mut self, max: usize) -> Result<String> {
        let len = self.get_count()?;
        if len > max {
            return Err(self.error(format!(
                "String length {} exceeds the {} byte limit",
                len, max
            )));
        }
        self.need(len, "string")?;
        let bytes = self.buf.split_to(len);
        String::from_utf8(bytes.to_vec())
            .map_err(|e| self.error(format!("String is not UTF-8: {}", e)))
    }

    /// Read a count-prefixed array whose count must equal `expected`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the transmitted count disagrees with
    /// the count declared by the enclosing block, or on truncation.
    pub fn get_elements<T: WireElement>(&mut self, expected: usize) -> Result<Vec<T>> {
        let count = self.get_count()?;
        if count != expected {
            return Err(self.error(format!(
                "Element count mismatch: header declares {}, payload carries {}",
                expected, count
            )));
        }
        let bytes = count
            .checked_mul(T::WIDTH)
            .ok_or_else(|| self.error(format!("Element count {} overflows", count)))?;
        self.need(bytes, "array")?;
        Ok((0..count).map(|_| T::get(&mut self.buf)).collect())
    }

    /// Read a count-prefixed byte blob.
    pub fn get_bytes(&mut self) -> Result<Bytes> {
        let len = self.get_count()?;
        self.need(len, "byte blob")?;
        Ok(self.buf.split_to(len))
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }
}
