//! Random-access byte buffer with typed primitives and embedded AMF3.
//!
//! [`ByteArray`] models the Flash `flash.utils.ByteArray` surface: a growable
//! buffer with a read/write cursor, switchable endianness for every typed
//! primitive, length-prefixed UTF-8 helpers, and `read_object`/`write_object`
//! which run a complete embedded AMF3 pass against the buffer.
//!
//! On the wire a byte array is a single AMF3 value (marker `0x0C`), carried
//! opaquely: the outer pass never interprets the contents. The embedded
//! passes have their own [`Context`], lazily created against the global
//! registry and cleared before every object operation, so reference indices
//! inside the buffer are independent of any outer stream.

use std::sync::Arc;

use crate::{
    amf3,
    buffer::{AmfIo, Reader, Writer},
    codec::CodecOptions,
    context::Context,
    registry::Registry,
    Error::{Underrun, Unencodable},
    Result, Value,
};

/// Byte order applied to every typed [`ByteArray`] primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Network byte order, the Flash default.
    #[default]
    Big,
    /// Least-significant byte first.
    Little,
}

/// A cursor-addressed byte buffer in the Flash `ByteArray` shape.
///
/// Writes at the cursor overwrite existing content and grow the buffer as
/// needed; reads validate availability and fail with
/// [`crate::Error::Underrun`] rather than over-reading.
pub struct ByteArray {
    data: Vec<u8>,
    position: usize,
    endian: Endian,
    context: Option<Box<Context>>,
}

impl ByteArray {
    /// Create an empty buffer with the cursor at zero and big-endian order.
    #[must_use]
    pub fn new() -> Self {
        ByteArray {
            data: Vec::new(),
            position: 0,
            endian: Endian::Big,
            context: None,
        }
    }

    /// Wrap existing bytes; the cursor starts at zero.
    #[must_use]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        ByteArray {
            data,
            position: 0,
            endian: Endian::Big,
            context: None,
        }
    }

    /// The whole buffer, regardless of the cursor.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Buffer length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn bytes_available(&self) -> usize {
        self.data.len() - self.position
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when `position` is past the end.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Underrun);
        }
        self.position = position;
        Ok(())
    }

    /// The byte order applied to typed primitives.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Switch the byte order for subsequent typed primitives.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Drop the contents and reset the cursor.
    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    /// Whether the buffer starts with a zlib header.
    ///
    /// Flash byte arrays often carry `compress()`ed payloads; the standard
    /// zlib sniff is CMF byte `0x78` with a valid FCHECK so that the first
    /// two bytes are a multiple of 31. Detection only; this crate never
    /// inflates.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        match self.data.as_slice() {
            [b0 @ 0x78, b1, ..] => (u16::from(*b0) * 256 + u16::from(*b1)) % 31 == 0,
            _ => false,
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<&[u8]> {
        if len > self.bytes_available() {
            return Err(Underrun);
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    /// Read one typed primitive at the cursor in the current byte order.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when insufficient bytes remain.
    pub fn read<T: AmfIo>(&mut self) -> Result<T> {
        let endian = self.endian;
        let bytes = self.read_exact(std::mem::size_of::<T>())?;
        let Ok(bytes) = bytes.try_into() else {
            return Err(Underrun);
        };
        Ok(match endian {
            Endian::Big => T::from_be_bytes(bytes),
            Endian::Little => T::from_le_bytes(bytes),
        })
    }

    /// Read a single-byte boolean; any nonzero byte is `true`.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when no bytes remain.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read::<u8>()? != 0)
    }

    /// Read `len` raw bytes at the cursor.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.read_exact(len)?.to_vec())
    }

    /// Read a UTF-8 string prefixed with its u16 byte length.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] on truncation, [`crate::Error::Malformed`]
    /// on invalid UTF-8.
    pub fn read_utf(&mut self) -> Result<String> {
        let len = usize::from(self.read::<u16>()?);
        let bytes = self.read_exact(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("invalid UTF-8 in string body"))?;
        Ok(s.to_string())
    }

    /// Read `len` bytes of raw, unprefixed UTF-8 at the cursor.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] on truncation, [`crate::Error::Malformed`]
    /// on invalid UTF-8.
    pub fn read_utf_bytes(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_exact(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("invalid UTF-8 in string body"))?;
        Ok(s.to_string())
    }

    /// Write raw, unprefixed UTF-8 at the cursor.
    pub fn write_utf_bytes(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Write raw bytes at the cursor, overwriting existing content and
    /// growing the buffer as needed.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    /// Write one typed primitive at the cursor in the current byte order.
    pub fn write<T: AmfIo>(&mut self, value: T) {
        match self.endian {
            Endian::Big => {
                let bytes = value.to_be_bytes();
                self.write_bytes(bytes.as_ref());
            }
            Endian::Little => {
                let bytes = value.to_le_bytes();
                self.write_bytes(bytes.as_ref());
            }
        }
    }

    /// Write a single-byte boolean.
    pub fn write_bool(&mut self, value: bool) {
        self.write(u8::from(value));
    }

    /// Write a UTF-8 string prefixed with its u16 byte length.
    ///
    /// # Errors
    /// [`crate::Error::Unencodable`] when the string exceeds the u16 prefix.
    pub fn write_utf(&mut self, s: &str) -> Result<()> {
        let len = u16::try_from(s.len()).map_err(|_| {
            Unencodable(format!("string of {} bytes exceeds the u16 prefix", s.len()))
        })?;
        self.write(len);
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// Encode one value as embedded AMF3 at the cursor.
    ///
    /// Runs a complete AMF3 pass against the buffer's own context, so
    /// reference indices in the payload are independent of any outer stream.
    ///
    /// # Errors
    /// Any AMF3 encode error.
    pub fn write_object(&mut self, value: &Value) -> Result<()> {
        let opts = CodecOptions::default();
        let mut w = Writer::new();
        {
            let cx = self
                .context
                .get_or_insert_with(|| Box::new(Context::new(Registry::global(), false)));
            cx.clear();
            amf3::Encoder::new(cx, &opts).write_value(&mut w, value)?;
        }
        self.write_bytes(w.bytes());
        Ok(())
    }

    /// Decode one embedded AMF3 value at the cursor, advancing past it.
    ///
    /// # Errors
    /// Any AMF3 decode error; on [`crate::Error::Underrun`] the cursor is
    /// left where it was.
    pub fn read_object(&mut self) -> Result<Value> {
        let opts = CodecOptions::default();
        let cx = self
            .context
            .get_or_insert_with(|| Box::new(Context::new(Registry::global(), false)));
        cx.clear();
        let mut r = Reader::new(&self.data[self.position..]);
        let value = r.transactional(|r| amf3::Decoder::new(cx, &opts).read_value(r))?;
        self.position += r.pos();
        Ok(value)
    }
}

impl Default for ByteArray {
    fn default() -> Self {
        ByteArray::new()
    }
}

impl Clone for ByteArray {
    fn clone(&self) -> Self {
        // The embedded context is per-instance scratch state; clones start
        // without one.
        ByteArray {
            data: self.data.clone(),
            position: self.position,
            endian: self.endian,
            context: None,
        }
    }
}

impl PartialEq for ByteArray {
    fn eq(&self, other: &Self) -> bool {
        // Contents only; cursor, endianness and scratch context are
        // per-instance state, not identity.
        self.data == other.data
    }
}

impl std::fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteArray")
            .field("len", &self.data.len())
            .field("position", &self.position)
            .field("endian", &self.endian)
            .field("compressed", &self.is_compressed())
            .finish()
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(data: Vec<u8>) -> Self {
        ByteArray::from_bytes(data)
    }
}

impl From<&[u8]> for ByteArray {
    fn from(data: &[u8]) -> Self {
        ByteArray::from_bytes(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Object;

    #[test]
    fn typed_primitives_honor_endianness() {
        let mut ba = ByteArray::new();
        ba.write(0x0102u16);
        ba.set_endian(Endian::Little);
        ba.write(0x0102u16);
        assert_eq!(ba.bytes(), [0x01, 0x02, 0x02, 0x01]);

        ba.seek(0).unwrap();
        ba.set_endian(Endian::Big);
        assert_eq!(ba.read::<u16>().unwrap(), 0x0102);
        ba.set_endian(Endian::Little);
        assert_eq!(ba.read::<u16>().unwrap(), 0x0102);
    }

    #[test]
    fn reads_past_the_end_are_underruns() {
        let mut ba = ByteArray::from_bytes(vec![0x01]);
        assert!(matches!(ba.read::<u32>(), Err(Underrun)));
        // Failed read does not move the cursor.
        assert_eq!(ba.position(), 0);
        assert_eq!(ba.read::<u8>().unwrap(), 0x01);
        assert!(ba.seek(2).is_err());
    }

    #[test]
    fn writes_overwrite_in_place_and_grow() {
        let mut ba = ByteArray::from_bytes(vec![0xAA, 0xBB, 0xCC]);
        ba.seek(1).unwrap();
        ba.write_bytes(&[0x01, 0x02, 0x03]);
        assert_eq!(ba.bytes(), [0xAA, 0x01, 0x02, 0x03]);
        assert_eq!(ba.position(), 4);
    }

    #[test]
    fn utf_round_trip() {
        let mut ba = ByteArray::new();
        ba.write_utf("héllo").unwrap();
        ba.seek(0).unwrap();
        assert_eq!(ba.read_utf().unwrap(), "héllo");
    }

    #[test]
    fn embedded_object_round_trip() {
        let mut obj = Object::new();
        obj.set("n", Value::Int(42));
        let value = Value::object(obj);

        let mut ba = ByteArray::new();
        ba.write_object(&value).unwrap();
        ba.seek(0).unwrap();
        assert_eq!(ba.read_object().unwrap(), value);
        assert_eq!(ba.bytes_available(), 0);
    }

    #[test]
    fn embedded_references_reset_between_objects() {
        let shared = Value::array(vec![Value::Int(1)]);
        let mut ba = ByteArray::new();
        ba.write_object(&shared).unwrap();
        let first_len = ba.len();
        ba.write_object(&shared).unwrap();
        // A fresh pass per object: the second write is a full inline array,
        // not a back-reference into the first.
        assert_eq!(ba.len(), first_len * 2);
    }

    #[test]
    fn truncated_embedded_object_restores_the_cursor() {
        let mut full = ByteArray::new();
        full.write_object(&Value::array(vec![Value::Int(1), Value::Int(2)]))
            .unwrap();
        let bytes = full.into_bytes();

        let mut ba = ByteArray::from_bytes(bytes[..bytes.len() - 1].to_vec());
        let err = ba.read_object().unwrap_err();
        assert!(err.is_underrun());
        assert_eq!(ba.position(), 0);
    }

    #[test]
    fn zlib_sniff() {
        assert!(ByteArray::from_bytes(vec![0x78, 0x9C, 0x01]).is_compressed());
        assert!(ByteArray::from_bytes(vec![0x78, 0xDA]).is_compressed());
        assert!(!ByteArray::from_bytes(vec![0x78, 0x9D]).is_compressed());
        assert!(!ByteArray::from_bytes(vec![0x79, 0x9C]).is_compressed());
        assert!(!ByteArray::new().is_compressed());
    }

    #[test]
    fn equality_ignores_cursor_state() {
        let mut a = ByteArray::from_bytes(vec![1, 2, 3]);
        let b = ByteArray::from_bytes(vec![1, 2, 3]);
        a.seek(2).unwrap();
        a.set_endian(Endian::Little);
        assert_eq!(a, b);
        assert_ne!(a, ByteArray::from_bytes(vec![1, 2]));
    }
}
