//! Growable output buffer with AMF write primitives.

use crate::{
    buffer::{AmfIo, U29_MAX},
    Error::Unencodable,
    Result,
};

/// An append-only output buffer for encoding AMF wire data.
///
/// The writer grows as needed, so unlike reads there is no bounds failure
/// mode; the only fallible primitive is [`Writer::put_u29`], whose domain is
/// capped at 29 bits by the wire format itself.
///
/// # Examples
///
/// ```rust
/// use amfwire::buffer::Writer;
///
/// let mut w = Writer::new();
/// w.put_u8(0x04);
/// w.put_u29(0x1000)?;
/// assert_eq!(w.finish(), vec![0x04, 0xA0, 0x00]);
/// # Ok::<(), amfwire::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Writer { data: Vec::new() }
    }

    /// Create a writer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a primitive value in big-endian byte order.
    pub fn put_be<T: AmfIo>(&mut self, value: T) {
        self.data.extend_from_slice(value.to_be_bytes().as_ref());
    }

    /// Append a primitive value in little-endian byte order.
    ///
    /// Only used by [`crate::ByteArray`] typed writes; AMF wire data itself is
    /// big-endian throughout.
    pub fn put_le<T: AmfIo>(&mut self, value: T) {
        self.data.extend_from_slice(value.to_le_bytes().as_ref());
    }

    /// Append an AMF3 variable-length unsigned 29-bit integer.
    ///
    /// Produces the shortest encoding: 1-3 bytes of 7 value bits each with a
    /// continuation flag in the high bit, or 4 bytes where the last byte
    /// carries 8 value bits.
    ///
    /// # Errors
    /// [`crate::Error::Unencodable`] when `value` exceeds the 29-bit domain.
    pub fn put_u29(&mut self, value: u32) -> Result<()> {
        match value {
            0..=0x7F => self.data.push(value as u8),
            0x80..=0x3FFF => {
                self.data.push((value >> 7 | 0x80) as u8);
                self.data.push((value & 0x7F) as u8);
            }
            0x4000..=0x001F_FFFF => {
                self.data.push((value >> 14 | 0x80) as u8);
                self.data.push((value >> 7 & 0x7F | 0x80) as u8);
                self.data.push((value & 0x7F) as u8);
            }
            0x0020_0000..=U29_MAX => {
                self.data.push((value >> 22 | 0x80) as u8);
                self.data.push((value >> 15 & 0x7F | 0x80) as u8);
                self.data.push((value >> 8 & 0x7F | 0x80) as u8);
                self.data.push((value & 0xFF) as u8);
            }
            _ => {
                return Err(Unencodable(format!(
                    "value 0x{value:x} exceeds the U29 domain"
                )))
            }
        }
        Ok(())
    }

    /// Consume the writer and return the accumulated bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.data
    }

    /// Borrow the accumulated bytes without consuming the writer.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}
