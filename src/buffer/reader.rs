//! Cursor-based bounds-checked reader over borrowed wire bytes.

use crate::{buffer::AmfIo, Error::Underrun, Result};

/// A position-tracking binary reader for AMF wire data.
///
/// `Reader` provides a cursor-based interface for reading binary data in both
/// big-endian and little-endian formats. It is designed for decoding AMF0 and
/// AMF3 streams: every access validates availability before reading, truncated
/// input surfaces as [`crate::Error::Underrun`], and [`Reader::transactional`]
/// restores the cursor when a decode attempt fails so streaming callers can
/// retry the same element after buffering more bytes.
///
/// # Examples
///
/// ```rust
/// use amfwire::buffer::Reader;
///
/// let data = [0x00, 0x2A, 0x84, 0x80, 0x80, 0x00];
/// let mut r = Reader::new(&data);
///
/// let marker: u16 = r.read_be()?;
/// assert_eq!(marker, 0x2A);
///
/// // AMF3 variable-length integer: 4 bytes, value 0x1000000
/// assert_eq!(r.read_u29()?, 0x0100_0000);
/// assert_eq!(r.remaining(), 0);
/// # Ok::<(), amfwire::Error>(())
/// ```
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader over `data` with the cursor at the start.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Current cursor position in bytes from the start of the buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes remaining after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when `pos` is past the end of the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Underrun);
        }
        self.pos = pos;
        Ok(())
    }

    /// Read a single byte and advance the cursor.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when no bytes remain.
    pub fn read_u8(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(b) => {
                self.pos += 1;
                Ok(*b)
            }
            None => Err(Underrun),
        }
    }

    /// Look at the next byte without advancing the cursor.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when no bytes remain.
    pub fn peek_u8(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or(Underrun)
    }

    /// Read `len` raw bytes and advance the cursor.
    ///
    /// The length is validated against the remaining buffer before any slice
    /// is taken, so a wire-supplied length can never cause an over-read.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Underrun);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a primitive value in big-endian byte order and advance the cursor.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when insufficient bytes remain.
    pub fn read_be<T: AmfIo>(&mut self) -> Result<T> {
        let len = std::mem::size_of::<T>();
        let Ok(bytes) = self.read_bytes(len)?.try_into() else {
            return Err(Underrun);
        };
        Ok(T::from_be_bytes(bytes))
    }

    /// Read a primitive value in little-endian byte order and advance the cursor.
    ///
    /// AMF wire data is big-endian throughout; this exists for the switchable
    /// endianness of [`crate::ByteArray`] typed reads.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when insufficient bytes remain.
    pub fn read_le<T: AmfIo>(&mut self) -> Result<T> {
        let len = std::mem::size_of::<T>();
        let Ok(bytes) = self.read_bytes(len)?.try_into() else {
            return Err(Underrun);
        };
        Ok(T::from_le_bytes(bytes))
    }

    /// Read an AMF3 variable-length unsigned 29-bit integer.
    ///
    /// U29 values are big-endian base-128 groups: the high bit of each of the
    /// first up-to-three bytes is a continuation flag contributing 7 value
    /// bits, and a fourth byte, when present, contributes a full 8 bits.
    /// The encoding is 1-4 bytes for the unsigned range `0..2^29`.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when the encoding is truncated.
    pub fn read_u29(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..3 {
            let byte = u32::from(self.read_u8()?);
            if byte & 0x80 == 0 {
                return Ok(value << 7 | byte);
            }
            value = value << 7 | (byte & 0x7F);
        }
        let byte = u32::from(self.read_u8()?);
        Ok(value << 8 | byte)
    }

    /// Run `f` against this reader, restoring the cursor if it fails.
    ///
    /// This is the recovery seam for streaming decode: a truncated element
    /// fails with [`crate::Error::Underrun`] partway through its body, and the
    /// restored cursor lets the caller retry the whole element once more
    /// input has arrived.
    ///
    /// # Errors
    /// Whatever `f` returns; the cursor is restored on any error.
    pub fn transactional<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mark = self.pos;
        let result = f(self);
        if result.is_err() {
            self.pos = mark;
        }
        result
    }
}
