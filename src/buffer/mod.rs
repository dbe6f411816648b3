//! Bounds-checked binary reading and writing for AMF wire data.
//!
//! This module is the foundation every codec component builds on. It provides
//! a cursor-based [`Reader`] over borrowed bytes, a growable [`Writer`], and
//! the [`AmfIo`] trait unifying endian-aware conversion for the primitive
//! types AMF puts on the wire.
//!
//! # Architecture
//!
//! - [`AmfIo`] - trait for fixed-width primitive conversion at both endiannesses
//! - [`Reader`] - position-tracking parser with bounds checking and cursor restore
//! - [`Writer`] - append-only output buffer with the matching write primitives
//!
//! AMF is a network format: all multi-byte integers and floats are big-endian.
//! Little-endian support exists because [`crate::ByteArray`] exposes a
//! switchable endianness to application code.
//!
//! # Failure semantics
//!
//! Every read that would pass the end of the buffer fails with
//! [`crate::Error::Underrun`] before touching any byte. There are no partial
//! reads and no panics on truncated input; [`Reader::transactional`] restores
//! the cursor when a closure fails, which is what lets a streaming caller
//! buffer more data and retry a truncated element.

mod io;
mod reader;
mod writer;

pub use io::AmfIo;
pub use reader::Reader;
pub use writer::Writer;

/// Maximum value representable by an AMF3 variable-length U29 integer.
pub const U29_MAX: u32 = 0x1FFF_FFFF;
