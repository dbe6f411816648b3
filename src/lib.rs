// Copyright 2025 The amfwire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # amfwire
//!
//! A codec for Action Message Format, the binary object-graph serialization
//! used by Flash remoting and RTMP. `amfwire` speaks both wire dialects,
//! AMF0 and AMF3, and round-trips full object graphs: typed and anonymous
//! objects, cyclic references, dates, XML, raw byte buffers and the flex
//! collection envelopes.
//!
//! ## Features
//!
//! - **Both dialects** - AMF0 with its fixed-width legacy layout, AMF3 with
//!   U29 varints, string tables and traits tables, and the `0x11` escape
//!   that lets one AMF0 stream carry AMF3 values
//! - **Identity-preserving graphs** - reference tables track every compound
//!   value per pass, so shared and cyclic structures encode once and decode
//!   back to aliased allocations
//! - **Class aliasing** - a registry maps application classes to wire names
//!   with static/dynamic/excluded/readonly attribute metadata, inheritance,
//!   renames and externally-serialized classes
//! - **Streaming decode** - a lazy iterator that treats truncated input as a
//!   recoverable condition with a resume offset, not an error state
//! - **`ByteArray`** - the Flash random-access buffer with switchable
//!   endianness and embedded AMF3 passes
//!
//! ## Quick Start
//!
//! ```rust
//! use amfwire::{decode, encode, AmfVersion, Value};
//!
//! let values = vec![Value::from("hello"), Value::Int(42)];
//! let bytes = encode(&values, AmfVersion::Amf3)?;
//!
//! let decoded: Vec<Value> = decode(&bytes, AmfVersion::Amf3).collect::<amfwire::Result<_>>()?;
//! assert_eq!(decoded, values);
//! # Ok::<(), amfwire::Error>(())
//! ```
//!
//! ### Typed objects
//!
//! Classes are registered up front; instances then travel under their wire
//! alias with the declared attribute contract enforced in both directions:
//!
//! ```rust
//! use amfwire::{AmfVersion, ClassDef, CodecOptions, Object, Registry, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::with_defaults());
//! registry.register_class(
//!     ClassDef::new("com.example.User")
//!         .alias("user")
//!         .static_attrs(["name", "email"])
//!         .dynamic(false),
//! )?;
//!
//! let mut user = Object::typed("com.example.User");
//! user.set("name", Value::from("ada"));
//! user.set("email", Value::from("ada@example.com"));
//!
//! let opts = CodecOptions { registry, ..CodecOptions::default() };
//! let bytes = amfwire::encode_with(&[Value::object(user)], AmfVersion::Amf3, &opts)?;
//! assert!(!bytes.is_empty());
//! # Ok::<(), amfwire::Error>(())
//! ```
//!
//! ### Streaming
//!
//! Decoding never reads past the current element; a truncated element is
//! reported as [`Error::Underrun`] with the cursor restored, so callers
//! receiving data incrementally can buffer more and resume:
//!
//! ```rust
//! use amfwire::{decode, AmfVersion};
//!
//! let mut stream = decode(&[0x04, 0x07, 0x09], AmfVersion::Amf3);
//! assert!(stream.next().unwrap().is_ok()); // integer 7
//! let err = stream.next().unwrap().unwrap_err();
//! assert!(err.is_underrun());
//! assert_eq!(stream.position(), 2); // resume offset once more bytes arrive
//! ```
//!
//! ## Architecture
//!
//! - [`codec`] - the [`encode`] / [`decode`] entry points, [`CodecOptions`]
//!   and the lazy [`Decoded`] iterator
//! - [`amf0`] / [`amf3`] - the two wire dialects
//! - [`value`] - the [`Value`] object-graph model
//! - [`alias`] / [`registry`] - class aliasing and the converter seams
//! - [`context`] - per-pass reference tables
//! - [`buffer`] - bounds-checked binary primitives and the U29 varint
//! - [`bytearray`] - the Flash `ByteArray` surface

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust
/// use amfwire::prelude::*;
///
/// let bytes = encode(&[Value::Int(1)], AmfVersion::Amf3)?;
/// # Ok::<(), amfwire::Error>(())
/// ```
pub mod prelude;

pub mod alias;
pub mod amf0;
pub mod amf3;
pub mod buffer;
pub mod bytearray;
pub mod codec;
pub mod context;
pub mod flex;
pub mod registry;
pub mod value;

use std::sync::Arc;

pub use alias::{AliasStrategy, ClassAlias, ClassDef, ExternalHooks};
pub use bytearray::{ByteArray, Endian};
pub use codec::{
    decode, decode_with, encode, encode_any, encode_any_with, encode_with, to_value, AmfVersion,
    CodecOptions, Decoded,
};
pub use error::{Error, ReferenceKind};
pub use registry::{ConverterHandle, Registry};
pub use value::{MixedArray, Object, Value, Xml};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Register a class definition on the global registry.
///
/// Convenience for [`Registry::register_class`] on [`Registry::global`];
/// passes that carry no explicit registry in their [`CodecOptions`] resolve
/// against the same instance.
///
/// # Errors
/// [`Error::DuplicateClass`] or [`Error::Registration`].
pub fn register_class(def: ClassDef) -> Result<Arc<ClassAlias>> {
    Registry::global().register_class(def)
}

/// Remove a registration from the global registry by class or alias name.
///
/// # Errors
/// [`Error::UnknownAlias`] when the name is not registered.
pub fn unregister_class(name_or_alias: &str) -> Result<Arc<ClassAlias>> {
    Registry::global().unregister_class(name_or_alias)
}

/// Resolve a registered alias on the global registry.
///
/// # Errors
/// [`Error::UnknownAlias`] when the name is not registered.
pub fn get_class_alias(name_or_alias: &str) -> Result<Arc<ClassAlias>> {
    Registry::global().get_class_alias(name_or_alias)
}
