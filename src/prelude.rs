//! # amfwire Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the amfwire library. Import this module to get quick access to the
//! essentials for encoding and decoding AMF data.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all amfwire operations
pub use crate::Error;

/// The result type used throughout amfwire
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Encode and decode entry points with their configuration
pub use crate::{
    decode, decode_with, encode, encode_any, encode_any_with, encode_with, AmfVersion,
    CodecOptions, Decoded,
};

// ================================================================================================
// Object-Graph Model
// ================================================================================================

/// The value model every codec operation consumes or produces
pub use crate::{MixedArray, Object, Value, Xml};

/// The Flash random-access byte buffer
pub use crate::{ByteArray, Endian};

// ================================================================================================
// Class Aliasing
// ================================================================================================

/// Class registration against the global registry
pub use crate::{get_class_alias, register_class, unregister_class};

/// Class-alias metadata and extension seams
pub use crate::{AliasStrategy, ClassAlias, ClassDef, ExternalHooks, Registry};
