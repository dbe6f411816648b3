use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Which per-pass reference table an out-of-range index was resolved against.
///
/// AMF streams carry back-references into three independent tables (objects,
/// strings and traits); the variant names the table that rejected the index
/// so malformed-stream reports point at the right part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The object-reference table (compound values: objects, arrays, dates, XML, byte arrays).
    Object,
    /// The AMF3 string-reference table.
    String,
    /// The AMF3 traits (class-definition) table.
    Traits,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Object => write!(f, "object"),
            ReferenceKind::String => write!(f, "string"),
            ReferenceKind::Traits => write!(f, "traits"),
        }
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The taxonomy separates three fundamentally different failure classes:
///
/// ## Recoverable
/// - [`Error::Underrun`] - the buffer ends before the current element does. The decoder
///   restores the stream cursor to the element start, so a streaming caller can append
///   more bytes and retry. This is the only recoverable condition.
///
/// ## Fatal decode errors
/// - [`Error::Malformed`] - corrupted or unsupported wire content (unknown marker bytes,
///   reserved markers, invalid UTF-8, bad traits headers)
/// - [`Error::OutOfRangeReference`] - a back-reference index past the end of a reference
///   table; tables only grow within a pass, so this is never a mere underrun
/// - [`Error::UnknownAlias`] - a typed object's class name is unresolvable and strict
///   mode is enabled
/// - [`Error::MissingAttribute`] - a statically declared attribute is absent from
///   decoded wire data
///
/// ## Encode errors
/// - [`Error::Unencodable`] - an application value the wire format cannot express
///   (unsupported runtime type, an empty-string dictionary key in AMF3, a value outside
///   the U29 length domain)
/// - [`Error::DuplicateClass`] / [`Error::Registration`] - class-alias registration misuse
///
/// # Examples
///
/// ```rust
/// use amfwire::{decode, AmfVersion, Error};
///
/// // 0x09 begins an AMF3 array whose body never arrives.
/// let mut stream = amfwire::decode(&[0x09], AmfVersion::Amf3);
/// match stream.next() {
///     Some(Err(e)) if e.is_underrun() => {
///         // buffer more bytes, retry from stream.position()
///     }
///     other => panic!("expected underrun, got {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough bytes in the buffer to finish the current element.
    ///
    /// This is a recoverable condition, not wire corruption: the stream cursor is
    /// restored to the position where the element started, so callers that receive
    /// data incrementally can buffer more input and decode again.
    #[error("Not enough bytes available to finish decoding the current element")]
    Underrun,

    /// The stream is damaged and can not be decoded.
    ///
    /// This error indicates wire content that no amount of additional input can
    /// repair: unknown or reserved marker bytes, invalid UTF-8 in a string body,
    /// a broken object terminator, or an external class without registered hooks.
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A decoded back-reference index points past the end of its reference table.
    ///
    /// Reference tables grow monotonically within one pass, so an index the encoder
    /// could not have produced is always fatal malformed input and never an underrun.
    #[error("Reference index {index} is out of range for the {kind} table")]
    OutOfRangeReference {
        /// Which reference table rejected the index
        kind: ReferenceKind,
        /// The index read from the wire
        index: usize,
    },

    /// A class or alias name could not be resolved under strict mode.
    ///
    /// In non-strict mode the same input degrades to a generic untyped record that
    /// preserves the wire class name; strict mode surfaces this error instead.
    #[error("Unknown class alias - {0}")]
    UnknownAlias(String),

    /// A statically declared attribute is missing from decoded wire data.
    ///
    /// Static attributes are part of a registered class's contract; wire data that
    /// omits one can not be applied to an instance of that class.
    #[error("Attribute '{attr}' of class '{class}' is declared static but absent from the wire data")]
    MissingAttribute {
        /// The class whose contract was violated
        class: String,
        /// The missing attribute name
        attr: String,
    },

    /// An application value that the wire format can not express.
    ///
    /// Covers unsupported runtime types handed to the converter seam, empty-string
    /// dictionary keys in AMF3 (they would collide with the dynamic-section
    /// terminator), strings or buffers beyond the length-prefix domain, and
    /// time-only values which carry no date to put on the wire.
    #[error("Value can not be encoded - {0}")]
    Unencodable(String),

    /// A class or alias name is already registered.
    ///
    /// Aliases are immutable once compiled; replacing one requires explicit
    /// unregistration first.
    #[error("Class or alias '{0}' is already registered")]
    DuplicateClass(String),

    /// Invalid class-alias registration input.
    ///
    /// Raised when a definition is internally inconsistent, for example an
    /// external class without read/write hooks, hooks on a non-external class,
    /// or a parent class that has not been registered yet.
    #[error("Invalid class registration - {0}")]
    Registration(String),
}

impl Error {
    /// `true` when this is the recoverable [`Error::Underrun`] condition.
    ///
    /// Streaming callers branch on this to distinguish "buffer more bytes and
    /// retry" from fatal wire corruption.
    #[must_use]
    pub fn is_underrun(&self) -> bool {
        matches!(self, Error::Underrun)
    }

    /// `true` when this is fatal malformed wire content.
    ///
    /// Covers [`Error::Malformed`] and its [`Error::OutOfRangeReference`] subtype.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::OutOfRangeReference { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underrun_is_not_malformed() {
        assert!(Error::Underrun.is_underrun());
        assert!(!Error::Underrun.is_malformed());
    }

    #[test]
    fn reference_errors_are_malformed() {
        let err = Error::OutOfRangeReference {
            kind: ReferenceKind::Object,
            index: 7,
        };
        assert!(err.is_malformed());
        assert!(!err.is_underrun());
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn malformed_macro_captures_location() {
        let err = malformed_error!("bad marker 0x{:02x}", 0xff_u8);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad marker 0xff");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
