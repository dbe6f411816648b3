//! Top-level encode/decode entry points and per-pass options.
//!
//! This is the surface most applications use: [`encode`] turns a slice of
//! [`Value`]s into wire bytes, [`decode`] returns the lazy [`Decoded`]
//! iterator over a buffer, and [`encode_any`] accepts arbitrary runtime
//! values through the built-in conversions and the registry's converter
//! seam. Every entry point has a `_with` variant taking explicit
//! [`CodecOptions`]; the plain variants use the defaults, which resolve
//! against the global registry.
//!
//! # Streaming decode
//!
//! [`Decoded`] pulls one value per `next()` call and never reads ahead.
//! A truncated element fails with [`crate::Error::Underrun`] and the cursor
//! is restored to the element's first byte, so [`Decoded::position`] is the
//! resume offset once more input has been buffered. Any error fuses the
//! iterator.

use std::{any::Any, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{
    amf0, amf3,
    buffer::{Reader, Writer},
    context::Context,
    registry::Registry,
    ByteArray,
    Error::Unencodable,
    Object, Result, Value,
};

/// Which wire format a pass speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmfVersion {
    /// The legacy format: fixed-width lengths, doubles only, `0x11` escape.
    Amf0,
    /// The current format: U29 varints, string and traits tables.
    Amf3,
}

/// Per-pass configuration.
///
/// Cheap to clone; the registry handle is shared, everything else is plain
/// data. The [`Default`] options resolve against [`Registry::global`] with
/// every behavioral switch off.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// The registry aliases and converters resolve against.
    pub registry: Arc<Registry>,
    /// Wrap collections and anonymous objects in the flex proxy envelopes
    /// (`ArrayCollection` / `ObjectProxy`) on AMF3 encode.
    pub use_proxies: bool,
    /// Make an AMF0 pass write every value through the `0x11` AMF3 escape,
    /// as remoting gateways do for AVM+ clients.
    pub use_amf3: bool,
    /// Fixed offset applied to dates: subtracted on encode, added on decode.
    /// `None` leaves wire dates as the UTC milliseconds they are.
    pub timezone_offset: Option<chrono::Duration>,
    /// Fail on unregistered class names instead of degrading to untyped
    /// records that preserve the wire name.
    pub strict: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            registry: Registry::global(),
            use_proxies: false,
            use_amf3: false,
            timezone_offset: None,
            strict: false,
        }
    }
}

/// Encode a sequence of values into one buffer with default options.
///
/// All values share one pass: reference tables persist across them, so a
/// value repeated between elements back-references its first occurrence.
///
/// # Errors
/// Any encode error; the buffer produced so far is discarded.
pub fn encode(values: &[Value], version: AmfVersion) -> Result<Vec<u8>> {
    encode_with(values, version, &CodecOptions::default())
}

/// Encode a sequence of values with explicit options.
///
/// # Errors
/// Any encode error; the buffer produced so far is discarded.
pub fn encode_with(values: &[Value], version: AmfVersion, opts: &CodecOptions) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    match version {
        AmfVersion::Amf0 => {
            let mut cx = Context::new(opts.registry.clone(), opts.strict);
            let mut amf3_cx = Context::new(opts.registry.clone(), opts.strict);
            let mut encoder = amf0::Encoder::new(&mut cx, &mut amf3_cx, opts);
            for value in values {
                encoder.write_value(&mut w, value)?;
            }
        }
        AmfVersion::Amf3 => {
            let mut cx = Context::new(opts.registry.clone(), opts.strict);
            let mut encoder = amf3::Encoder::new(&mut cx, opts);
            for value in values {
                encoder.write_value(&mut w, value)?;
            }
        }
    }
    Ok(w.finish())
}

/// Decode a buffer lazily with default options.
#[must_use]
pub fn decode(bytes: &[u8], version: AmfVersion) -> Decoded<'_> {
    decode_with(bytes, version, CodecOptions::default())
}

/// Decode a buffer lazily with explicit options.
#[must_use]
pub fn decode_with(bytes: &[u8], version: AmfVersion, opts: CodecOptions) -> Decoded<'_> {
    Decoded {
        reader: Reader::new(bytes),
        cx: Context::new(opts.registry.clone(), opts.strict),
        amf3_cx: Context::new(opts.registry.clone(), opts.strict),
        version,
        opts,
        done: false,
    }
}

/// Lazy iterator over the values of one buffer.
///
/// Produced by [`decode`] / [`decode_with`]. Values are pulled one at a time
/// and nothing past the current element is ever touched; reference tables
/// persist across elements of the same buffer. The first error fuses the
/// iterator.
pub struct Decoded<'a> {
    reader: Reader<'a>,
    cx: Context,
    amf3_cx: Context,
    version: AmfVersion,
    opts: CodecOptions,
    done: bool,
}

impl Decoded<'_> {
    /// Byte offset of the next element.
    ///
    /// After an [`crate::Error::Underrun`] this is the offset of the
    /// truncated element's first byte: buffer more input and decode again
    /// from here.
    #[must_use]
    pub fn position(&self) -> usize {
        self.reader.pos()
    }
}

impl Iterator for Decoded<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.reader.remaining() == 0 {
            self.done = true;
            return None;
        }

        let version = self.version;
        let cx = &mut self.cx;
        let amf3_cx = &mut self.amf3_cx;
        let opts = &self.opts;
        let result = self.reader.transactional(|r| match version {
            AmfVersion::Amf0 => amf0::Decoder::new(cx, amf3_cx, opts).read_value(r),
            AmfVersion::Amf3 => amf3::Decoder::new(amf3_cx, opts).read_value(r),
        });
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for Decoded<'_> {}

impl std::fmt::Debug for Decoded<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded")
            .field("version", &self.version)
            .field("position", &self.reader.pos())
            .field("remaining", &self.reader.remaining())
            .field("done", &self.done)
            .finish()
    }
}

/// Encode one arbitrary runtime value with default options.
///
/// # Errors
/// [`crate::Error::Unencodable`] when neither the built-in conversions nor
/// any registered converter claims the value, plus any encode error.
pub fn encode_any(value: &dyn Any, version: AmfVersion) -> Result<Vec<u8>> {
    encode_any_with(value, version, &CodecOptions::default())
}

/// Encode one arbitrary runtime value with explicit options.
///
/// # Errors
/// Same conditions as [`encode_any`].
pub fn encode_any_with(value: &dyn Any, version: AmfVersion, opts: &CodecOptions) -> Result<Vec<u8>> {
    let value = to_value(value, &opts.registry)?;
    encode_with(&[value], version, opts)
}

/// Convert an arbitrary runtime value to a [`Value`].
///
/// Built-in conversions cover the primitive and chrono types; anything else
/// falls through to the registry's ordered converter list. Time-of-day
/// values are rejected outright: they carry no date, and the wire date type
/// can not represent them.
///
/// # Errors
/// [`crate::Error::Unencodable`] when no conversion claims the value.
pub fn to_value(value: &dyn Any, registry: &Registry) -> Result<Value> {
    if let Some(v) = value.downcast_ref::<Value>() {
        return Ok(v.clone());
    }
    if let Some(v) = value.downcast_ref::<bool>() {
        return Ok(Value::Bool(*v));
    }
    if let Some(v) = value.downcast_ref::<i32>() {
        return Ok(Value::Int(*v));
    }
    if let Some(v) = value.downcast_ref::<u32>() {
        return Ok(i32::try_from(*v).map_or(Value::Number(f64::from(*v)), Value::Int));
    }
    if let Some(v) = value.downcast_ref::<i64>() {
        return Ok(i32::try_from(*v).map_or(Value::Number(*v as f64), Value::Int));
    }
    if let Some(v) = value.downcast_ref::<f64>() {
        return Ok(Value::Number(*v));
    }
    if let Some(v) = value.downcast_ref::<f32>() {
        return Ok(Value::Number(f64::from(*v)));
    }
    if let Some(v) = value.downcast_ref::<&str>() {
        return Ok(Value::string(*v));
    }
    if let Some(v) = value.downcast_ref::<String>() {
        return Ok(Value::string(v.as_str()));
    }
    if let Some(v) = value.downcast_ref::<chrono::DateTime<Utc>>() {
        return Ok(Value::Date(*v));
    }
    if let Some(v) = value.downcast_ref::<NaiveDateTime>() {
        return Ok(Value::Date(v.and_utc()));
    }
    if let Some(v) = value.downcast_ref::<NaiveDate>() {
        return Ok(Value::Date(v.and_time(NaiveTime::MIN).and_utc()));
    }
    if value.downcast_ref::<NaiveTime>().is_some() {
        return Err(Unencodable(
            "time-of-day values carry no date and have no wire representation".to_string(),
        ));
    }
    if let Some(v) = value.downcast_ref::<Vec<u8>>() {
        return Ok(Value::bytes(ByteArray::from_bytes(v.clone())));
    }
    if let Some(v) = value.downcast_ref::<Object>() {
        return Ok(Value::object(v.clone()));
    }
    if let Some(v) = value.downcast_ref::<ByteArray>() {
        return Ok(Value::bytes(v.clone()));
    }

    registry.convert(value).ok_or_else(|| {
        Unencodable("no conversion registered for this runtime type".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_values_share_one_pass() {
        let shared = Value::array(vec![Value::Int(1)]);
        let bytes = encode(&[shared.clone(), shared], AmfVersion::Amf3).unwrap();
        // Second element is a back-reference to object index 0.
        assert_eq!(bytes, [0x09, 0x03, 0x01, 0x04, 0x01, 0x09, 0x00]);

        let values: Vec<Value> = decode(&bytes, AmfVersion::Amf3)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].identity(), values[1].identity());
    }

    #[test]
    fn decoder_is_lazy_and_reports_position() {
        // A valid int followed by garbage: the garbage is untouched until
        // pulled.
        let bytes = [0x04, 0x07, 0xFF];
        let mut stream = decode(&bytes, AmfVersion::Amf3);
        assert_eq!(stream.next().unwrap().unwrap(), Value::Int(7));
        assert_eq!(stream.position(), 2);

        let err = stream.next().unwrap().unwrap_err();
        assert!(err.is_malformed());
        assert!(stream.next().is_none());
    }

    #[test]
    fn underrun_restores_position_and_fuses() {
        // Array header promising two elements, only one present.
        let bytes = [0x04, 0x01, 0x09, 0x05, 0x01, 0x04, 0x02];
        let mut stream = decode(&bytes, AmfVersion::Amf3);
        assert_eq!(stream.next().unwrap().unwrap(), Value::Int(1));

        let err = stream.next().unwrap().unwrap_err();
        assert!(err.is_underrun());
        // Cursor is back at the truncated element's first byte.
        assert_eq!(stream.position(), 2);
        assert!(stream.next().is_none());
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut stream = decode(&[], AmfVersion::Amf0);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn encode_any_builtins() {
        let registry = Registry::new();
        assert_eq!(to_value(&5i32, &registry).unwrap(), Value::Int(5));
        assert_eq!(to_value(&true, &registry).unwrap(), Value::Bool(true));
        assert_eq!(to_value(&"s", &registry).unwrap(), Value::string("s"));
        assert_eq!(
            to_value(&3_000_000_000i64, &registry).unwrap(),
            Value::Number(3_000_000_000.0)
        );
        assert_eq!(
            to_value(&vec![1u8, 2], &registry).unwrap(),
            Value::bytes(ByteArray::from_bytes(vec![1, 2]))
        );
    }

    #[test]
    fn encode_any_rejects_time_of_day() {
        let registry = Registry::new();
        let time = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert!(matches!(
            to_value(&time, &registry),
            Err(Unencodable(_))
        ));
    }

    #[test]
    fn encode_any_consults_registered_converters() {
        struct Celsius(f64);

        let registry = Registry::new();
        registry.add_type::<Celsius>(|c| Value::Number(c.0));
        assert_eq!(
            to_value(&Celsius(21.5), &registry).unwrap(),
            Value::Number(21.5)
        );

        struct Unknown;
        assert!(to_value(&Unknown, &registry).is_err());
    }

    #[test]
    fn strict_options_reject_unknown_classes() {
        let opts = CodecOptions {
            registry: Arc::new(Registry::new()),
            strict: true,
            ..CodecOptions::default()
        };
        let value = Value::object(Object::typed("com.example.Nope"));
        let err = encode_with(&[value], AmfVersion::Amf3, &opts).unwrap_err();
        assert!(matches!(err, crate::Error::UnknownAlias(_)));
    }
}
