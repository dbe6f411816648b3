//! Built-in external hooks for the flex collection proxy classes.
//!
//! Flex remoting wraps collections in `flex.messaging.io.ArrayCollection`
//! and anonymous objects in `flex.messaging.io.ObjectProxy`. Both are
//! external envelopes whose payload is exactly one ordinary AMF3 value; on
//! decode the envelope is transparent and the carried value surfaces
//! directly, with back-references to the envelope resolving to it.
//!
//! The encode direction of these envelopes is driven by
//! [`crate::CodecOptions::use_proxies`] inside the AMF3 encoder itself; the
//! write hooks here only cover user-built wrapper objects, where the wrapped
//! value is expected under a `source` (collection) or `object` (proxy)
//! attribute.

use std::{cell::RefCell, rc::Rc};

use crate::{
    alias::{ClassDef, ExternalHooks},
    amf3,
    buffer::{Reader, Writer},
    registry::Registry,
    Error::Unencodable,
    Object, Result, Value,
};

/// Wire class name of the flex collection wrapper.
pub const ARRAY_COLLECTION: &str = "flex.messaging.io.ArrayCollection";
/// Wire class name of the flex anonymous-object wrapper.
pub const OBJECT_PROXY: &str = "flex.messaging.io.ObjectProxy";

struct ArrayCollectionHooks;

impl ExternalHooks for ArrayCollectionHooks {
    fn write(
        &self,
        value: &Value,
        encoder: &mut amf3::Encoder<'_>,
        w: &mut Writer,
    ) -> Result<()> {
        let source = match value {
            Value::Array(_) | Value::Mixed(_) => value.clone(),
            Value::Object(rc) => rc.borrow().get("source").cloned().ok_or_else(|| {
                Unencodable(format!("{ARRAY_COLLECTION} wrapper has no 'source'"))
            })?,
            _ => {
                return Err(Unencodable(format!(
                    "{ARRAY_COLLECTION} can only wrap a collection"
                )))
            }
        };
        encoder.write_value_direct(w, &source)
    }

    fn read(
        &self,
        decoder: &mut amf3::Decoder<'_>,
        r: &mut Reader<'_>,
        _obj: &Rc<RefCell<Object>>,
    ) -> Result<Option<Value>> {
        // Transparent: the carried collection replaces the envelope.
        Ok(Some(decoder.read_value(r)?))
    }
}

struct ObjectProxyHooks;

impl ExternalHooks for ObjectProxyHooks {
    fn write(
        &self,
        value: &Value,
        encoder: &mut amf3::Encoder<'_>,
        w: &mut Writer,
    ) -> Result<()> {
        let Value::Object(rc) = value else {
            return Err(Unencodable(format!(
                "{OBJECT_PROXY} can only wrap an object"
            )));
        };
        let wrapped = rc.borrow().get("object").cloned().ok_or_else(|| {
            Unencodable(format!("{OBJECT_PROXY} wrapper has no 'object'"))
        })?;
        encoder.write_value_direct(w, &wrapped)
    }

    fn read(
        &self,
        decoder: &mut amf3::Decoder<'_>,
        r: &mut Reader<'_>,
        _obj: &Rc<RefCell<Object>>,
    ) -> Result<Option<Value>> {
        Ok(Some(decoder.read_value(r)?))
    }
}

/// Register both proxy classes on `registry`.
///
/// Duplicate registration is a harmless no-op, so this is safe to call on a
/// registry that already knows the proxies.
pub fn register_proxies(registry: &Registry) {
    let _ = registry.register_class(
        ClassDef::new(ARRAY_COLLECTION).external(std::sync::Arc::new(ArrayCollectionHooks)),
    );
    let _ = registry.register_class(
        ClassDef::new(OBJECT_PROXY).external(std::sync::Arc::new(ObjectProxyHooks)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::Reader, codec::CodecOptions, context::Context};
    use std::sync::Arc;

    fn roundtrip(value: &Value, use_proxies: bool) -> (Vec<u8>, Value) {
        let registry = Arc::new(Registry::with_defaults());
        let opts = CodecOptions {
            use_proxies,
            ..CodecOptions::default()
        };

        let mut cx = Context::new(registry.clone(), false);
        let mut w = Writer::new();
        amf3::Encoder::new(&mut cx, &opts)
            .write_value(&mut w, value)
            .unwrap();
        let bytes = w.finish();

        let mut cx = Context::new(registry, false);
        let mut r = Reader::new(&bytes);
        let decoded = amf3::Decoder::new(&mut cx, &opts)
            .read_value(&mut r)
            .unwrap();
        (bytes, decoded)
    }

    #[test]
    fn array_collection_envelope_bytes() {
        let value = Value::array(vec![Value::Int(1)]);
        let (bytes, decoded) = roundtrip(&value, true);

        // Object marker, external traits inline, class name, then a plain
        // one-element array body.
        assert_eq!(bytes[0], 0x0A);
        assert_eq!(bytes[1], 0x07);
        assert_eq!(bytes[2] as usize, ARRAY_COLLECTION.len() << 1 | 1);
        assert_eq!(&bytes[3..3 + ARRAY_COLLECTION.len()], ARRAY_COLLECTION.as_bytes());
        assert_eq!(&bytes[3 + ARRAY_COLLECTION.len()..], [0x09, 0x03, 0x01, 0x04, 0x01]);

        // The envelope is transparent on decode.
        assert_eq!(decoded, value);
    }

    #[test]
    fn object_proxy_wraps_anonymous_objects_only() {
        let mut anon = Object::new();
        anon.set("k", Value::Int(1));
        let (bytes, decoded) = roundtrip(&Value::object(anon.clone()), true);
        assert!(bytes
            .windows(OBJECT_PROXY.len())
            .any(|w| w == OBJECT_PROXY.as_bytes()));
        assert_eq!(decoded, Value::object(anon));

        let mut typed = Object::typed("com.example.Typed");
        typed.set("k", Value::Int(1));
        let (bytes, _) = roundtrip(&Value::object(typed), true);
        assert!(!bytes
            .windows(OBJECT_PROXY.len())
            .any(|w| w == OBJECT_PROXY.as_bytes()));
    }

    #[test]
    fn repeated_collection_back_references_the_envelope() {
        let shared = Value::array(vec![Value::Int(7)]);
        let value = Value::array(vec![shared.clone(), shared]);
        let (bytes, decoded) = roundtrip(&value, true);

        // The outer envelope and its body take indices 0 and 1, the shared
        // envelope index 2; the second occurrence is a two-byte reference to
        // index 2 (0x0A 0x04).
        assert_eq!(&bytes[bytes.len() - 2..], [0x0A, 0x04]);

        let Value::Array(outer) = &decoded else {
            panic!("expected array");
        };
        let outer = outer.borrow();
        assert_eq!(outer[0], outer[1]);
        assert_eq!(outer[0].identity(), outer[1].identity());
    }

    #[test]
    fn proxies_off_writes_plain_collections() {
        let value = Value::array(vec![Value::Int(1)]);
        let (bytes, decoded) = roundtrip(&value, false);
        assert_eq!(bytes, [0x09, 0x03, 0x01, 0x04, 0x01]);
        assert_eq!(decoded, value);
    }
}
