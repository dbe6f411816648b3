//! The decoded object-graph model shared by both wire formats.
//!
//! AMF serializes a closed set of value shapes; this module renders them as
//! the [`Value`] tagged union. Compound variants are `Rc<RefCell<_>>` so that
//!
//! - per-pass reference tables can key on pointer identity,
//! - cyclic and self-referential graphs are constructible and round-trip,
//! - decoded back-references alias the same allocation instead of cloning.
//!
//! Values are deliberately not [`Send`]: one encode/decode pass belongs to
//! one thread, and the only state shared across passes is the class-alias
//! registry.
//!
//! # Key Components
//!
//! - [`Value`] - the tagged union every codec operation consumes or produces
//! - [`Object`] - an optionally-typed record with insertion-ordered attributes
//! - [`MixedArray`] - an array with both a dense and an associative portion
//! - [`Xml`] - an XML payload distinguishing the legacy and E4X wire markers

use std::{cell::RefCell, rc::Rc};

use chrono::{DateTime, Utc};

use crate::ByteArray;

/// A single AMF value.
///
/// This is the closed tagged union both codecs dispatch on. The open
/// extension seam for arbitrary runtime types is the converter list on
/// [`crate::Registry`], consulted by [`crate::encode_any`] before anything
/// reaches a codec; by the time a value is being written it is always one of
/// these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `undefined` sentinel. Also what a declared static attribute
    /// encodes as when absent on the instance.
    Undefined,
    /// The `null` value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer in AMF3's signed 29-bit domain. AMF0 has no integer type
    /// and writes these as 8-byte doubles; AMF3 falls back to the double
    /// marker when an `i32` exceeds the 29-bit range.
    Int(i32),
    /// An IEEE 754 double.
    Number(f64),
    /// A UTF-8 string. Reference-counted so the AMF3 string table can alias
    /// repeated values instead of copying them.
    String(Rc<str>),
    /// A point in time. Wire dates are always UTC milliseconds; a fixed
    /// per-pass offset from [`crate::CodecOptions::timezone_offset`] is the
    /// only timezone adjustment ever applied.
    Date(DateTime<Utc>),
    /// An XML payload.
    Xml(Rc<Xml>),
    /// A dense, zero-based array.
    Array(Rc<RefCell<Vec<Value>>>),
    /// An array with an associative portion and an optional trailing dense
    /// portion.
    Mixed(Rc<RefCell<MixedArray>>),
    /// An anonymous or typed object.
    Object(Rc<RefCell<Object>>),
    /// A raw byte buffer, itself AMF3-encodable.
    Bytes(Rc<RefCell<ByteArray>>),
}

impl Value {
    /// Build a [`Value::String`] from anything string-like.
    #[must_use]
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    /// Build a [`Value::Array`] from a vector of elements.
    #[must_use]
    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    /// Build a [`Value::Mixed`] from its dense and associative portions.
    #[must_use]
    pub fn mixed(dense: Vec<Value>, assoc: Vec<(Rc<str>, Value)>) -> Value {
        Value::Mixed(Rc::new(RefCell::new(MixedArray { dense, assoc })))
    }

    /// Build a [`Value::Object`] from an [`Object`].
    #[must_use]
    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Build a [`Value::Bytes`] from a [`ByteArray`].
    #[must_use]
    pub fn bytes(bytes: ByteArray) -> Value {
        Value::Bytes(Rc::new(RefCell::new(bytes)))
    }

    /// Pointer identity of a compound value, used as the key of the per-pass
    /// object-reference table on encode.
    ///
    /// Primitives and dates return `None`: they have no aliasable identity.
    /// Dates still consume an object-table index when written so that the
    /// encoder and decoder tables stay aligned, but two equal dates never
    /// collapse into a back-reference.
    #[must_use]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Xml(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Array(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Mixed(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Bytes(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

/// An XML payload.
///
/// AMF3 carries two XML markers with identical body shapes: the legacy
/// `XMLDocument` type and the E4X `XML` type. The `legacy` flag selects the
/// marker on encode; AMF0 only knows the document form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xml {
    /// The XML text.
    pub content: String,
    /// `true` for the legacy `XMLDocument` wire type.
    pub legacy: bool,
}

impl Xml {
    /// Create an E4X XML payload.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Xml {
            content: content.into(),
            legacy: false,
        }
    }

    /// Create a legacy `XMLDocument` payload.
    #[must_use]
    pub fn legacy(content: impl Into<String>) -> Self {
        Xml {
            content: content.into(),
            legacy: true,
        }
    }
}

/// An array with associative string keys and an optional dense portion.
///
/// AMF0 calls this an ECMA array, AMF3 folds it into its array type: the
/// associative pairs are written first (terminated by an empty key), followed
/// by the dense elements. A decoded array surfaces as [`Value::Mixed`] only
/// when at least one associative pair exists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MixedArray {
    /// The dense, zero-based portion.
    pub dense: Vec<Value>,
    /// The associative portion in insertion order. Keys are never empty;
    /// an empty key is reserved as the wire terminator.
    pub assoc: Vec<(Rc<str>, Value)>,
}

/// An anonymous or typed record with insertion-ordered attributes.
///
/// Attribute order is preserved because it is observable on the wire: the
/// dynamic section of an AMF3 object and the body of an AMF0 object are both
/// written in iteration order. Lookups are linear, which is the right trade
/// for the attribute counts remoting traffic actually carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    /// The registered class name, or `None` for an anonymous object.
    ///
    /// On decode this is the resolved class name for registered aliases, or
    /// the verbatim wire name for an unregistered class in non-strict mode.
    pub class_name: Option<Rc<str>>,
    entries: Vec<(Rc<str>, Value)>,
}

impl Object {
    /// Create an empty anonymous object.
    #[must_use]
    pub fn new() -> Self {
        Object::default()
    }

    /// Create an empty object carrying a class name.
    #[must_use]
    pub fn typed(class_name: impl Into<Rc<str>>) -> Self {
        Object {
            class_name: Some(class_name.into()),
            entries: Vec::new(),
        }
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the object has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Set an attribute, replacing an existing entry in place or appending a
    /// new one at the end.
    pub fn set(&mut self, name: impl Into<Rc<str>>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove an attribute by name, returning its value when present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.as_ref() == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Attribute names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl FromIterator<(Rc<str>, Value)> for Object {
    fn from_iter<T: IntoIterator<Item = (Rc<str>, Value)>>(iter: T) -> Self {
        Object {
            class_name: None,
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_preserves_insertion_order() {
        let mut obj = Object::new();
        obj.set("b", Value::Int(2));
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(3));

        let keys: Vec<_> = obj.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(obj.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn object_remove() {
        let mut obj = Object::typed("com.example.Point");
        obj.set("x", Value::Int(1));
        obj.set("y", Value::Int(2));
        assert_eq!(obj.remove("x"), Some(Value::Int(1)));
        assert_eq!(obj.remove("x"), None);
        assert_eq!(obj.len(), 1);
    }

    #[test]
    fn identity_tracks_pointers_not_contents() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert_eq!(a, b);
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity(), a.clone().identity());
        assert_eq!(Value::Int(1).identity(), None);
        assert_eq!(Value::Date(Utc::now()).identity(), None);
    }

    #[test]
    fn self_referential_graph_is_constructible() {
        let inner = Rc::new(RefCell::new(Object::new()));
        let outer = Value::Object(inner.clone());
        inner.borrow_mut().set("me", outer.clone());

        let me = inner.borrow().get("me").cloned();
        assert_eq!(me.and_then(|v| v.identity()), outer.identity());
    }
}
