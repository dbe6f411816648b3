//! Encoder and decoder for the AMF3 wire format.
//!
//! AMF3 is the current Flash object-graph encoding: variable-length U29
//! integers, a per-pass string table deduplicating every non-empty string,
//! reference-tracked traits (class definitions) so a class's attribute-name
//! list is written once per pass, arrays with both associative and dense
//! portions, raw byte arrays, and an external mode handing the stream to
//! per-class hooks.
//!
//! # Architecture
//!
//! - [`Amf3Marker`] - the wire marker bytes `0x00..=0x0C`
//! - [`Encoder`] - writes [`crate::Value`] graphs against a borrowed
//!   [`crate::Context`]
//! - [`Decoder`] - the mirror image, reading from a [`Reader`]
//!
//! Both halves borrow their [`crate::Context`] instead of owning it so a
//! [`crate::ByteArray`] can run embedded passes against its own context.
//!
//! # Reference-bearing U29s
//!
//! The low bit of every length-or-reference U29 (strings, dates, arrays,
//! objects, XML, byte arrays) selects inline (1) or reference (0); the
//! remaining bits are a length/count or a table index. Traits pack three
//! more flags into the object header: bit 1 inline-traits, bit 2 external,
//! bit 3 dynamic, with the sealed attribute count in bits 4 and up.
//!
//! # Failure semantics
//!
//! Truncated input surfaces as [`crate::Error::Underrun`]; every
//! wire-supplied length is checked against the remaining buffer before any
//! allocation. Unknown markers, invalid UTF-8 and reference indices past a
//! table are fatal. The codec never recovers internally.

use std::{cell::RefCell, cmp::min, rc::Rc};

use chrono::TimeZone;
use strum::{Display, FromRepr};

use crate::{
    alias::EncodableAttr,
    buffer::{Reader, Writer, U29_MAX},
    codec::CodecOptions,
    context::{Context, Traits, TraitsMode},
    flex,
    value::{MixedArray, Object, Xml},
    ByteArray,
    Error::{Underrun, Unencodable},
    Result, Value,
};

/// Smallest integer the AMF3 integer type can carry (29-bit two's complement).
pub const MIN_INT: i32 = -0x1000_0000;
/// Largest integer the AMF3 integer type can carry.
pub const MAX_INT: i32 = 0x0FFF_FFFF;

/// AMF3 wire marker bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u8)]
pub enum Amf3Marker {
    /// The `undefined` sentinel.
    Undefined = 0x00,
    /// The `null` value.
    Null = 0x01,
    /// Boolean `false`, no body.
    False = 0x02,
    /// Boolean `true`, no body.
    True = 0x03,
    /// U29 signed integer.
    Integer = 0x04,
    /// 8-byte IEEE 754 double.
    Double = 0x05,
    /// Reference-tracked UTF-8 string.
    String = 0x06,
    /// Legacy `XMLDocument`, tracked in the object table.
    XmlDoc = 0x07,
    /// Milliseconds-since-epoch date, tracked in the object table.
    Date = 0x08,
    /// Array with associative and dense portions.
    Array = 0x09,
    /// Traits-prefixed object.
    Object = 0x0A,
    /// E4X `XML`, same body shape as [`Amf3Marker::XmlDoc`].
    Xml = 0x0B,
    /// Length-prefixed raw bytes.
    ByteArray = 0x0C,
}

fn check_length(len: usize) -> Result<u32> {
    if len > (U29_MAX >> 1) as usize {
        return Err(Unencodable(format!(
            "length {len} exceeds the U29 reference domain"
        )));
    }
    Ok(len as u32)
}

/// Writes [`Value`] graphs in the AMF3 wire format.
///
/// Borrows its [`Context`] for the duration of the pass; one encoder per
/// pass, never shared across threads.
pub struct Encoder<'a> {
    cx: &'a mut Context,
    opts: &'a CodecOptions,
}

impl<'a> Encoder<'a> {
    /// Create an encoder over a pass context and options.
    pub fn new(cx: &'a mut Context, opts: &'a CodecOptions) -> Self {
        Encoder { cx, opts }
    }

    /// Write one value, marker included.
    ///
    /// # Errors
    /// [`crate::Error::Unencodable`] for values the format can not express,
    /// or any alias-resolution error for typed objects.
    pub fn write_value(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        if self.opts.use_proxies {
            match value {
                Value::Array(_) | Value::Mixed(_) => {
                    return self.write_array_collection(w, value);
                }
                Value::Object(rc) if rc.borrow().class_name.is_none() => {
                    return self.write_object_proxy(w, value);
                }
                _ => {}
            }
        }
        self.write_value_plain(w, value)
    }

    /// Write one value without proxy wrapping, regardless of options.
    ///
    /// External hooks writing an envelope body use this so the carried value
    /// is not wrapped in a second envelope; nested values inside it still
    /// honor the proxy option.
    pub fn write_value_direct(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        self.write_value_plain(w, value)
    }

    fn write_value_plain(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        match value {
            Value::Undefined => w.put_u8(Amf3Marker::Undefined as u8),
            Value::Null => w.put_u8(Amf3Marker::Null as u8),
            Value::Bool(false) => w.put_u8(Amf3Marker::False as u8),
            Value::Bool(true) => w.put_u8(Amf3Marker::True as u8),
            Value::Int(i) => self.write_int(w, *i)?,
            Value::Number(n) => {
                w.put_u8(Amf3Marker::Double as u8);
                w.put_be(*n);
            }
            Value::String(s) => {
                w.put_u8(Amf3Marker::String as u8);
                self.write_utf8(w, s)?;
            }
            Value::Date(dt) => {
                w.put_u8(Amf3Marker::Date as u8);
                // Dates have no identity but still consume an object-table
                // index to keep encoder and decoder tables aligned.
                self.cx.add_object(value);
                w.put_u29(1)?;
                let utc = match self.opts.timezone_offset {
                    Some(offset) => *dt - offset,
                    None => *dt,
                };
                w.put_be(utc.timestamp_millis() as f64);
            }
            Value::Xml(xml) => {
                let marker = if xml.legacy {
                    Amf3Marker::XmlDoc
                } else {
                    Amf3Marker::Xml
                };
                w.put_u8(marker as u8);
                if let Some(index) = self.cx.object_reference(value) {
                    return w.put_u29((index as u32) << 1);
                }
                self.cx.add_object(value);
                let len = check_length(xml.content.len())?;
                w.put_u29(len << 1 | 1)?;
                w.put_bytes(xml.content.as_bytes());
            }
            Value::Array(rc) => {
                w.put_u8(Amf3Marker::Array as u8);
                if let Some(index) = self.cx.object_reference(value) {
                    return w.put_u29((index as u32) << 1);
                }
                self.cx.add_object(value);
                self.write_array_body(w, rc)?;
            }
            Value::Mixed(rc) => {
                w.put_u8(Amf3Marker::Array as u8);
                if let Some(index) = self.cx.object_reference(value) {
                    return w.put_u29((index as u32) << 1);
                }
                self.cx.add_object(value);
                self.write_mixed_body(w, rc)?;
            }
            Value::Object(rc) => {
                w.put_u8(Amf3Marker::Object as u8);
                if let Some(index) = self.cx.object_reference(value) {
                    return w.put_u29((index as u32) << 1);
                }
                self.cx.add_object(value);
                self.write_object_body(w, value, rc)?;
            }
            Value::Bytes(rc) => {
                w.put_u8(Amf3Marker::ByteArray as u8);
                if let Some(index) = self.cx.object_reference(value) {
                    return w.put_u29((index as u32) << 1);
                }
                self.cx.add_object(value);
                let bytes = rc.borrow();
                let len = check_length(bytes.len())?;
                w.put_u29(len << 1 | 1)?;
                w.put_bytes(bytes.bytes());
            }
        }
        Ok(())
    }

    fn write_int(&mut self, w: &mut Writer, value: i32) -> Result<()> {
        if (MIN_INT..=MAX_INT).contains(&value) {
            w.put_u8(Amf3Marker::Integer as u8);
            w.put_u29((value as u32) & U29_MAX)
        } else {
            // Outside the 29-bit domain the integer type can not carry the
            // value; fall back to the double marker.
            w.put_u8(Amf3Marker::Double as u8);
            w.put_be(f64::from(value));
            Ok(())
        }
    }

    /// Write a string through the string table: inline with its byte length
    /// on first sight, a reference thereafter. The empty string is always
    /// inline and never referenced.
    pub fn write_utf8(&mut self, w: &mut Writer, s: &str) -> Result<()> {
        if s.is_empty() {
            return w.put_u29(1);
        }
        if let Some(index) = self.cx.string_reference(s) {
            return w.put_u29((index as u32) << 1);
        }
        let rc: Rc<str> = s.into();
        self.cx.add_string(&rc);
        let len = check_length(s.len())?;
        w.put_u29(len << 1 | 1)?;
        w.put_bytes(s.as_bytes());
        Ok(())
    }

    fn write_array_body(&mut self, w: &mut Writer, rc: &Rc<RefCell<Vec<Value>>>) -> Result<()> {
        let elements = rc.borrow();
        let len = check_length(elements.len())?;
        w.put_u29(len << 1 | 1)?;
        w.put_u29(1)?; // no associative portion
        for element in elements.iter() {
            self.write_value(w, element)?;
        }
        Ok(())
    }

    fn write_mixed_body(&mut self, w: &mut Writer, rc: &Rc<RefCell<MixedArray>>) -> Result<()> {
        let array = rc.borrow();
        let len = check_length(array.dense.len())?;
        w.put_u29(len << 1 | 1)?;
        for (key, value) in &array.assoc {
            if key.is_empty() {
                return Err(Unencodable(
                    "empty-string key collides with the associative terminator".to_string(),
                ));
            }
            self.write_utf8(w, key)?;
            self.write_value(w, value)?;
        }
        w.put_u29(1)?;
        for element in &array.dense {
            self.write_value(w, element)?;
        }
        Ok(())
    }

    fn write_object_body(
        &mut self,
        w: &mut Writer,
        value: &Value,
        rc: &Rc<RefCell<Object>>,
    ) -> Result<()> {
        let (class_name, alias) = {
            let obj = rc.borrow();
            match &obj.class_name {
                Some(name) => (name.clone(), Some(self.cx.alias_for(name)?)),
                None => (Rc::from(""), None),
            }
        };

        if let Some(alias) = &alias {
            if alias.is_external() {
                let Some(hooks) = alias.hooks().cloned() else {
                    return Err(Unencodable(format!(
                        "external class '{class_name}' carries no hooks"
                    )));
                };
                self.write_traits(w, &class_name, alias.alias_name(), TraitsMode::External, &[])?;
                return hooks.write(value, self, w);
            }
        }

        let dynamic = alias.as_ref().map_or(true, |a| a.is_dynamic());
        let sealed = alias.as_ref().map_or_else(Vec::new, |a| a.sealed_wire_attrs());
        let plan: Vec<EncodableAttr> = match &alias {
            Some(alias) => alias.encodable_attributes(&rc.borrow()),
            None => rc
                .borrow()
                .iter()
                .map(|(name, value)| EncodableAttr {
                    name: name.clone(),
                    value: value.clone(),
                    proxied: false,
                })
                .collect(),
        };

        let mode = if dynamic {
            TraitsMode::Dynamic
        } else {
            TraitsMode::Static
        };
        let wire_alias = alias.as_ref().map_or("", |a| a.alias_name()).to_string();
        self.write_traits(w, &class_name, &wire_alias, mode, &sealed)?;

        for attr in &plan[..sealed.len()] {
            self.write_attr_value(w, attr)?;
        }
        if dynamic {
            for attr in &plan[sealed.len()..] {
                if attr.name.is_empty() {
                    return Err(Unencodable(
                        "empty-string key collides with the dynamic terminator".to_string(),
                    ));
                }
                self.write_utf8(w, &attr.name)?;
                self.write_attr_value(w, attr)?;
            }
            w.put_u29(1)?;
        }
        Ok(())
    }

    fn write_attr_value(&mut self, w: &mut Writer, attr: &EncodableAttr) -> Result<()> {
        if attr.proxied {
            if let Value::Array(_) | Value::Mixed(_) = attr.value {
                return self.write_array_collection(w, &attr.value);
            }
        }
        self.write_value(w, &attr.value)
    }

    fn write_traits(
        &mut self,
        w: &mut Writer,
        class_name: &Rc<str>,
        wire_alias: &str,
        mode: TraitsMode,
        sealed: &[String],
    ) -> Result<()> {
        if let Some(index) = self.cx.traits_reference(class_name) {
            return w.put_u29((index as u32) << 2 | 0b01);
        }

        let attributes: Vec<Rc<str>> = sealed.iter().map(|s| Rc::from(s.as_str())).collect();
        self.cx.add_traits(Rc::new(Traits {
            class_name: class_name.clone(),
            mode,
            attributes,
            alias: None,
        }));

        let count = check_length(sealed.len())?;
        let header = match mode {
            TraitsMode::External => 0b111,
            TraitsMode::Dynamic => count << 4 | 0b1011,
            TraitsMode::Static => count << 4 | 0b0011,
        };
        w.put_u29(header)?;
        self.write_utf8(w, wire_alias)?;
        for name in sealed {
            self.write_utf8(w, name)?;
        }
        Ok(())
    }

    /// Write a collection wrapped in the `ArrayCollection` envelope.
    ///
    /// The wrapper, not the wrapped value, owns the identity in the object
    /// table: a repeated collection back-references the envelope. The inline
    /// body is one ordinary AMF3 array value.
    fn write_array_collection(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        w.put_u8(Amf3Marker::Object as u8);
        if let Some(index) = self.cx.object_reference(value) {
            return w.put_u29((index as u32) << 1);
        }
        self.cx.add_object(value);
        let class_name: Rc<str> = flex::ARRAY_COLLECTION.into();
        self.write_traits(w, &class_name, flex::ARRAY_COLLECTION, TraitsMode::External, &[])?;

        w.put_u8(Amf3Marker::Array as u8);
        // A second table entry for the inner body; the identity above keeps
        // pointing at the wrapper.
        self.cx.add_object(value);
        match value {
            Value::Array(rc) => self.write_array_body(w, rc),
            Value::Mixed(rc) => self.write_mixed_body(w, rc),
            _ => Err(Unencodable(
                "ArrayCollection can only wrap an array".to_string(),
            )),
        }
    }

    /// Write an anonymous object wrapped in the `ObjectProxy` envelope.
    fn write_object_proxy(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        let Value::Object(rc) = value else {
            return Err(Unencodable(
                "ObjectProxy can only wrap an object".to_string(),
            ));
        };
        w.put_u8(Amf3Marker::Object as u8);
        if let Some(index) = self.cx.object_reference(value) {
            return w.put_u29((index as u32) << 1);
        }
        self.cx.add_object(value);
        let class_name: Rc<str> = flex::OBJECT_PROXY.into();
        self.write_traits(w, &class_name, flex::OBJECT_PROXY, TraitsMode::External, &[])?;

        w.put_u8(Amf3Marker::Object as u8);
        self.cx.add_object(value);
        self.write_object_body(w, value, rc)
    }
}

/// Reads [`Value`] graphs in the AMF3 wire format.
///
/// The mirror image of [`Encoder`]: same borrowed [`Context`], same
/// register-then-descend ordering, so decoded back-references alias the
/// identical allocation at every occurrence.
pub struct Decoder<'a> {
    cx: &'a mut Context,
    opts: &'a CodecOptions,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a pass context and options.
    pub fn new(cx: &'a mut Context, opts: &'a CodecOptions) -> Self {
        Decoder { cx, opts }
    }

    /// Read one value, marker included.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when the buffer ends mid-element (cursor
    /// restoration is the caller's concern, see
    /// [`Reader::transactional`]); [`crate::Error::Malformed`] and friends
    /// for wire corruption.
    pub fn read_value(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let byte = r.read_u8()?;
        let Some(marker) = Amf3Marker::from_repr(byte) else {
            return Err(malformed_error!("unknown AMF3 type marker 0x{:02x}", byte));
        };
        match marker {
            Amf3Marker::Undefined => Ok(Value::Undefined),
            Amf3Marker::Null => Ok(Value::Null),
            Amf3Marker::False => Ok(Value::Bool(false)),
            Amf3Marker::True => Ok(Value::Bool(true)),
            Amf3Marker::Integer => {
                let u = r.read_u29()?;
                let value = if u & 0x1000_0000 != 0 {
                    (u as i32) - 0x2000_0000
                } else {
                    u as i32
                };
                Ok(Value::Int(value))
            }
            Amf3Marker::Double => Ok(Value::Number(r.read_be()?)),
            Amf3Marker::String => Ok(Value::String(self.read_utf8(r)?)),
            Amf3Marker::XmlDoc => self.read_xml(r, true),
            Amf3Marker::Date => self.read_date(r),
            Amf3Marker::Array => self.read_array(r),
            Amf3Marker::Object => self.read_object(r),
            Amf3Marker::Xml => self.read_xml(r, false),
            Amf3Marker::ByteArray => self.read_bytearray(r),
        }
    }

    /// Read a string through the string table.
    pub fn read_utf8(&mut self, r: &mut Reader<'_>) -> Result<Rc<str>> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.string_by_reference((u >> 1) as usize);
        }
        let len = (u >> 1) as usize;
        if len == 0 {
            return Ok("".into());
        }
        let bytes = r.read_bytes(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("invalid UTF-8 in string body"))?;
        let rc: Rc<str> = s.into();
        self.cx.add_string(&rc);
        Ok(rc)
    }

    fn read_date(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.object_by_reference((u >> 1) as usize);
        }
        let millis = r.read_be::<f64>()?;
        if !millis.is_finite() {
            return Err(malformed_error!("non-finite date value {}", millis));
        }
        let Some(utc) = chrono::Utc.timestamp_millis_opt(millis as i64).single() else {
            return Err(malformed_error!("date value {} out of range", millis));
        };
        let date = match self.opts.timezone_offset {
            Some(offset) => utc + offset,
            None => utc,
        };
        let value = Value::Date(date);
        self.cx.add_object(&value);
        Ok(value)
    }

    fn read_xml(&mut self, r: &mut Reader<'_>, legacy: bool) -> Result<Value> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.object_by_reference((u >> 1) as usize);
        }
        let len = (u >> 1) as usize;
        let bytes = r.read_bytes(len)?;
        let content = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("invalid UTF-8 in XML body"))?
            .to_string();
        let value = Value::Xml(Rc::new(Xml { content, legacy }));
        self.cx.add_object(&value);
        Ok(value)
    }

    fn read_array(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.object_by_reference((u >> 1) as usize);
        }
        let count = (u >> 1) as usize;

        let first_key = self.read_utf8(r)?;
        if first_key.is_empty() {
            // Dense only. Every element is at least one marker byte, so the
            // remaining buffer bounds the trustworthy capacity.
            let rc = Rc::new(RefCell::new(Vec::with_capacity(min(count, r.remaining()))));
            let value = Value::Array(rc.clone());
            self.cx.add_object(&value);
            for _ in 0..count {
                let element = self.read_value(r)?;
                rc.borrow_mut().push(element);
            }
            return Ok(value);
        }

        let rc = Rc::new(RefCell::new(MixedArray::default()));
        let value = Value::Mixed(rc.clone());
        self.cx.add_object(&value);
        let mut key = first_key;
        loop {
            let element = self.read_value(r)?;
            rc.borrow_mut().assoc.push((key, element));
            key = self.read_utf8(r)?;
            if key.is_empty() {
                break;
            }
        }
        for _ in 0..count {
            let element = self.read_value(r)?;
            rc.borrow_mut().dense.push(element);
        }
        Ok(value)
    }

    fn read_bytearray(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.object_by_reference((u >> 1) as usize);
        }
        let len = (u >> 1) as usize;
        let bytes = r.read_bytes(len)?;
        let value = Value::bytes(ByteArray::from_bytes(bytes.to_vec()));
        self.cx.add_object(&value);
        Ok(value)
    }

    fn read_object(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let u = r.read_u29()?;
        if u & 1 == 0 {
            return self.cx.object_by_reference((u >> 1) as usize);
        }

        let traits = if u & 0b10 == 0 {
            self.cx.traits_by_reference((u >> 2) as usize)?
        } else {
            let external = u & 0b100 != 0;
            let dynamic = u & 0b1000 != 0;
            let count = (u >> 4) as usize;
            let class_name = self.read_utf8(r)?;
            let alias = if class_name.is_empty() {
                None
            } else {
                Some(self.cx.alias_for(&class_name)?)
            };
            if count > r.remaining() {
                return Err(Underrun);
            }
            let mut attributes = Vec::with_capacity(count);
            for _ in 0..count {
                attributes.push(self.read_utf8(r)?);
            }
            let mode = if external {
                TraitsMode::External
            } else if dynamic {
                TraitsMode::Dynamic
            } else {
                TraitsMode::Static
            };
            let traits = Rc::new(Traits {
                class_name,
                mode,
                attributes,
                alias,
            });
            self.cx.add_traits(traits.clone());
            traits
        };

        if traits.mode == TraitsMode::External {
            let Some(hooks) = traits.alias.as_ref().and_then(|a| a.hooks().cloned()) else {
                return Err(malformed_error!(
                    "external class '{}' has no registered hooks",
                    traits.class_name
                ));
            };
            let instance = match &traits.alias {
                Some(alias) => alias.create_instance(),
                None => Object::new(),
            };
            let rc = Rc::new(RefCell::new(instance));
            let value = Value::Object(rc.clone());
            let index = self.cx.add_object(&value);
            return match hooks.read(self, r, &rc)? {
                Some(inner) => {
                    // Transparent envelope: back-references to it resolve to
                    // the carried value.
                    self.cx.replace_object(index, inner.clone());
                    Ok(inner)
                }
                None => Ok(value),
            };
        }

        let instance = match &traits.alias {
            Some(alias) => alias.create_instance(),
            None => Object::new(),
        };
        let rc = Rc::new(RefCell::new(instance));
        let value = Value::Object(rc.clone());
        self.cx.add_object(&value);

        let mut attrs: Vec<(Rc<str>, Value)> = Vec::with_capacity(traits.attributes.len());
        for name in &traits.attributes {
            attrs.push((name.clone(), self.read_value(r)?));
        }
        if traits.mode == TraitsMode::Dynamic {
            loop {
                let key = self.read_utf8(r)?;
                if key.is_empty() {
                    break;
                }
                let element = self.read_value(r)?;
                attrs.push((key, element));
            }
        }

        match &traits.alias {
            Some(alias) => {
                let attrs = alias.decodable_attributes(attrs)?;
                alias.apply_attributes(&mut rc.borrow_mut(), attrs);
            }
            None => {
                let mut obj = rc.borrow_mut();
                for (name, element) in attrs {
                    obj.set(name, element);
                }
            }
        }
        Ok(value)
    }
}
