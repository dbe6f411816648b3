//! Encoder and decoder for the AMF0 wire format.
//!
//! AMF0 is the legacy Flash encoding: fixed-width lengths (u16/u32 prefixes
//! instead of U29 varints), no integer type (every number is an 8-byte
//! double), no string table, and a single object reference table addressed
//! by u16 indices. Marker `0x11` escapes into AMF3 mid-stream, which is how
//! an AMF0 pass carries byte arrays and classes that prefer or require the
//! newer format.
//!
//! # Number collapse
//!
//! The format has no integer marker, so round-tripping `Value::Int` through
//! the double representation would change a value's variant. The decoder
//! collapses every finite, fraction-free double in the `i32` domain back to
//! [`Value::Int`], keeping the two formats interchangeable for integral
//! numbers.
//!
//! # Reserved markers
//!
//! `MovieClip` (0x04) and `RecordSet` (0x0E) were reserved and never
//! specified; both are fatal on decode. `Unsupported` (0x0D) decodes to
//! [`Value::Undefined`].

use std::rc::Rc;

use strum::{Display, FromRepr};

use crate::{
    amf3,
    buffer::{Reader, Writer},
    codec::CodecOptions,
    context::Context,
    value::{MixedArray, Object, Xml},
    Error::{OutOfRangeReference, Underrun, Unencodable},
    Result, Value,
};

/// AMF0 wire marker bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u8)]
pub enum Amf0Marker {
    /// 8-byte IEEE 754 double.
    Number = 0x00,
    /// Single-byte boolean.
    Boolean = 0x01,
    /// UTF-8 string with a u16 byte-length prefix.
    String = 0x02,
    /// Anonymous object, key/value pairs up to the end marker.
    Object = 0x03,
    /// Reserved, never specified; fatal on decode.
    MovieClip = 0x04,
    /// The `null` value.
    Null = 0x05,
    /// The `undefined` sentinel.
    Undefined = 0x06,
    /// u16 index into the object reference table.
    Reference = 0x07,
    /// Associative array with an advisory u32 count.
    EcmaArray = 0x08,
    /// Terminates an object or ECMA array body (after an empty key).
    ObjectEnd = 0x09,
    /// Dense array with a u32 element count.
    StrictArray = 0x0A,
    /// Milliseconds-since-epoch double plus an ignored i16 timezone.
    Date = 0x0B,
    /// UTF-8 string with a u32 byte-length prefix.
    LongString = 0x0C,
    /// Decodes to `undefined`; never written.
    Unsupported = 0x0D,
    /// Reserved, never specified; fatal on decode.
    RecordSet = 0x0E,
    /// XML document with a u32 byte-length prefix.
    XmlDocument = 0x0F,
    /// Object prefixed with a u16-length class name.
    TypedObject = 0x10,
    /// Escape: the next value is AMF3.
    AvmPlus = 0x11,
}

const OBJECT_END: [u8; 3] = [0x00, 0x00, 0x09];

fn collapse_number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n)
    {
        Value::Int(n as i32)
    } else {
        Value::Number(n)
    }
}

/// Writes [`Value`] graphs in the AMF0 wire format.
///
/// Carries two contexts: its own (for the AMF0 object table) and one for the
/// AMF3 sub-stream entered through the `0x11` escape, which keeps its own
/// tables across every escape within the pass.
pub struct Encoder<'a> {
    cx: &'a mut Context,
    amf3_cx: &'a mut Context,
    opts: &'a CodecOptions,
}

impl<'a> Encoder<'a> {
    /// Create an encoder over the AMF0 and AMF3-escape contexts.
    pub fn new(cx: &'a mut Context, amf3_cx: &'a mut Context, opts: &'a CodecOptions) -> Self {
        Encoder { cx, amf3_cx, opts }
    }

    /// Write one value, marker included.
    ///
    /// # Errors
    /// [`crate::Error::Unencodable`] for values the format can not express,
    /// or any alias-resolution error for typed objects.
    pub fn write_value(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        if self.opts.use_amf3 {
            return self.write_avm_plus(w, value);
        }
        match value {
            Value::Undefined => w.put_u8(Amf0Marker::Undefined as u8),
            Value::Null => w.put_u8(Amf0Marker::Null as u8),
            Value::Bool(b) => {
                w.put_u8(Amf0Marker::Boolean as u8);
                w.put_u8(u8::from(*b));
            }
            Value::Int(i) => {
                // No integer type; integral values travel as doubles and the
                // decoder collapses them back.
                w.put_u8(Amf0Marker::Number as u8);
                w.put_be(f64::from(*i));
            }
            Value::Number(n) => {
                w.put_u8(Amf0Marker::Number as u8);
                w.put_be(*n);
            }
            Value::String(s) => self.write_string_value(w, s)?,
            Value::Date(dt) => {
                // Dates have no identity but still consume a table index so
                // encoder and decoder tables stay aligned.
                self.cx.add_object(value);
                w.put_u8(Amf0Marker::Date as u8);
                let utc = match self.opts.timezone_offset {
                    Some(offset) => *dt - offset,
                    None => *dt,
                };
                w.put_be(utc.timestamp_millis() as f64);
                // Timezone field is historical; always written as zero.
                w.put_be(0i16);
            }
            Value::Xml(xml) => {
                if self.write_reference(w, value)? {
                    return Ok(());
                }
                self.cx.add_object(value);
                w.put_u8(Amf0Marker::XmlDocument as u8);
                let len = u32::try_from(xml.content.len()).map_err(|_| {
                    Unencodable("XML payload exceeds the u32 length domain".to_string())
                })?;
                w.put_be(len);
                w.put_bytes(xml.content.as_bytes());
            }
            Value::Array(rc) => {
                if self.write_reference(w, value)? {
                    return Ok(());
                }
                self.cx.add_object(value);
                w.put_u8(Amf0Marker::StrictArray as u8);
                let elements = rc.borrow();
                let len = u32::try_from(elements.len()).map_err(|_| {
                    Unencodable("array exceeds the u32 count domain".to_string())
                })?;
                w.put_be(len);
                for element in elements.iter() {
                    self.write_value(w, element)?;
                }
            }
            Value::Mixed(rc) => {
                if self.write_reference(w, value)? {
                    return Ok(());
                }
                self.cx.add_object(value);
                w.put_u8(Amf0Marker::EcmaArray as u8);
                let array = rc.borrow();
                let count = u32::try_from(array.assoc.len() + array.dense.len())
                    .map_err(|_| Unencodable("array exceeds the u32 count domain".to_string()))?;
                w.put_be(count);
                for (key, element) in &array.assoc {
                    if key.is_empty() {
                        return Err(Unencodable(
                            "empty-string key collides with the object-end terminator".to_string(),
                        ));
                    }
                    self.write_utf(w, key)?;
                    self.write_value(w, element)?;
                }
                // Dense elements travel as stringified indices.
                for (index, element) in array.dense.iter().enumerate() {
                    self.write_utf(w, &index.to_string())?;
                    self.write_value(w, element)?;
                }
                w.put_bytes(&OBJECT_END);
            }
            Value::Object(rc) => return self.write_object(w, value, rc),
            Value::Bytes(_) => return self.write_avm_plus(w, value),
        }
        Ok(())
    }

    fn write_object(
        &mut self,
        w: &mut Writer,
        value: &Value,
        rc: &Rc<std::cell::RefCell<Object>>,
    ) -> Result<()> {
        let class_name = rc.borrow().class_name.clone();
        let Some(class_name) = class_name else {
            if self.write_reference(w, value)? {
                return Ok(());
            }
            self.cx.add_object(value);
            w.put_u8(Amf0Marker::Object as u8);
            let obj = rc.borrow();
            for (key, element) in obj.iter() {
                if key.is_empty() {
                    return Err(Unencodable(
                        "empty-string key collides with the object-end terminator".to_string(),
                    ));
                }
                self.write_utf(w, key)?;
                self.write_value(w, element)?;
            }
            w.put_bytes(&OBJECT_END);
            return Ok(());
        };

        let alias = self.cx.alias_for(&class_name)?;
        if alias.is_external() || alias.is_amf3() {
            // AMF0 has no external mode; such classes ride the AMF3 escape.
            return self.write_avm_plus(w, value);
        }

        if self.write_reference(w, value)? {
            return Ok(());
        }
        self.cx.add_object(value);
        w.put_u8(Amf0Marker::TypedObject as u8);
        self.write_utf(w, alias.alias_name())?;
        let plan = alias.encodable_attributes(&rc.borrow());
        for attr in &plan {
            if attr.name.is_empty() {
                return Err(Unencodable(
                    "empty-string key collides with the object-end terminator".to_string(),
                ));
            }
            self.write_utf(w, &attr.name)?;
            self.write_value(w, &attr.value)?;
        }
        w.put_bytes(&OBJECT_END);
        Ok(())
    }

    fn write_avm_plus(&mut self, w: &mut Writer, value: &Value) -> Result<()> {
        w.put_u8(Amf0Marker::AvmPlus as u8);
        amf3::Encoder::new(self.amf3_cx, self.opts).write_value(w, value)
    }

    /// Write a reference marker when `value` was already written and its
    /// index fits the u16 wire field. Returns whether a reference was
    /// written.
    fn write_reference(&mut self, w: &mut Writer, value: &Value) -> Result<bool> {
        let Some(index) = self.cx.object_reference(value) else {
            return Ok(false);
        };
        let Ok(index) = u16::try_from(index) else {
            // Past the addressable range the value is simply written again.
            return Ok(false);
        };
        w.put_u8(Amf0Marker::Reference as u8);
        w.put_be(index);
        Ok(true)
    }

    fn write_utf(&mut self, w: &mut Writer, s: &str) -> Result<()> {
        let len = u16::try_from(s.len()).map_err(|_| {
            Unencodable(format!("string of {} bytes exceeds the u16 prefix", s.len()))
        })?;
        w.put_be(len);
        w.put_bytes(s.as_bytes());
        Ok(())
    }

    fn write_string_value(&mut self, w: &mut Writer, s: &str) -> Result<()> {
        if s.len() <= usize::from(u16::MAX) {
            w.put_u8(Amf0Marker::String as u8);
            return self.write_utf(w, s);
        }
        let len = u32::try_from(s.len()).map_err(|_| {
            Unencodable("string exceeds the u32 length domain".to_string())
        })?;
        w.put_u8(Amf0Marker::LongString as u8);
        w.put_be(len);
        w.put_bytes(s.as_bytes());
        Ok(())
    }
}

/// Reads [`Value`] graphs in the AMF0 wire format.
pub struct Decoder<'a> {
    cx: &'a mut Context,
    amf3_cx: &'a mut Context,
    opts: &'a CodecOptions,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over the AMF0 and AMF3-escape contexts.
    pub fn new(cx: &'a mut Context, amf3_cx: &'a mut Context, opts: &'a CodecOptions) -> Self {
        Decoder { cx, amf3_cx, opts }
    }

    /// Read one value, marker included.
    ///
    /// # Errors
    /// [`crate::Error::Underrun`] when the buffer ends mid-element;
    /// [`crate::Error::Malformed`] and friends for wire corruption,
    /// including the reserved `MovieClip` and `RecordSet` markers.
    pub fn read_value(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let byte = r.read_u8()?;
        let Some(marker) = Amf0Marker::from_repr(byte) else {
            return Err(malformed_error!("unknown AMF0 type marker 0x{:02x}", byte));
        };
        match marker {
            Amf0Marker::Number => Ok(collapse_number(r.read_be()?)),
            Amf0Marker::Boolean => Ok(Value::Bool(r.read_u8()? != 0)),
            Amf0Marker::String => Ok(Value::String(self.read_utf(r)?.into())),
            Amf0Marker::Object => {
                let value = Value::object(Object::new());
                self.cx.add_object(&value);
                let pairs = self.read_pairs(r)?;
                if let Value::Object(rc) = &value {
                    let mut obj = rc.borrow_mut();
                    for (key, element) in pairs {
                        obj.set(key, element);
                    }
                }
                Ok(value)
            }
            Amf0Marker::MovieClip | Amf0Marker::RecordSet => Err(malformed_error!(
                "reserved AMF0 marker {:?} (0x{:02x})",
                marker,
                byte
            )),
            Amf0Marker::Null => Ok(Value::Null),
            Amf0Marker::Undefined => Ok(Value::Undefined),
            Amf0Marker::Reference => {
                let index = usize::from(r.read_be::<u16>()?);
                self.cx.object_by_reference(index)
            }
            Amf0Marker::EcmaArray => self.read_ecma_array(r),
            Amf0Marker::ObjectEnd => {
                Err(malformed_error!("object-end marker outside an object body"))
            }
            Amf0Marker::StrictArray => {
                let count = r.read_be::<u32>()? as usize;
                if count > r.remaining() {
                    return Err(Underrun);
                }
                let value = Value::array(Vec::with_capacity(count));
                self.cx.add_object(&value);
                for _ in 0..count {
                    let element = self.read_value(r)?;
                    if let Value::Array(rc) = &value {
                        rc.borrow_mut().push(element);
                    }
                }
                Ok(value)
            }
            Amf0Marker::Date => {
                let millis = r.read_be::<f64>()?;
                let _tz = r.read_be::<i16>()?;
                if !millis.is_finite() {
                    return Err(malformed_error!("non-finite date value {}", millis));
                }
                let Some(utc) = chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, millis as i64)
                    .single()
                else {
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
            Amf0Marker::LongString => {
                let len = r.read_be::<u32>()? as usize;
                let bytes = r.read_bytes(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| malformed_error!("invalid UTF-8 in long string body"))?;
                Ok(Value::string(s))
            }
            Amf0Marker::Unsupported => Ok(Value::Undefined),
            Amf0Marker::XmlDocument => {
                let len = r.read_be::<u32>()? as usize;
                let bytes = r.read_bytes(len)?;
                let content = std::str::from_utf8(bytes)
                    .map_err(|_| malformed_error!("invalid UTF-8 in XML body"))?
                    .to_string();
                let value = Value::Xml(Rc::new(Xml {
                    content,
                    legacy: true,
                }));
                self.cx.add_object(&value);
                Ok(value)
            }
            Amf0Marker::TypedObject => self.read_typed_object(r),
            Amf0Marker::AvmPlus => {
                amf3::Decoder::new(self.amf3_cx, self.opts).read_value(r)
            }
        }
    }

    fn read_ecma_array(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        // The count is advisory; the terminator is authoritative.
        let _count = r.read_be::<u32>()?;
        let value = Value::Mixed(Rc::new(std::cell::RefCell::new(MixedArray::default())));
        self.cx.add_object(&value);
        let pairs = self.read_pairs(r)?;
        if let Value::Mixed(rc) = &value {
            let mut array = rc.borrow_mut();
            array.assoc = pairs;
            // Fold the stringified dense indices back into the dense portion.
            let mut index = 0usize;
            loop {
                let key = index.to_string();
                let Some(position) = array.assoc.iter().position(|(k, _)| k.as_ref() == key)
                else {
                    break;
                };
                let (_, element) = array.assoc.remove(position);
                array.dense.push(element);
                index += 1;
            }
        }
        Ok(value)
    }

    fn read_typed_object(&mut self, r: &mut Reader<'_>) -> Result<Value> {
        let class_name = self.read_utf(r)?;
        if class_name.is_empty() {
            return Err(malformed_error!("typed object with an empty class name"));
        }
        let alias = self.cx.alias_for(&class_name)?;
        let value = Value::object(alias.create_instance());
        self.cx.add_object(&value);
        let pairs = self.read_pairs(r)?;
        let attrs = alias.decodable_attributes(pairs)?;
        if let Value::Object(rc) = &value {
            alias.apply_attributes(&mut rc.borrow_mut(), attrs);
        }
        Ok(value)
    }

    fn read_pairs(&mut self, r: &mut Reader<'_>) -> Result<Vec<(Rc<str>, Value)>> {
        let mut pairs = Vec::new();
        loop {
            let key = self.read_utf(r)?;
            if key.is_empty() {
                let marker = r.read_u8()?;
                if marker != Amf0Marker::ObjectEnd as u8 {
                    return Err(malformed_error!(
                        "expected object-end after empty key, found 0x{:02x}",
                        marker
                    ));
                }
                return Ok(pairs);
            }
            let element = self.read_value(r)?;
            pairs.push((key.into(), element));
        }
    }

    fn read_utf(&mut self, r: &mut Reader<'_>) -> Result<String> {
        let len = usize::from(r.read_be::<u16>()?);
        let bytes = r.read_bytes(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("invalid UTF-8 in string body"))?;
        Ok(s.to_string())
    }
}
