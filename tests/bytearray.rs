//! `ByteArray` as a value on the wire and as a container for embedded
//! AMF3 passes.

use amfwire::{decode, encode, AmfVersion, ByteArray, Endian, Value};

#[test]
fn byte_arrays_round_trip_as_opaque_payloads() {
    let mut ba = ByteArray::new();
    ba.write::<u32>(0xDEAD_BEEF);
    ba.write_bool(true);
    let value = Value::bytes(ba.clone());

    for version in [AmfVersion::Amf0, AmfVersion::Amf3] {
        let bytes = encode(std::slice::from_ref(&value), version).unwrap();
        let decoded = decode(&bytes, version).next().unwrap().unwrap();
        let Value::Bytes(rc) = decoded else { panic!("expected bytes") };
        assert_eq!(rc.borrow().bytes(), ba.bytes());
    }
}

#[test]
fn endianness_is_a_property_of_the_buffer_not_the_wire() {
    let mut ba = ByteArray::new();
    ba.set_endian(Endian::Little);
    ba.write::<u16>(0x0102);
    assert_eq!(ba.bytes(), [0x02, 0x01]);

    let bytes = encode(&[Value::bytes(ba)], AmfVersion::Amf3).unwrap();
    let decoded = decode(&bytes, AmfVersion::Amf3).next().unwrap().unwrap();
    let Value::Bytes(rc) = decoded else { panic!("expected bytes") };
    // The raw layout travels untouched; the endian setting itself does not.
    assert_eq!(rc.borrow().bytes(), [0x02, 0x01]);
    assert_eq!(rc.borrow().endian(), Endian::Big);
}

#[test]
fn embedded_passes_use_fresh_reference_tables() {
    let shared = Value::array(vec![Value::Int(3)]);

    // Standalone encoding of the same value, for comparison.
    let standalone = encode(std::slice::from_ref(&shared), AmfVersion::Amf3).unwrap();

    let mut ba = ByteArray::new();
    ba.write_object(&shared).unwrap();
    ba.write_object(&shared).unwrap();

    // Each write is a fresh pass: two full inline bodies, no reference
    // from the second to the first.
    assert_eq!(ba.len(), standalone.len() * 2);
    assert_eq!(&ba.bytes()[..standalone.len()], standalone.as_slice());
    assert_eq!(&ba.bytes()[standalone.len()..], standalone.as_slice());
}

#[test]
fn embedded_passes_are_isolated_from_the_outer_stream() {
    let shared = Value::array(vec![Value::Int(3)]);
    let mut ba = ByteArray::new();
    ba.write_object(&shared).unwrap();
    let embedded = ba.bytes().to_vec();

    // The outer stream writes the array first, so its table already holds
    // it; the copy inside the byte array must still be a full inline body.
    let bytes = encode(&[shared, Value::bytes(ba)], AmfVersion::Amf3).unwrap();
    assert!(bytes
        .windows(embedded.len())
        .any(|w| w == embedded.as_slice()));
}

#[test]
fn embedded_objects_read_back_in_sequence() {
    let mut ba = ByteArray::new();
    ba.write_object(&Value::Int(1)).unwrap();
    ba.write_object(&Value::string("two")).unwrap();
    ba.write::<u8>(0xAA);

    ba.seek(0).unwrap();
    assert_eq!(ba.read_object().unwrap(), Value::Int(1));
    assert_eq!(ba.read_object().unwrap(), Value::string("two"));
    // The cursor lands exactly after the last element.
    assert_eq!(ba.read::<u8>().unwrap(), 0xAA);
    assert_eq!(ba.bytes_available(), 0);
}

#[test]
fn truncated_embedded_object_leaves_the_cursor_alone() {
    let mut ba = ByteArray::new();
    ba.write_object(&Value::string("payload")).unwrap();
    let full = ba.len();

    let mut truncated = ByteArray::from_bytes(ba.bytes()[..full - 2].to_vec());
    let err = truncated.read_object().unwrap_err();
    assert!(err.is_underrun());
    assert_eq!(truncated.position(), 0);
}

#[test]
fn zlib_detection_sniffs_the_header() {
    assert!(ByteArray::from_bytes(vec![0x78, 0x9C, 0x01]).is_compressed());
    assert!(ByteArray::from_bytes(vec![0x78, 0x01]).is_compressed());
    assert!(!ByteArray::from_bytes(vec![0x78, 0x9D]).is_compressed());
    assert!(!ByteArray::from_bytes(vec![0x0A, 0x0B]).is_compressed());
    assert!(!ByteArray::from_bytes(vec![]).is_compressed());
}
