//! Incremental decoding against partially-arrived buffers.
//!
//! Models a network caller: bytes arrive in chunks, the decoder reports
//! [`amfwire::Error::Underrun`] for elements that are not complete yet, and
//! decoding resumes from the reported position once more data is buffered.

use amfwire::{decode_with, encode_with, AmfVersion, CodecOptions, Object, Registry, Value};
use std::sync::Arc;

fn options() -> CodecOptions {
    CodecOptions {
        registry: Arc::new(Registry::with_defaults()),
        ..CodecOptions::default()
    }
}

/// Feed `wire` one byte at a time, draining complete elements as they become
/// available. Returns the decoded values and how many underruns were seen.
fn drip_feed(wire: &[u8], opts: &CodecOptions) -> (Vec<Value>, usize) {
    let mut buffered = Vec::new();
    let mut consumed = 0usize;
    let mut values = Vec::new();
    let mut underruns = 0usize;

    for byte in wire {
        buffered.push(*byte);
        let mut stream = decode_with(&buffered[consumed..], AmfVersion::Amf3, opts.clone());
        loop {
            match stream.next() {
                Some(Ok(value)) => values.push(value),
                Some(Err(err)) => {
                    assert!(err.is_underrun(), "unexpected fatal error: {err:?}");
                    underruns += 1;
                    break;
                }
                None => break,
            }
        }
        consumed += stream.position();
    }
    (values, underruns)
}

#[test]
fn empty_input_yields_no_elements() {
    let mut stream = decode_with(&[], AmfVersion::Amf3, options());
    assert!(stream.next().is_none());
    assert_eq!(stream.position(), 0);
}

#[test]
fn one_byte_at_a_time_decodes_every_element_exactly_once() {
    let opts = options();
    let values = vec![
        Value::Int(300),
        Value::string("chunked"),
        Value::array(vec![Value::Bool(true), Value::Null]),
    ];
    let wire = encode_with(&values, AmfVersion::Amf3, &opts).unwrap();

    let (decoded, underruns) = drip_feed(&wire, &opts);
    assert_eq!(decoded, values);
    // Every prefix short of an element boundary reported an underrun.
    assert!(underruns > 0);
}

#[test]
fn position_advances_only_past_complete_elements() {
    let opts = options();
    // An integer, then a string missing its final byte.
    let wire = [0x04, 0x2A, 0x06, 0x05, b'h'];
    let mut stream = decode_with(&wire, AmfVersion::Amf3, opts);

    assert_eq!(stream.next().unwrap().unwrap(), Value::Int(42));
    assert_eq!(stream.position(), 2);

    assert!(stream.next().unwrap().unwrap_err().is_underrun());
    assert_eq!(stream.position(), 2);
}

#[test]
fn resume_after_buffering_the_missing_tail() {
    let opts = options();
    let values = vec![Value::string("first"), Value::Int(2)];
    let wire = encode_with(&values, AmfVersion::Amf3, &opts).unwrap();

    // First attempt sees a truncated tail.
    let cut = wire.len() - 1;
    let mut stream = decode_with(&wire[..cut], AmfVersion::Amf3, opts.clone());
    assert_eq!(stream.next().unwrap().unwrap(), values[0]);
    assert!(stream.next().unwrap().unwrap_err().is_underrun());
    let resume = stream.position();

    // Retry from the resume offset once the rest arrived.
    let mut stream = decode_with(&wire[resume..], AmfVersion::Amf3, opts);
    assert_eq!(stream.next().unwrap().unwrap(), values[1]);
    assert!(stream.next().is_none());
}

#[test]
fn decoding_is_lazy() {
    let opts = options();
    // A valid integer followed by garbage; nothing is touched until pulled.
    let wire = [0x04, 0x01, 0xFF];
    let mut stream = decode_with(&wire, AmfVersion::Amf3, opts);
    assert_eq!(stream.position(), 0);
    assert_eq!(stream.next().unwrap().unwrap(), Value::Int(1));
    assert_eq!(stream.position(), 2);
    assert!(stream.next().unwrap().unwrap_err().is_malformed());
}

#[test]
fn fatal_errors_fuse_the_stream() {
    let mut stream = decode_with(&[0xFF, 0x04, 0x01], AmfVersion::Amf3, options());
    assert!(stream.next().unwrap().unwrap_err().is_malformed());
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
}

#[test]
fn reference_tables_span_all_elements_of_one_stream() {
    let opts = options();
    let mut obj = Object::new();
    obj.set("n", Value::Int(1));
    let shared = Value::object(obj);
    let wire = encode_with(&[shared.clone(), shared], AmfVersion::Amf3, &opts).unwrap();

    let decoded: Vec<Value> = decode_with(&wire, AmfVersion::Amf3, opts)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded[0].identity(), decoded[1].identity());
}
