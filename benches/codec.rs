//! Benchmarks for AMF encoding and decoding.
//!
//! Measures the hot paths of both wire dialects:
//! - Primitive scalars (the U29 varint and the double marker)
//! - String-heavy payloads (string-table pressure)
//! - Object graphs with shared references
//! - Typed objects against a registered class alias
//! - AMF0 with its fixed-width layout

extern crate amfwire;

use amfwire::{
    decode_with, encode_with, AmfVersion, ClassDef, CodecOptions, Object, Registry, Value,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn options() -> CodecOptions {
    CodecOptions {
        registry: Arc::new(Registry::with_defaults()),
        ..CodecOptions::default()
    }
}

fn decode_all(bytes: &[u8], version: AmfVersion, opts: &CodecOptions) -> Vec<Value> {
    decode_with(bytes, version, opts.clone())
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Benchmark encoding a run of small integers through the U29 fast path.
fn bench_encode_integers(c: &mut Criterion) {
    let opts = options();
    let values: Vec<Value> = (0..256).map(Value::Int).collect();

    c.bench_function("encode_integers_amf3", |b| {
        b.iter(|| {
            let bytes = encode_with(black_box(&values), AmfVersion::Amf3, &opts).unwrap();
            black_box(bytes)
        });
    });
}

/// Benchmark decoding the same integer run.
fn bench_decode_integers(c: &mut Criterion) {
    let opts = options();
    let values: Vec<Value> = (0..256).map(Value::Int).collect();
    let bytes = encode_with(&values, AmfVersion::Amf3, &opts).unwrap();

    c.bench_function("decode_integers_amf3", |b| {
        b.iter(|| black_box(decode_all(black_box(&bytes), AmfVersion::Amf3, &opts)));
    });
}

/// Benchmark a string-heavy payload with heavy string-table reuse.
fn bench_repeated_strings(c: &mut Criterion) {
    let opts = options();
    let keys = ["id", "name", "email", "role"];
    let values: Vec<Value> = (0..64)
        .map(|i| Value::string(keys[i % keys.len()]))
        .collect();
    let bytes = encode_with(&values, AmfVersion::Amf3, &opts).unwrap();

    c.bench_function("encode_repeated_strings_amf3", |b| {
        b.iter(|| {
            let bytes = encode_with(black_box(&values), AmfVersion::Amf3, &opts).unwrap();
            black_box(bytes)
        });
    });
    c.bench_function("decode_repeated_strings_amf3", |b| {
        b.iter(|| black_box(decode_all(black_box(&bytes), AmfVersion::Amf3, &opts)));
    });
}

/// Benchmark an object graph where one subtree is shared many times, so the
/// reference table carries most of the payload.
fn bench_shared_graph(c: &mut Criterion) {
    let opts = options();
    let mut leaf = Object::new();
    leaf.set("payload", Value::string("shared"));
    let shared = Value::object(leaf);
    let graph = Value::array(vec![shared; 32]);
    let bytes = encode_with(std::slice::from_ref(&graph), AmfVersion::Amf3, &opts).unwrap();

    c.bench_function("encode_shared_graph_amf3", |b| {
        b.iter(|| {
            let bytes =
                encode_with(std::slice::from_ref(black_box(&graph)), AmfVersion::Amf3, &opts)
                    .unwrap();
            black_box(bytes)
        });
    });
    c.bench_function("decode_shared_graph_amf3", |b| {
        b.iter(|| black_box(decode_all(black_box(&bytes), AmfVersion::Amf3, &opts)));
    });
}

/// Benchmark typed objects against a sealed registered class, where the
/// traits table collapses every instance after the first to values only.
fn bench_typed_objects(c: &mut Criterion) {
    let registry = Arc::new(Registry::with_defaults());
    registry
        .register_class(
            ClassDef::new("bench.User")
                .static_attrs(["id", "name", "email"])
                .dynamic(false),
        )
        .unwrap();
    let opts = CodecOptions {
        registry,
        ..CodecOptions::default()
    };

    let values: Vec<Value> = (0..32)
        .map(|i| {
            let mut user = Object::typed("bench.User");
            user.set("id", Value::Int(i));
            user.set("name", Value::string("ada"));
            user.set("email", Value::string("ada@example.com"));
            Value::object(user)
        })
        .collect();
    let bytes = encode_with(&values, AmfVersion::Amf3, &opts).unwrap();

    c.bench_function("encode_typed_objects_amf3", |b| {
        b.iter(|| {
            let bytes = encode_with(black_box(&values), AmfVersion::Amf3, &opts).unwrap();
            black_box(bytes)
        });
    });
    c.bench_function("decode_typed_objects_amf3", |b| {
        b.iter(|| black_box(decode_all(black_box(&bytes), AmfVersion::Amf3, &opts)));
    });
}

/// Benchmark the AMF0 dialect on a mixed payload.
fn bench_amf0(c: &mut Criterion) {
    let opts = options();
    let mut obj = Object::new();
    obj.set("n", Value::Number(1.5));
    obj.set("s", Value::string("legacy"));
    let values = vec![
        Value::Int(42),
        Value::string("hello"),
        Value::array(vec![Value::Bool(true), Value::Null]),
        Value::object(obj),
    ];
    let bytes = encode_with(&values, AmfVersion::Amf0, &opts).unwrap();

    c.bench_function("encode_mixed_amf0", |b| {
        b.iter(|| {
            let bytes = encode_with(black_box(&values), AmfVersion::Amf0, &opts).unwrap();
            black_box(bytes)
        });
    });
    c.bench_function("decode_mixed_amf0", |b| {
        b.iter(|| black_box(decode_all(black_box(&bytes), AmfVersion::Amf0, &opts)));
    });
}

criterion_group!(
    benches,
    bench_encode_integers,
    bench_decode_integers,
    bench_repeated_strings,
    bench_shared_graph,
    bench_typed_objects,
    bench_amf0,
);
criterion_main!(benches);
