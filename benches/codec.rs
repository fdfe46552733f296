//! Performance benchmarks for encoding and decoding.
//!
//! Run with: `cargo bench --bench codec`
//!
//! The benchmark graph is a list of records that all share one hub record
//! and each point back at their predecessor, so every record after the
//! first produces two pointers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use toastpoint::{
    canonical_hash, decode, encode, ClassRegistry, DecodeOptions, EncodeOptions, Value,
};

/// Build a list of `n` records sharing one hub, each linked to the previous.
fn make_graph(n: usize) -> Value {
    let hub = Value::record([("name", Value::from("hub")), ("weight", Value::from(0.125))]);
    let mut nodes = Vec::with_capacity(n);
    let mut prev = Value::Null;
    for i in 0..n {
        let node = Value::record([
            ("index", Value::from(i as i64)),
            ("hub", hub.clone()),
            ("prev", prev.clone()),
            ("tags", Value::list([Value::from("a"), Value::from(i as f64 / 3.0)])),
        ]);
        prev = node.clone();
        nodes.push(node);
    }
    Value::list(nodes)
}

/// Benchmark encoding.
fn bench_encode(c: &mut Criterion) {
    let registry = ClassRegistry::new();
    let mut group = c.benchmark_group("encode");

    for n in [10, 100, 1000] {
        let roots = [make_graph(n)];
        for (label, options) in [("v2", EncodeOptions::default()), ("v1", EncodeOptions::v1())] {
            group.throughput(Throughput::Elements(n as u64));
            group.bench_with_input(BenchmarkId::new(label, n), &roots, |b, roots| {
                b.iter(|| encode(black_box(roots), &registry, &options).unwrap())
            });
        }
    }

    group.finish();
}

/// Benchmark decoding, flat (v2) and recursive (v1) resolution.
fn bench_decode(c: &mut Criterion) {
    let registry = ClassRegistry::new();
    let decode_options = DecodeOptions::default();
    let mut group = c.benchmark_group("decode");

    for n in [10, 100, 1000] {
        let roots = [make_graph(n)];
        for (label, options) in [("v2", EncodeOptions::default()), ("v1", EncodeOptions::v1())] {
            let doc = encode(&roots, &registry, &options).unwrap();

            group.throughput(Throughput::Elements(n as u64));
            group.bench_with_input(BenchmarkId::new(label, n), &doc, |b, doc| {
                b.iter(|| decode(black_box(doc), &registry, &decode_options).unwrap())
            });
        }
    }

    group.finish();
}

/// Benchmark canonical hashing of encoded documents.
fn bench_canonical_hash(c: &mut Criterion) {
    let registry = ClassRegistry::new();
    let mut group = c.benchmark_group("canonical_hash");

    for n in [10, 100, 1000] {
        let doc = encode(&[make_graph(n)], &registry, &EncodeOptions::default()).unwrap();

        group.bench_with_input(BenchmarkId::new("nodes", n), &doc, |b, doc| {
            b.iter(|| canonical_hash(black_box(doc)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_canonical_hash);
criterion_main!(benches);
