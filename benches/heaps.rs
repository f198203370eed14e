//! Benchmarks for heap interning and the string heap freeze.
//!
//! Covers the hot paths of one emission pass:
//! - String interning and the reversed-lexicographic suffix-folding freeze
//! - Blob deduplication
//! - User-string UTF-16 encoding
//! - Full pipeline over a synthetic module

extern crate dotforge;

use criterion::{criterion_group, criterion_main, Criterion};
use dotforge::metadata::heaps::{BlobHeap, StringHeap, UserStringHeap};
use dotforge::prelude::*;
use std::hint::black_box;
use uguid::Guid;

/// Benchmark interning and freezing a heap of overlapping identifiers.
///
/// Suffix folding is the expensive part: names sharing tails ("get_Value",
/// "set_Value", "Value") collapse into each other during freeze.
fn bench_string_heap_freeze(c: &mut Criterion) {
    let names: Vec<String> = (0..1000)
        .map(|i| format!("Namespace{}.Type{}Exception", i % 50, i))
        .collect();

    c.bench_function("strings_intern_and_freeze", |b| {
        b.iter(|| {
            let mut heap = StringHeap::new();
            for name in &names {
                heap.intern(black_box(name)).unwrap();
            }
            heap.freeze();
            black_box(heap.size())
        });
    });
}

/// Benchmark blob interning with a high duplicate ratio, the common shape of
/// signature blobs.
fn bench_blob_dedup(c: &mut Criterion) {
    let blobs: Vec<Vec<u8>> = (0..1000)
        .map(|i| vec![0x06, 0x08, (i % 16) as u8])
        .collect();

    c.bench_function("blobs_intern_dedup", |b| {
        b.iter(|| {
            let mut heap = BlobHeap::new();
            for blob in &blobs {
                heap.intern(black_box(blob)).unwrap();
            }
            black_box(heap.size())
        });
    });
}

/// Benchmark UTF-16 user-string encoding.
fn bench_user_strings(c: &mut Criterion) {
    let strings: Vec<String> = (0..500)
        .map(|i| format!("diagnostic message number {i} with some payload"))
        .collect();

    c.bench_function("user_strings_intern", |b| {
        b.iter(|| {
            let mut heap = UserStringHeap::new();
            for value in &strings {
                heap.intern(black_box(value)).unwrap();
            }
            black_box(heap.size())
        });
    });
}

/// Benchmark a full emission pass over a module of 100 types.
fn bench_assemble_module(c: &mut Criterion) {
    let mut module = ModuleData::new("bench.dll", Guid::from_bytes([3u8; 16]));
    for i in 0..100 {
        let ty = module.add_type(TypeDefData::new("Bench", &format!("Type{i}"), 0x0010_0001));
        for j in 0..4 {
            module.add_field(ty, FieldData::new(&format!("field{j}"), 0x0001, TypeSig::I4));
        }
        let mut method = MethodData::new("Run", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
        method.body = Some(MethodBodyData {
            il: vec![0x2A],
            max_stack: 8,
            init_locals: false,
            locals: Vec::new(),
            exception_regions: Vec::new(),
        });
        module.add_method(ty, method);
    }

    c.bench_function("assemble_100_types", |b| {
        b.iter(|| {
            let mut buffers = MetadataBuffers::default();
            let summary = MetadataAssembler::new(black_box(&module))
                .assemble(&mut buffers)
                .unwrap();
            black_box((buffers.metadata.len(), summary.row_counts))
        });
    });
}

criterion_group!(
    benches,
    bench_string_heap_freeze,
    bench_blob_dedup,
    bench_user_strings,
    bench_assemble_module
);
criterion_main!(benches);
