//! Schematic codec benchmarks.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use plot_region::{BlockPos, MemoryWorld, Region};
use plot_schematic::{CaptureOptions, capture, decode, serialize};

fn codec_benchmarks(c: &mut Criterion) {
    let world = MemoryWorld::new(42, -64, 63);
    let mut group = c.benchmark_group("codec");

    for size in [16, 48, 96] {
        let region = Region::with_size(BlockPos::new(0, -64, 0), size, 128, size)
            .expect("valid region");
        let schematic = capture(&region, &world, CaptureOptions::default()).expect("capture");
        let bytes = serialize(&schematic);
        group.throughput(Throughput::Elements(region.volume()));

        group.bench_with_input(BenchmarkId::new("serialize", size), &schematic, |b, s| {
            b.iter(|| black_box(serialize(s)));
        });

        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(decode(bytes).expect("decode")));
        });
    }

    group.finish();
}

fn capture_benchmarks(c: &mut Criterion) {
    let world = MemoryWorld::new(42, -64, 63);
    let mut group = c.benchmark_group("capture");

    for size in [16, 48] {
        let region = Region::with_size(BlockPos::new(-8, -64, -8), size, 128, size)
            .expect("valid region");
        group.throughput(Throughput::Elements(region.volume()));
        group.bench_with_input(BenchmarkId::new("memory_world", size), &region, |b, r| {
            b.iter(|| black_box(capture(r, &world, CaptureOptions::default()).expect("capture")));
        });
    }

    group.finish();
}

criterion_group!(benches, codec_benchmarks, capture_benchmarks);
criterion_main!(benches);
