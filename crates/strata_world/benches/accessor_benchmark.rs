//! Benchmark for world-coordinate writes and neighbor update propagation.
//!
//! TARGET: a 3x3x3 block update across a chunk corner in under 5us
//!
//! Run with: cargo bench --package strata_world --bench accessor_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_world::{ChunkAccessor, ChunkIndex, FlatGenerator, SetBlockOptions, WorldConfig};

fn accessor() -> ChunkAccessor {
    let config = WorldConfig::production();
    let index = ChunkIndex::new(&config, Arc::new(FlatGenerator::classic())).expect("valid config");
    let accessor = ChunkAccessor::new(Arc::new(index));
    // Pre-load a 4x4 chunk area around the origin.
    for cx in -2..2 {
        for cz in -2..2 {
            accessor.set_block_at(cx * 32, 100, cz * 32, 1, SetBlockOptions::ALLOW_PARTIAL_LOAD);
        }
    }
    accessor
}

fn benchmark_set_block_at(c: &mut Criterion) {
    let accessor = accessor();
    let mut group = c.benchmark_group("set_block_at");
    group.throughput(Throughput::Elements(1024));

    group.bench_function("column_sweep", |b| {
        let mut id = 2u32;
        b.iter(|| {
            id = id % 40 + 2;
            for i in 0..1024i32 {
                accessor.set_block_at(black_box(i & 63) - 32, 64, (i >> 6) - 8, id, SetBlockOptions::empty());
            }
        });
    });

    group.finish();
}

fn benchmark_block_update(c: &mut Criterion) {
    let accessor = accessor();
    for dx in -1..=1 {
        for dz in -1..=1 {
            for dy in -1..=1 {
                accessor.set_block_at(dx, 50 + dy, dz, 1, SetBlockOptions::empty());
            }
        }
    }

    c.bench_function("perform_block_update_inner", |b| {
        b.iter(|| black_box(accessor.perform_block_update(black_box(10), 50, 10, false)));
    });
    c.bench_function("perform_block_update_corner", |b| {
        b.iter(|| black_box(accessor.perform_block_update(black_box(0), 50, 0, false)));
    });
}

criterion_group!(benches, benchmark_set_block_at, benchmark_block_update);
criterion_main!(benches);
