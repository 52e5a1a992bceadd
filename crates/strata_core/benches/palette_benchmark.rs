//! Benchmark for palette writes, reads and re-encoding.
//!
//! TARGET: a full 32^3 section rewrite through every promotion in under 1ms
//!
//! Run with: cargo bench --package strata_core --bench palette_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_core::coords::SECTION_VOLUME;
use strata_core::{decode_section, encode_section, BlockSection, Palette};

#[allow(clippy::cast_possible_truncation)]
fn benchmark_fill_with_promotions(c: &mut Criterion) {
    let mut group = c.benchmark_group("palette_fill");
    group.throughput(Throughput::Elements(SECTION_VOLUME as u64));

    for distinct in [8u32, 200, 1000] {
        group.bench_function(format!("{distinct}_distinct"), |b| {
            b.iter(|| {
                let mut palette = Palette::default();
                for i in 0..SECTION_VOLUME {
                    palette.set(i as u16, black_box(i as u32 % distinct));
                }
                black_box(palette)
            });
        });
    }

    group.finish();
}

#[allow(clippy::cast_possible_truncation)]
fn benchmark_reads(c: &mut Criterion) {
    let mut palette = Palette::default();
    for i in 0..SECTION_VOLUME {
        palette.set(i as u16, i as u32 % 12);
    }

    c.bench_function("palette_get_half_byte", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..SECTION_VOLUME {
                sum += u64::from(palette.get(i as u16));
            }
            black_box(sum)
        });
    });
}

#[allow(clippy::cast_possible_truncation)]
fn benchmark_codec(c: &mut Criterion) {
    let mut section = BlockSection::new();
    for i in 0..SECTION_VOLUME {
        section.set_flat(i as u16, i as u32 % 40);
    }
    let bytes = encode_section(&section);

    c.bench_function("section_encode_byte", |b| b.iter(|| black_box(encode_section(&section))));
    c.bench_function("section_decode_byte", |b| b.iter(|| black_box(decode_section(&bytes))));
}

criterion_group!(benches, benchmark_fill_with_promotions, benchmark_reads, benchmark_codec);
criterion_main!(benches);
