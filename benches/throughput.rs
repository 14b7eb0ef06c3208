//! Throughput benchmarks for the writer pool hot paths.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use scrivano::{JournalMetadata, JournalWriterFactory, PoolableWriter, WriterPool};

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Group 1: acquire_release_cached
// ---------------------------------------------------------------------------
// The writer is already in the pool → measures the pure CAS hand-off cycle,
// the cost a client pays when the cache does its job.

fn bench_acquire_release_cached(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let pool = WriterPool::builder(JournalWriterFactory::new(dir.path())).build();
    let meta = JournalMetadata::new("bench").unwrap();

    // Prime the slot.
    pool.writer(&meta).unwrap().close().unwrap();

    let mut group = c.benchmark_group("acquire_release_cached");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("scrivano", |b| {
        b.iter(|| {
            for _ in 0..OPS {
                let w = pool.writer(black_box(&meta)).unwrap();
                black_box(&w);
                w.close().unwrap();
            }
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: append
// ---------------------------------------------------------------------------
// Framed-record appends on a held writer (no sync; buffered only).

fn bench_append(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let pool = WriterPool::builder(JournalWriterFactory::new(dir.path())).build();
    let meta = JournalMetadata::new("bench").unwrap();
    let writer = pool.writer(&meta).unwrap();
    let record = [0u8; 64];

    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Bytes(OPS * record.len() as u64));
    group.bench_function("scrivano", |b| {
        b.iter(|| {
            for _ in 0..OPS {
                black_box(writer.append(black_box(&record)).unwrap());
            }
        })
    });
    group.finish();

    writer.close().unwrap();
    pool.close();
}

// ---------------------------------------------------------------------------
// Group 3: acquire_distinct — one slot per key, round-robin over many names
// ---------------------------------------------------------------------------
// Exercises the sharded table lookup rather than a single hot entry.

fn bench_acquire_distinct(c: &mut Criterion) {
    const JOURNALS: u64 = 64;

    let dir = tempfile::tempdir().unwrap();
    let pool = WriterPool::builder(JournalWriterFactory::new(dir.path())).build();
    let metas: Vec<JournalMetadata> = (0..JOURNALS)
        .map(|i| JournalMetadata::new(format!("j{i}")).unwrap())
        .collect();

    // Prime every slot.
    for meta in &metas {
        pool.writer(meta).unwrap().close().unwrap();
    }

    let mut group = c.benchmark_group("acquire_distinct");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("scrivano", |b| {
        let mut cursor = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                let meta = &metas[(cursor % JOURNALS) as usize];
                let w = pool.writer(black_box(meta)).unwrap();
                w.close().unwrap();
                cursor = cursor.wrapping_add(1);
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_acquire_release_cached,
    bench_append,
    bench_acquire_distinct,
);
criterion_main!(benches);
