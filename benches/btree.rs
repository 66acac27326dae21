//! B-tree benchmarks for briar.
//!
//! Measures the operations that dominate index performance: sequential and
//! scattered insertion (which exercise the split path) and point lookup on
//! a populated multi-level tree.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use briar::{BTreeIndex, MmapStore};

const BLOCK_SIZE: usize = 4096;

fn keystr(i: usize) -> String {
    format!("{:08}", i)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");

    for count in [100usize, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let store =
                        MmapStore::create(dir.path().join("bench.idx"), BLOCK_SIZE, 2048).unwrap();
                    (dir, store)
                },
                |(dir, mut store)| {
                    let mut index = BTreeIndex::new(&mut store, 8, 8, false).unwrap();
                    index.attach(0, true).unwrap();
                    for i in 0..count {
                        index
                            .insert(keystr(i).as_bytes(), keystr(i).as_bytes())
                            .unwrap();
                    }
                    drop(index);
                    (dir, store)
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("scattered", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let store =
                        MmapStore::create(dir.path().join("bench.idx"), BLOCK_SIZE, 2048).unwrap();
                    (dir, store)
                },
                |(dir, mut store)| {
                    let mut index = BTreeIndex::new(&mut store, 8, 8, false).unwrap();
                    index.attach(0, true).unwrap();
                    let stride = count / 2 + 1;
                    let mut i = 0;
                    for _ in 0..count {
                        index
                            .insert(keystr(i).as_bytes(), keystr(i).as_bytes())
                            .unwrap();
                        i = (i + stride) % count;
                    }
                    drop(index);
                    (dir, store)
                },
            );
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_lookup");

    let dir = tempdir().unwrap();
    let mut store = MmapStore::create(dir.path().join("bench.idx"), BLOCK_SIZE, 2048).unwrap();
    let mut index = BTreeIndex::new(&mut store, 8, 8, false).unwrap();
    index.attach(0, true).unwrap();
    for i in 0..10_000 {
        index
            .insert(keystr(i).as_bytes(), keystr(i).as_bytes())
            .unwrap();
    }

    group.throughput(Throughput::Elements(1));
    group.bench_function("point", |b| {
        let mut i = 0;
        b.iter(|| {
            let result = index.lookup(black_box(keystr(i).as_bytes())).unwrap();
            i = (i + 7919) % 10_000;
            black_box(result)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup);
criterion_main!(benches);
