//! Core performance benchmarks for keepsake-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keepsake_core::{HashMethod, ObjectStore, Snapshot, StoreConfig, Tree};
use std::fs;

fn bench_hash_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_bytes");
    for size in [1024usize, 1024 * 1024] {
        let data = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        for method in [HashMethod::Sha1, HashMethod::Blake3] {
            group.bench_with_input(BenchmarkId::new(method.as_str(), size), &data, |b, data| {
                b.iter(|| method.hash(black_box(data)));
            });
        }
    }
    group.finish();
}

fn sample_tree(entries: usize) -> Tree {
    let mut tree = Tree::new();
    for i in 0..entries {
        let path = format!("src/module_{}/file_{}.rs", i / 100, i);
        tree.insert(&path, HashMethod::Sha1.hash(path.as_bytes()));
    }
    tree
}

fn bench_tree_operations(c: &mut Criterion) {
    let small = sample_tree(100);
    let large = sample_tree(10_000);

    c.bench_function("tree_serialize_small", |b| {
        b.iter(|| black_box(&small).serialize());
    });

    c.bench_function("tree_serialize_large", |b| {
        b.iter(|| black_box(&large).serialize());
    });

    let encoded = large.serialize();
    c.bench_function("tree_deserialize_large", |b| {
        b.iter(|| Tree::deserialize(black_box(&encoded)));
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    let tracked = temp_dir.path().join("data");
    for i in 0..500 {
        let dir = tracked.join(format!("dir_{}", i % 20));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("file_{}.txt", i)), format!("contents {}", i)).unwrap();
    }
    let store = ObjectStore::open_or_init(&temp_dir.path().join("vc"), StoreConfig::default()).unwrap();

    c.bench_function("snapshot_capture_500_files", |b| {
        b.iter(|| Snapshot::capture(&store, black_box(&tracked)).unwrap());
    });

    c.bench_function("snapshot_write_unchanged", |b| {
        let snapshot = Snapshot::capture(&store, &tracked).unwrap();
        store.write_snapshot(&snapshot).unwrap();
        b.iter(|| store.write_snapshot(black_box(&snapshot)).unwrap());
    });
}

criterion_group!(benches, bench_hash_operations, bench_tree_operations, bench_snapshot);
criterion_main!(benches);
