/// Digest and store benchmarks
/// Measures SHA-256 tagging and retain/free throughput on the memory backend
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tagstore::infrastructure::persistence::MemoryStore;
use tagstore::{digest, BlobStore};
use tokio::runtime::Runtime;

fn digest_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");
    group.measurement_time(Duration::from_secs(5));

    for size in [1024, 64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        let data = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("sha256_tag", size), &data, |b, data| {
            b.iter(|| digest(data))
        });
    }

    group.finish();
}

fn retain_free_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("blob_store");

    for size in [1024, 64 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));

        // Same bytes every iteration: exercises the increment path
        group.bench_with_input(BenchmarkId::new("retain_duplicate", size), &size, |b, &s| {
            let store = BlobStore::new(Arc::new(MemoryStore::new()));
            let data = Bytes::from(vec![7u8; s]);
            b.to_async(&rt)
                .iter(|| async { store.retain(data.clone()).await.unwrap() })
        });

        // Retain then free unique bytes: create and remove paths
        group.bench_with_input(BenchmarkId::new("retain_free_unique", size), &size, |b, &s| {
            let store = BlobStore::new(Arc::new(MemoryStore::new()));
            b.to_async(&rt).iter_custom(|iters| {
                let store = &store;
                async move {
                    let mut total = Duration::default();
                    for i in 0..iters {
                        let mut data = vec![0u8; s];
                        data[..8].copy_from_slice(&i.to_le_bytes());
                        let data = Bytes::from(data);

                        let start = std::time::Instant::now();
                        let tag = store.retain(data).await.unwrap();
                        store.free(&tag).await.unwrap();
                        total += start.elapsed();
                    }
                    total
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, digest_benchmarks, retain_free_benchmarks);
criterion_main!(benches);
