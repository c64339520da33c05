use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmipc::{PoolConfig, RingConfig, ShmMempool, ShmRing};

fn benchmark_ring_bulk_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ShmRing_Bulk");

    for capacity in [1024u32, 4096, 16384].iter() {
        group.throughput(Throughput::Elements(*capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("enqueue_dequeue_u64", capacity),
            capacity,
            |b, &capacity| {
                let dir = tempfile::tempdir().unwrap();
                let ring: ShmRing<u64> = ShmRing::create_or_attach(
                    RingConfig::new("bench_ring", capacity)
                        .with_file_path(dir.path().join("bench_ring"))
                        .with_single_producer(true)
                        .with_single_consumer(true),
                )
                .unwrap();

                let items: Vec<u64> = (0..capacity as u64).collect();
                let mut out = vec![0u64; capacity as usize];

                b.iter(|| {
                    // fill the ring completely, then drain it
                    assert_eq!(ring.enqueue_bulk(&items), capacity as usize);
                    assert_eq!(ring.dequeue_bulk(&mut out), capacity as usize);
                });
            },
        );
    }

    group.finish();
}

fn benchmark_ring_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("ShmRing_BatchSize");
    let capacity = 4096u32;

    for batch in [1usize, 16, 256].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("round_trip", batch), batch, |b, &batch| {
            let dir = tempfile::tempdir().unwrap();
            let ring: ShmRing<u64> = ShmRing::create_or_attach(
                RingConfig::new("bench_batch", capacity)
                    .with_file_path(dir.path().join("bench_batch")),
            )
            .unwrap();

            let items = vec![7u64; batch];
            let mut out = vec![0u64; batch];

            b.iter(|| {
                ring.enqueue_bulk(&items);
                ring.dequeue_bulk(&mut out);
            });
        });
    }

    group.finish();
}

fn benchmark_mempool_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("ShmMempool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("alloc_free_256b", |b| {
        let dir = tempfile::tempdir().unwrap();
        let pool = ShmMempool::create_or_attach(
            PoolConfig::new("bench_pool", 256, 1024)
                .with_file_path(dir.path().join("bench_pool")),
        )
        .unwrap();

        b.iter(|| {
            let element = pool.alloc().unwrap();
            pool.free(element).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ring_bulk_throughput,
    benchmark_ring_batch_sizes,
    benchmark_mempool_alloc_free
);
criterion_main!(benches);
