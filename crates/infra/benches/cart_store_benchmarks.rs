use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;

use webmarket_core::{CartKey, ProductId};
use webmarket_infra::cart_store::{CartStore, LockingCartStore};
use webmarket_infra::catalog::{InMemoryCatalog, ProductInfo};
use webmarket_infra::config::CartConfig;
use webmarket_infra::repository::InMemoryCartRepository;

type Store = LockingCartStore<InMemoryCartRepository, InMemoryCatalog>;

fn setup() -> Arc<Store> {
    let catalog = InMemoryCatalog::with_products((1..=16).map(|id| {
        ProductInfo::new(ProductId::new(id), format!("product-{id}"), Decimal::new(100, 2))
    }));
    Arc::new(LockingCartStore::new(
        InMemoryCartRepository::new(),
        catalog,
        &CartConfig::default(),
    ))
}

fn bench_add_item_uncontended(c: &mut Criterion) {
    let store = setup();
    let key = CartKey::from_raw("bench-single");

    let mut group = c.benchmark_group("add_item");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_thread", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n = n % 16 + 1;
            store
                .add_item(black_box(&key), ProductId::new(n), 1)
                .unwrap()
        });
    });
    group.finish();
}

fn bench_add_item_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_item_parallel");
    for threads in [2usize, 4, 8] {
        let ops_per_thread = 200u64;
        group.throughput(Throughput::Elements(threads as u64 * ops_per_thread));

        // All threads hit one key: worst case for the per-key lock.
        group.bench_with_input(BenchmarkId::new("same_key", threads), &threads, |b, &threads| {
            let store = setup();
            b.iter(|| run_parallel(&store, threads, ops_per_thread, |_| "hot".to_string()));
        });

        // One key per thread: should scale with threads.
        group.bench_with_input(BenchmarkId::new("distinct_keys", threads), &threads, |b, &threads| {
            let store = setup();
            b.iter(|| run_parallel(&store, threads, ops_per_thread, |t| format!("cart-{t}")));
        });
    }
    group.finish();
}

fn run_parallel(store: &Arc<Store>, threads: usize, ops: u64, key_of: fn(usize) -> String) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(store);
            let key = CartKey::from_raw(key_of(t));
            thread::spawn(move || {
                for i in 0..ops {
                    store.add_item(&key, ProductId::new(i % 16 + 1), 1).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_merge(c: &mut Criterion) {
    let store = setup();
    let user = CartKey::from_raw("user:bench");

    c.bench_function("merge_16_lines", |b| {
        b.iter_batched(
            || {
                let guest = CartKey::from_raw(uuid::Uuid::new_v4().simple().to_string());
                for id in 1..=16 {
                    store.add_item(&guest, ProductId::new(id), 1).unwrap();
                }
                guest
            },
            |guest| store.merge(black_box(&guest), &user).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_item_uncontended,
    bench_add_item_contended,
    bench_merge
);
criterion_main!(benches);
