use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;
use sys_collections::{TraverseType, Tree};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn filled(seed: u64, n: usize) -> (Tree<u64, u64>, Vec<u64>) {
    let mut t = Tree::new();
    let keys: Vec<u64> = lcg(seed).take(n).collect();
    for (i, k) in keys.iter().enumerate() {
        t.insert(*k, i as u64);
    }
    (t, keys)
}

fn bench_insert_random_100k(c: &mut Criterion) {
    c.bench_function("tree::insert_random_100k", |b| {
        b.iter_batched(
            Tree::<u64, u64>::new,
            |mut t| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    t.insert(x, i as u64);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_sequential_100k(c: &mut Criterion) {
    c.bench_function("tree::insert_sequential_100k", |b| {
        b.iter_batched(
            Tree::<u64, u64>::new,
            |mut t| {
                for k in 0..100_000u64 {
                    t.insert(k, k);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_random_10k(c: &mut Criterion) {
    c.bench_function("tree::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let (t, keys) = filled(5, 110_000);
                let mut s = 0x9e3779b97f4a7c15u64;
                let victims: Vec<u64> = (0..10_000)
                    .map(|_| {
                        s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                        keys[(s as usize) % keys.len()]
                    })
                    .collect();
                (t, victims)
            },
            |(mut t, victims)| {
                for k in &victims {
                    t.remove(k);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup_hit_10k(c: &mut Criterion) {
    c.bench_function("tree::lookup_hit_10k_on_100k", |b| {
        let (t, keys) = filled(7, 100_000);
        let mut s = 0x9e3779b97f4a7c15u64;
        let queries: Vec<u64> = (0..10_000)
            .map(|_| {
                s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                keys[(s as usize) % keys.len()]
            })
            .collect();
        b.iter(|| {
            for k in &queries {
                black_box(t.lookup(k));
            }
        })
    });
}

fn bench_walks(c: &mut Criterion) {
    let (t, _) = filled(999, 100_000);
    c.bench_function("tree::iter_all_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in t.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("tree::traverse_pre_order_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            t.traverse(TraverseType::PreOrder, |_, v| {
                sum = sum.wrapping_add(*v);
                false
            });
            black_box(sum)
        })
    });

    c.bench_function("tree::lower_bound_then_next_1k", |b| {
        let mut starts = lcg(31);
        b.iter(|| {
            let mut cur = t.lower_bound(&starts.next().unwrap_or(0));
            for _ in 0..1_000 {
                let Some(h) = cur else { break };
                cur = t.next(h);
            }
            black_box(cur)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_random_100k, bench_insert_sequential_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_remove_random_10k, bench_lookup_hit_10k, bench_walks
}
criterion_main!(benches_insert, benches_ops);
