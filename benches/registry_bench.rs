use actor_reentrancy::{ReentrancyRegistry, ReentrancyStack, RegistryConfig};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn id(n: u64) -> String {
    format!("{:016x}", n)
}

fn bench_enter_exit_fresh_key(c: &mut Criterion) {
    c.bench_function("registry_enter_exit_fresh_10k", |b| {
        let ids: Vec<_> = lcg(1).take(10_000).map(id).collect();
        b.iter_batched(
            ReentrancyRegistry::new,
            |r| {
                for k in &ids {
                    r.enter("Bench", k, Some("chain")).unwrap();
                }
                for k in &ids {
                    r.exit("Bench", k, Some("chain")).unwrap();
                }
                black_box(r)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_reentrant_nesting(c: &mut Criterion) {
    c.bench_function("registry_nested_enter_exit", |b| {
        let r = ReentrancyRegistry::new();
        // Hold the chain open so the entry is never removed.
        let _held = r.try_enter("Bench", "hot", Some("chain")).unwrap();
        b.iter(|| {
            let d = r.enter("Bench", "hot", Some("chain")).unwrap();
            black_box(d);
            r.exit("Bench", "hot", Some("chain")).unwrap();
        })
    });
}

fn bench_admission_query_busy(c: &mut Criterion) {
    c.bench_function("registry_is_admissible_busy", |b| {
        let r = ReentrancyRegistry::with_config(RegistryConfig::new().with_shard_capacity(1024));
        let ids: Vec<_> = lcg(7).take(20_000).map(id).collect();
        let _held: Vec<_> = ids
            .iter()
            .map(|k| r.try_enter("Bench", k, Some("owner")).unwrap())
            .collect();
        let mut it = ids.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(r.is_admissible("Bench", k, Some("other")));
        })
    });
}

fn bench_stack_guard(c: &mut Criterion) {
    c.bench_function("stack_guard_enter_drop", |b| {
        let s = ReentrancyStack::new();
        b.iter(|| {
            let g = s.try_enter(Some("chain")).unwrap();
            black_box(&g);
            drop(g);
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_enter_exit_fresh_key, bench_reentrant_nesting, bench_admission_query_busy, bench_stack_guard
}
criterion_main!(benches);
