//! Hot-path numeric benchmarks: fixed-point operators and the generator.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use phobos::core::fixed::{fixed_div, fixed_mul};
use phobos::core::rng::GameRng;

fn bench_fixed_mul(c: &mut Criterion) {
    c.bench_function("fixed_mul", |b| {
        b.iter(|| {
            let mut acc = 0i32;
            for i in 1..1000i32 {
                acc = acc.wrapping_add(fixed_mul(black_box(i << 12), black_box(acc | 1)));
            }
            acc
        })
    });
}

fn bench_fixed_div(c: &mut Criterion) {
    c.bench_function("fixed_div", |b| {
        b.iter(|| {
            let mut acc = 1i32;
            for i in 1..1000i32 {
                acc = acc.wrapping_add(fixed_div(black_box(i), black_box(i << 4 | 1)));
            }
            acc
        })
    });
}

fn bench_rng(c: &mut Criterion) {
    c.bench_function("rng_draw", |b| {
        let mut rng = GameRng::new();
        b.iter(|| {
            let mut acc = 0u32;
            for _ in 0..1000 {
                acc = acc.wrapping_add(rng.next_byte() as u32);
            }
            acc
        })
    });
}

criterion_group!(benches, bench_fixed_mul, bench_fixed_div, bench_rng);
criterion_main!(benches);
