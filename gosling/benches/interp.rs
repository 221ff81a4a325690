use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gosling::prelude::*;

const MAX_FUNC: &str = "func max(a, b int) int { if a < b { return b }; return a }";

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compile and run max", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            interp.eval(black_box(MAX_FUNC)).unwrap();
            black_box(interp.eval("max(3, 7)").unwrap())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
