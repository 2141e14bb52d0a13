//! Criterion benchmarks for `bf-math`.
//!
//! Focus on the scalar kernels that sit inside prior evaluation and
//! goodness-of-fit loops.

use bf_math::{chisq_survival, chisq_survival_inv, std_normal_cdf, std_normal_inv_cdf};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_normal_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("normal");

    for (name, x) in [("central", 0.3), ("one_sigma", 1.0), ("tail", 4.5)] {
        group.bench_with_input(BenchmarkId::new("cdf", name), &x, |b, &x| {
            b.iter(|| black_box(std_normal_cdf(black_box(x))));
        });
    }

    for (name, p) in [("median", 0.5), ("upper", 0.975), ("deep_tail", 1e-6)] {
        group.bench_with_input(BenchmarkId::new("inv_cdf", name), &p, |b, &p| {
            b.iter(|| black_box(std_normal_inv_cdf(black_box(p))));
        });
    }

    group.finish();
}

fn bench_chisq_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("chisq");

    for (name, dof) in [("few_dof", 3.0), ("many_dof", 25.0)] {
        group.bench_with_input(BenchmarkId::new("survival", name), &dof, |b, &dof| {
            b.iter(|| black_box(chisq_survival(black_box(12.0), black_box(dof))));
        });

        group.bench_with_input(BenchmarkId::new("survival_inv", name), &dof, |b, &dof| {
            b.iter(|| black_box(chisq_survival_inv(black_box(0.05), black_box(dof))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normal_kernels, bench_chisq_kernels);
criterion_main!(benches);
