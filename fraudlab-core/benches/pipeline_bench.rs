//! Criterion benchmarks for the training hot paths.
//!
//! Benchmarks:
//! 1. Class balancing (undersampling plus neighbour interpolation)
//! 2. Model fitting per family
//! 3. ROC AUC over a large score vector

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fraudlab_core::balance::{BalanceConfig, ClassBalancer};
use fraudlab_core::dataset::Dataset;
use fraudlab_core::domain::{Label, SampleId};
use fraudlab_core::metrics::roc_auc;
use fraudlab_core::models::{self, ModelKind, ModelParams};
use fraudlab_core::rng::{stage, RngHierarchy};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_dataset(rows: usize, features: usize, fraud_every: usize) -> Dataset {
    let names = (0..features).map(|j| format!("f{j}")).collect();
    let mut data = Vec::with_capacity(rows);
    let mut labels = Vec::with_capacity(rows);
    for i in 0..rows {
        let fraud = i % fraud_every == 0;
        let shift = if fraud { 1.5 } else { 0.0 };
        data.push(
            (0..features)
                .map(|j| ((i * 31 + j * 17) % 101) as f64 / 50.0 - 1.0 + shift)
                .collect(),
        );
        labels.push(if fraud { Label::Fraud } else { Label::Legitimate });
    }
    let ids = (0..rows).map(SampleId::Record).collect();
    Dataset::new(names, data, labels, ids)
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance");
    for rows in [2_000usize, 10_000] {
        let data = make_dataset(rows, 34, 50);
        let balancer = ClassBalancer::new(BalanceConfig::default(), RngHierarchy::new(42));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| balancer.balance(black_box(data)))
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let data = make_dataset(2_000, 34, 3);
    let mut params = ModelParams::default();
    params.forest.n_trees = 20;
    params.boosting.n_trees = 20;
    let rng = RngHierarchy::new(42);

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    for kind in ModelKind::ALL {
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                let mut stream = rng.rng_for(stage::TRAIN, kind.name(), 0);
                models::fit(kind, black_box(&data), &params, &mut stream)
            })
        });
    }
    group.finish();
}

fn bench_auc(c: &mut Criterion) {
    let n = 100_000;
    let scores: Vec<f64> = (0..n).map(|i| ((i * 7919) % 1000) as f64 / 1000.0).collect();
    let labels: Vec<Label> = (0..n)
        .map(|i| if i % 577 == 0 { Label::Fraud } else { Label::Legitimate })
        .collect();
    c.bench_function("roc_auc_100k", |b| {
        b.iter(|| roc_auc(black_box(&scores), black_box(&labels)))
    });
}

criterion_group!(benches, bench_balance, bench_fit, bench_auc);
criterion_main!(benches);
