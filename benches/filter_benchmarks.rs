//! Benchmarks for target filter performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use head_tracker::filters::{
    create_filter, exponential::ExponentialFilter, kalman::KalmanSmoother, position::PositionFilter, NoFilter,
    TargetFilter,
};

fn benchmark_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");

    // Noisy target centers drifting across a 640x480 frame
    let test_data: Vec<(f64, f64)> = (0..100)
        .map(|i| {
            let t = i as f64 * 0.1;
            let x = 320.0 + 150.0 * t.sin() + 4.0 * rand::random::<f64>();
            let y = 240.0 + 80.0 * t.cos() + 4.0 * rand::random::<f64>();
            (x, y)
        })
        .collect();

    let filter_configs = vec![
        ("no_filter", Box::new(NoFilter) as Box<dyn TargetFilter>),
        ("window_5", Box::new(PositionFilter::new(5, 30.0))),
        ("window_15", Box::new(PositionFilter::new(15, 30.0))),
        ("kalman", Box::new(KalmanSmoother::default())),
        ("exponential_0.3", Box::new(ExponentialFilter::new(0.3))),
        ("exponential_0.8", Box::new(ExponentialFilter::new(0.8))),
    ];

    for (name, mut filter) in filter_configs {
        group.bench_with_input(BenchmarkId::new("single_update", name), &test_data[0], |b, &(x, y)| {
            b.iter(|| black_box(filter.apply(black_box(x), black_box(y))));
        });

        group.bench_with_input(BenchmarkId::new("sequence_100", name), &test_data, |b, data| {
            b.iter(|| {
                filter.reset();
                for &(x, y) in data {
                    black_box(filter.apply(black_box(x), black_box(y)));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_filter_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_chains");

    for spec in ["kalman+exponential:0.3", "window:5:30+kalman", "window+kalman+ema:0.5"] {
        let mut filter = create_filter(spec).unwrap();
        group.bench_function(spec, |b| {
            b.iter(|| {
                filter.reset();
                for i in 0..100 {
                    let v = f64::from(i);
                    black_box(filter.apply(black_box(300.0 + v), black_box(200.0 - v)));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_kalman_coasting(c: &mut Criterion) {
    let mut group = c.benchmark_group("kalman_coasting");

    let mut kalman = KalmanSmoother::default();

    // Ten measurements followed by ten predictions, as during a detection gap
    group.bench_function("update_then_predict", |b| {
        b.iter(|| {
            kalman.reset();
            for i in 0..10 {
                let v = f64::from(i);
                black_box(kalman.apply(black_box(v), black_box(v)));
            }
            for _ in 0..10 {
                black_box(kalman.predict());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_filters, benchmark_filter_chains, benchmark_kalman_coasting);
criterion_main!(benches);
