//! Criterion benchmarks for the mona cycle.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mona::prelude::*;

fn make_mona(num_sensors: usize, max_mediators: usize, seed: u64) -> Mona {
    let cfg = MonaConfig {
        max_mediators,
        ..MonaConfig::with_size(num_sensors, 3, 1).with_seed(seed)
    };
    let mut mona = Mona::from_config(cfg).unwrap();
    mona.init_need(0, 5.0, "food").unwrap();
    let goal = mona.new_receptor(&vec![1; num_sensors], "food").unwrap();
    mona.set_goals(goal, &[5.0], 1.0).unwrap();
    for r in 0..=3 {
        mona.new_motor(r, "motor").unwrap();
    }
    mona
}

/// A repeating sensor pattern with a period of seven ticks.
fn sensors(num_sensors: usize, t: usize) -> Vec<Sensor> {
    (0..num_sensors).map(|i| ((t + i) % 7 == 0) as Sensor).collect()
}

fn warm_up(mona: &mut Mona, num_sensors: usize, ticks: usize) {
    for t in 0..ticks {
        mona.cycle(&sensors(num_sensors, t)).unwrap();
    }
}

/// Benchmark cycle() as the mediator ceiling grows.
fn bench_cycle_population(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
    let mut group = c.benchmark_group("cycle_population");

    for max_mediators in [25, 100, 400].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("learning", max_mediators),
            max_mediators,
            |b, &max_mediators| {
                let mut mona = make_mona(4, max_mediators, 42);
                warm_up(&mut mona, 4, 300);
                let mut t = 300;

                b.iter(|| {
                    t += 1;
                    black_box(mona.cycle(&sensors(4, t)).unwrap())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark cycle() with structural learning off (wagers and drive only).
fn bench_cycle_frozen(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_frozen");

    group.bench_function("hand_built_16", |b| {
        let cfg = MonaConfig {
            structural_learning: false,
            auto_receptors: false,
            ..MonaConfig::with_size(4, 3, 1).with_seed(42)
        };
        let mut mona = Mona::from_config(cfg).unwrap();
        mona.init_need(0, 5.0, "food").unwrap();
        let receptors: Vec<NeuronId> = (0..4)
            .map(|i| {
                let mask: Vec<Sensor> = (0..4).map(|j| (i == j) as Sensor).collect();
                mona.new_receptor(&mask, "slot").unwrap()
            })
            .collect();
        let motors: Vec<NeuronId> = (0..=3).map(|r| mona.new_motor(r, "motor").unwrap()).collect();
        mona.set_goals(receptors[0], &[5.0], 1.0).unwrap();
        for (i, cause) in receptors.iter().enumerate() {
            for (k, motor) in motors.iter().enumerate() {
                let effect = receptors[(i + k % 3 + 1) % receptors.len()];
                let m = mona.new_mediator(cfg.new_enablement, true, 0.1, "chain");
                mona.add_mediator_event(m, EventKind::Cause, *cause).unwrap();
                mona.add_mediator_event(m, EventKind::Intermediate, *motor).unwrap();
                mona.add_mediator_event(m, EventKind::Effect, effect).unwrap();
            }
        }
        let mut t = 0;

        b.iter(|| {
            t += 1;
            black_box(mona.cycle(&sensors(4, t)).unwrap())
        });
    });

    group.finish();
}

/// Benchmark image save and load.
fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    for max_mediators in [100, 400].iter() {
        group.bench_with_input(BenchmarkId::new("save", max_mediators), max_mediators, |b, &n| {
            let mut mona = make_mona(4, n, 42);
            warm_up(&mut mona, 4, 300);
            let mut buf = Vec::with_capacity(64 * 1024);

            b.iter(|| {
                buf.clear();
                mona.save_to(&mut buf).unwrap();
                black_box(buf.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("load", max_mediators), max_mediators, |b, &n| {
            let mut mona = make_mona(4, n, 42);
            warm_up(&mut mona, 4, 300);
            let buf = mona.save_bytes().unwrap();

            b.iter(|| {
                let loaded = Mona::load_bytes(&buf).unwrap();
                black_box(loaded.diagnostics().mediator_count)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cycle_population,
    bench_cycle_frozen,
    bench_serialization
);
criterion_main!(benches);
