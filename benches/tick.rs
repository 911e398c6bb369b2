//! Benchmarks for the simulation tick and its supporting trackers.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use stardrift::{
    ChangeFlags, ChangeTracker, Engine, ParticleBuffer, RegionConfig, RegionKind, RegionTracker,
    SimulationConfig, Vec2,
};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");

    for &count in &[300usize, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let config = SimulationConfig::new().with_star_count(count);
            let mut engine = Engine::new(config).unwrap();
            b.iter(|| black_box(engine.tick(16.7)));
        });
    }

    group.finish();
}

fn bench_extract_partial(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_partial");

    for &changed in &[10usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(changed),
            &changed,
            |b, &changed| {
                let mut rng = StdRng::seed_from_u64(3);
                let store = ParticleBuffer::init(5_000, 800.0, 600.0, 32.0, &mut rng);
                let mut tracker = ChangeTracker::new(5_000);
                for i in 0..changed {
                    tracker.mark_changed(i * 3, ChangeFlags::MOVED);
                }
                b.iter(|| black_box(tracker.extract_partial(&store)));
            },
        );
    }

    group.finish();
}

fn bench_region_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_tracker");

    group.bench_function("add_motion_100", |b| {
        b.iter(|| {
            let mut tracker = RegionTracker::new(RegionConfig::for_canvas(1600.0, 1200.0));
            for i in 0..100 {
                let base = -700.0 + (i as f32) * 14.0;
                tracker.add_motion(
                    Vec2::new(base, base * 0.5),
                    Vec2::new(base + 6.0, base * 0.5 + 6.0),
                    2.0,
                    0,
                );
            }
            black_box(tracker.drain())
        });
    });

    group.bench_function("add_region_scattered_200", |b| {
        b.iter(|| {
            let mut tracker = RegionTracker::new(RegionConfig::for_canvas(1600.0, 1200.0));
            for i in 0..200u32 {
                let x = ((i * 97) % 1500) as f32 - 750.0;
                let y = ((i * 61) % 1100) as f32 - 550.0;
                tracker.add_region(x, y, 12.0, 12.0, RegionKind::Motion, 0);
            }
            black_box(tracker.should_full_clear())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick, bench_extract_partial, bench_region_merge);
criterion_main!(benches);
