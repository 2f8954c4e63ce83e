//! Benchmarks for cable stepping and constraint projection.
//!
//! Run with: cargo bench -p sim-cable
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p sim-cable -- --save-baseline main
//! 2. After changes: cargo bench -p sim-cable -- --baseline main

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;
use sim_cable::{
    Cable, CableBody, CableConfig, ColliderSet, CollisionQuery, Constraint, Gradient,
    LineSegment, NoCollisions, ParticleBuffer, StretchFunction,
};

// =============================================================================
// Fixtures
// =============================================================================

fn pinned_cable(resolution: usize, world: Arc<dyn CollisionQuery>) -> Cable {
    let curve = LineSegment::new(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
    let config = CableConfig::default()
        .with_resolution(resolution)
        .with_damping(0.01)
        .with_solver_iterations(10);
    let mut cable = Cable::new(&curve, config, world).unwrap();
    cable.set_grab(0, Point3::origin(), false).unwrap();
    cable
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cable_step");

    for resolution in [10, 40, 160] {
        group.throughput(Throughput::Elements(resolution as u64 + 1));
        group.bench_with_input(
            BenchmarkId::new("free", resolution),
            &resolution,
            |b, &resolution| {
                let mut cable = pinned_cable(resolution, Arc::new(NoCollisions));
                b.iter(|| black_box(*cable.step(black_box(0.02))));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("sphere", resolution),
            &resolution,
            |b, &resolution| {
                let world = ColliderSet::new().with_sphere(Point3::new(5.0, -2.0, 0.0), 1.5);
                let mut cable = pinned_cable(resolution, Arc::new(world));
                b.iter(|| black_box(*cable.step(black_box(0.02))));
            },
        );
    }

    group.finish();
}

fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_gradient");

    for arity in [2, 3, 11] {
        let window: Vec<_> = (0..arity)
            .map(|i| Point3::new(i as f64, (i as f64).sin(), 0.0))
            .collect();
        let gradient = Gradient::new(arity, 1e-4).unwrap();
        let last = arity - 1;

        group.bench_with_input(BenchmarkId::from_parameter(arity), &window, |b, window| {
            b.iter(|| {
                gradient.evaluate(
                    |w: &[Point3<f64>]| (w[last] - w[0]).norm(),
                    black_box(window),
                )
            });
        });
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let points = vec![Point3::origin(), Point3::new(2.0, 0.5, 0.0)];

    c.bench_function("project_stretch", |b| {
        let mut constraint = Constraint::new(2, 2, StretchFunction::new(1, 1.0)).unwrap();
        b.iter(|| {
            let mut particles = ParticleBuffer::new(points.clone());
            black_box(constraint.project(0, &mut particles, 0.02));
            constraint.reset_lambda();
        });
    });
}

criterion_group!(benches, bench_step, bench_gradient, bench_projection);
criterion_main!(benches);
