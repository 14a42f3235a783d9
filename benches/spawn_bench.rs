#![allow(dead_code)]
//! Spawn throughput against `hecs`, a similarly-shaped archetype ECS, as a
//! reference point rather than a claim of superiority.
//!
//! Run with: cargo bench --bench spawn_bench

use archetype_manager::manager::Manager;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hecs::World as HecsWorld;

#[derive(Debug, Clone)]
struct Position(f32, f32, f32);

#[derive(Debug, Clone)]
struct Velocity(f32, f32, f32);

#[derive(Debug, Clone)]
struct Health(u32);

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_bench");

    group.bench_function("archetype_manager_spawn_2_components", |b| {
        let mut manager = Manager::new();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(manager.spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0))).unwrap());
            }
        });
    });

    group.bench_function("hecs_spawn_2_components", |b| {
        let mut world = HecsWorld::new();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(world.spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0))));
            }
        });
    });

    group.bench_function("archetype_manager_spawn_3_components", |b| {
        let mut manager = Manager::new();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(
                    manager
                        .spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0), Health(100)))
                        .unwrap(),
                );
            }
        });
    });

    group.bench_function("hecs_spawn_3_components", |b| {
        let mut world = HecsWorld::new();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(world.spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0), Health(100))));
            }
        });
    });

    group.bench_function("archetype_manager_spawn_mixed", |b| {
        let mut manager = Manager::new();
        b.iter(|| {
            for i in 0..1000 {
                if i % 2 == 0 {
                    black_box(manager.spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0))).unwrap());
                } else {
                    black_box(
                        manager
                            .spawn((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0), Health(100)))
                            .unwrap(),
                    );
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
