#![allow(dead_code)]
//! Core `Manager` operations: spawn, lookup, despawn, archetype segregation,
//! and query iteration, run at a few entity counts.
//!
//! Run with: cargo bench --bench ecs_bench

use archetype_manager::manager::Manager;
use archetype_manager::query::Query;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

#[derive(Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Copy, Clone)]
struct Health(u32);

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_1k_single_component", |b| {
        b.iter(|| {
            let mut manager = Manager::new();
            for i in 0..1_000 {
                let _ = manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 },));
            }
        });
    });

    group.bench_function("spawn_1k_three_components", |b| {
        b.iter(|| {
            let mut manager = Manager::new();
            for i in 0..1_000 {
                let _ = manager.spawn((
                    Position { x: i as f32, y: 0.0, z: 0.0 },
                    Velocity { x: 1.0, y: 0.0, z: 0.0 },
                    Health(100),
                ));
            }
        });
    });

    group.finish();
}

fn bench_spawn_large(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_large");

    for count in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("spawn_with_3_components", count), count, |b, &count| {
            b.iter(|| {
                let mut manager = Manager::new();
                for i in 0..count {
                    let _ = manager.spawn((
                        Position { x: i as f32, y: 0.0, z: 0.0 },
                        Velocity { x: 1.0, y: 0.0, z: 0.0 },
                        Health(100),
                    ));
                }
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for count in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("get_component", count), count, |b, &count| {
            let mut manager = Manager::new();
            let entities: Vec<_> = (0..count)
                .map(|i| manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 }, Health(100))).unwrap())
                .collect();

            b.iter(|| {
                for &entity in &entities {
                    black_box(manager.world().get_component::<Position>(entity));
                }
            });
        });
    }

    group.finish();
}

fn bench_despawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("despawn");

    group.bench_function("despawn_1k_entities", |b| {
        b.iter_batched(
            || {
                let mut manager = Manager::new();
                let entities: Vec<_> = (0..1_000)
                    .map(|i| manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 }, Health(100))).unwrap())
                    .collect();
                (manager, entities)
            },
            |(mut manager, entities)| {
                for entity in entities {
                    let _ = manager.despawn(entity);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_archetype_segregation(c: &mut Criterion) {
    c.bench_function("archetype_segregation_1k", |b| {
        b.iter(|| {
            let mut manager = Manager::new();
            for i in 0..250 {
                let _ = manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 }, Velocity { x: 1.0, y: 0.0, z: 0.0 }));
            }
            for i in 0..250 {
                let _ = manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 }, Health(100)));
            }
            for i in 0..250 {
                let _ = manager.spawn((
                    Position { x: i as f32, y: 0.0, z: 0.0 },
                    Velocity { x: 1.0, y: 0.0, z: 0.0 },
                    Health(100),
                ));
            }
            for i in 0..250 {
                let _ = manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 },));
            }
        });
    });
}

fn bench_query_iteration(c: &mut Criterion) {
    c.bench_function("query_iteration_mutate_100k", |b| {
        let mut manager = Manager::new();
        for i in 0..100_000 {
            let _ = manager.spawn((
                Position { x: i as f32, y: 0.0, z: 0.0 },
                Velocity { x: 1.0, y: 0.0, z: 0.0 },
                Health(100),
            ));
        }

        b.iter(|| {
            for (pos, vel) in Query::<'_, (&mut Position, &Velocity)>::new(manager.world_mut().store_mut()) {
                pos.x += vel.x;
            }
        });
    });
}

fn bench_entity_count(c: &mut Criterion) {
    c.bench_function("entity_count_10k", |b| {
        let mut manager = Manager::new();
        for i in 0..10_000 {
            let _ = manager.spawn((Position { x: i as f32, y: 0.0, z: 0.0 },));
        }

        b.iter(|| {
            black_box(manager.world().entity_count());
        });
    });
}

criterion_group!(
    benches,
    bench_spawn,
    bench_spawn_large,
    bench_lookup,
    bench_despawn,
    bench_archetype_segregation,
    bench_query_iteration,
    bench_entity_count,
);

criterion_main!(benches);
