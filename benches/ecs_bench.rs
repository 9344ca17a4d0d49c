//! Benchmarks for core ECS operations
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - Entity spawning with components
//! - Component add/remove churn (archetype moves)
//! - Query iteration over packed columns
//! - Batch archetype-to-archetype moves

use columnar_ecs::{ComponentId, ComponentSchema, FieldType, World};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn register_movement(world: &mut World) -> (ComponentId, ComponentId) {
    let pos = world.register_component(
        ComponentSchema::new("Position")
            .field("x", FieldType::F64)
            .field("y", FieldType::F64)
            .field("z", FieldType::F64),
    );
    let vel = world.register_component(
        ComponentSchema::new("Velocity")
            .field("x", FieldType::F64)
            .field("y", FieldType::F64)
            .field("z", FieldType::F64),
    );
    (pos, vel)
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_1k_two_components", |b| {
        b.iter(|| {
            let mut world = World::new();
            let (pos, vel) = register_movement(&mut world);
            for i in 0..1_000 {
                let e = world.spawn_empty().unwrap();
                world
                    .add_components(
                        e,
                        &[
                            (pos, &[i as f64, 0.0, 0.0][..]),
                            (vel, &[1.0, 1.0, 1.0][..]),
                        ],
                    )
                    .unwrap();
            }
            black_box(world.entity_count())
        });
    });

    group.finish();
}

fn bench_component_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    group.bench_function("add_remove_1k", |b| {
        let mut world = World::new();
        let (pos, vel) = register_movement(&mut world);
        let mut entities = Vec::new();
        for _ in 0..1_000 {
            let e = world.spawn_empty().unwrap();
            world.add_component(e, pos, &[0.0, 0.0, 0.0]).unwrap();
            entities.push(e);
        }

        b.iter(|| {
            for &e in &entities {
                world.add_component(e, vel, &[1.0, 2.0, 3.0]).unwrap();
            }
            for &e in &entities {
                world.remove_component(e, vel).unwrap();
            }
        });
    });

    group.bench_function("batch_add_remove_10k", |b| {
        let mut world = World::new();
        let (pos, vel) = register_movement(&mut world);
        let first = world.spawn_empty().unwrap();
        world.add_component(first, pos, &[0.0, 0.0, 0.0]).unwrap();
        for _ in 1..10_000 {
            let e = world.spawn_empty().unwrap();
            world.add_component(e, pos, &[0.0, 0.0, 0.0]).unwrap();
        }
        let source = world.entity_archetype_id(first).unwrap();

        b.iter(|| {
            world.batch_add_component(source, vel, &[1.0, 1.0, 1.0]).unwrap();
            let target = world.entity_archetype_id(first).unwrap();
            world.batch_remove_component(target, vel).unwrap();
        });
    });

    group.finish();
}

fn bench_query_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    group.bench_function("iterate_10k_movement", |b| {
        let mut world = World::new();
        let (pos, vel) = register_movement(&mut world);
        for i in 0..10_000 {
            let e = world.spawn_empty().unwrap();
            world
                .add_components(
                    e,
                    &[
                        (pos, &[i as f64, 0.0, 0.0][..]),
                        (vel, &[1.0, 2.0, 3.0][..]),
                    ],
                )
                .unwrap();
        }
        let q = world.query(&[pos, vel]);

        b.iter(|| {
            world
                .for_each_chunk(q, |chunk| {
                    let count = chunk.len();
                    for field in 0..3 {
                        let (p, v) = chunk.column_pair_mut((pos, field), (vel, field))?;
                        let p = p.as_f64_mut().unwrap();
                        let v = v.as_f64().unwrap();
                        for row in 0..count {
                            p[row] += v[row] * 0.016;
                        }
                    }
                    Ok(())
                })
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spawn, bench_component_churn, bench_query_iteration);
criterion_main!(benches);
