//! # Process Iteration Benchmark
//!
//! Measures a movement-style process over archetypes of different shapes,
//! with and without deferred destruction.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ecps_core::{ComponentType, Ecps, EcpsBuilder, EcpsConfig, Process};

const ENTITY_COUNT: usize = 50_000;

fn movement_world() -> (Ecps, Process) {
    let mut builder = EcpsBuilder::new().with_config(EcpsConfig {
        initial_archetype_capacity: ENTITY_COUNT,
        ..EcpsConfig::default()
    });
    let position = builder.register::<[f32; 3]>("position").unwrap();
    let velocity = builder.register::<[f32; 3]>("velocity").unwrap();
    let frozen = builder.register_component(ComponentType::tag("frozen")).unwrap();

    let process = builder
        .create_process(
            Process::new("movement", move |ecps, view| {
                let Some(v) = ecps.get_in::<[f32; 3]>(view, velocity).copied() else {
                    return;
                };
                if let Some(p) = ecps.get_in_mut::<[f32; 3]>(view, position) {
                    p[0] += v[0] * 0.016;
                    p[1] += v[1] * 0.016;
                    p[2] += v[2] * 0.016;
                }
            })
            .requires(&[position, velocity]),
        )
        .unwrap();

    let mut ecps = builder.build();
    for i in 0..ENTITY_COUNT {
        let mut spawn = ecps
            .spawn()
            .with(position, &[i as f32, 0.0, 0.0])
            .with(velocity, &[1.0f32, 0.5, 0.25]);
        // Split the population over two archetypes.
        if i % 4 == 0 {
            spawn = spawn.with_tag(frozen);
        }
        spawn.build().unwrap();
    }
    (ecps, process)
}

fn bench_process_iteration(c: &mut Criterion) {
    let (mut ecps, mut process) = movement_world();

    c.bench_function("process_movement_50k", |b| {
        b.iter(|| black_box(ecps.run_process(&mut process).unwrap()));
    });
}

fn bench_deferred_destroy(c: &mut Criterion) {
    c.bench_function("process_deferred_destroy_50k", |b| {
        b.iter_batched(
            || {
                let builder = EcpsBuilder::new().with_config(EcpsConfig {
                    initial_archetype_capacity: ENTITY_COUNT,
                    initial_command_buffer_bytes: ENTITY_COUNT * 16,
                    ..EcpsConfig::default()
                });
                let process = builder
                    .create_process(Process::new("reaper", |ecps, view| {
                        if view.id().index() % 2 == 0 {
                            ecps.destroy_entity_in(view);
                        }
                    }))
                    .unwrap();
                let mut ecps = builder.build();
                for _ in 0..ENTITY_COUNT {
                    ecps.create_entity(&[]).unwrap();
                }
                (ecps, process)
            },
            |(mut ecps, mut process)| black_box(ecps.run_process(&mut process).unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_process_iteration, bench_deferred_destroy);
criterion_main!(benches);
