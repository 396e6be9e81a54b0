//! # Process and Mutation Scenarios
//!
//! End-to-end behavior of processes, deferred commands and component
//! migration through the public API.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use ecps_core::{ComponentId, ComponentType, EcpsBuilder, EcpsError, EntityId, Process};

/// Deterministic xorshift sequence.
fn xorshift(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

#[test]
fn test_entity_visited_only_after_gaining_required_component() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register_component(ComponentType::new("a", 4, 4)).unwrap();
    let b = builder.register_component(ComponentType::new("b", 8, 8)).unwrap();

    let visited = Rc::new(RefCell::new(Vec::new()));
    let seen = visited.clone();
    let mut process = builder
        .create_process(
            Process::new("needs_ab", move |ecps, view| {
                let b_bytes = ecps.component_in(view, b).unwrap().to_vec();
                seen.borrow_mut().push((view.id(), b_bytes));
            })
            .requires(&[a, b]),
        )
        .unwrap();
    let mut ecps = builder.build();

    let e1 = ecps.create_entity(&[(a, &[1, 2, 3, 4])]).unwrap();
    assert_eq!(ecps.run_process(&mut process).unwrap(), 0);
    assert!(visited.borrow().is_empty());

    ecps.add_component(e1, b, None).unwrap();
    assert_eq!(ecps.run_process(&mut process).unwrap(), 1);
    assert_eq!(*visited.borrow(), vec![(e1, vec![0u8; 8])]);
    assert_eq!(ecps.component(e1, a).unwrap(), &[1, 2, 3, 4]);
}

#[test]
fn test_destroyed_entity_is_not_found_and_others_survive() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let mut ecps = builder.build();

    let e1 = ecps.spawn().with(a, &11u32).build().unwrap();
    let e2 = ecps.spawn().with(a, &22u32).build().unwrap();
    assert!(ecps.destroy_entity(e1));

    assert!(ecps.component(e1, a).is_none());
    assert!(!ecps.does_exist(e1));
    assert!(!ecps.has_component(e1, a));
    assert_eq!(ecps.get::<u32>(e2, a), Some(&22));

    // The freed slot is reused, but the stale ID stays dead.
    let e3 = ecps.spawn().with(a, &33u32).build().unwrap();
    assert_eq!(e3.index(), e1.index());
    assert!(ecps.component(e1, a).is_none());
    assert_eq!(ecps.get::<u32>(e3, a), Some(&33));
}

#[test]
fn test_destroy_during_iteration_is_deferred() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();

    let victims = Rc::new(RefCell::new(Vec::<EntityId>::new()));
    let queued = victims.clone();
    let mut process = builder
        .create_process(
            Process::new("reaper", move |ecps, view| {
                if ecps.get_in::<u32>(view, a).copied() == Some(0) {
                    assert!(ecps.destroy_entity_in(view));
                    // Still present until the call returns.
                    assert!(ecps.does_exist(view.id()));
                    queued.borrow_mut().push(view.id());
                }
            })
            .requires(&[a]),
        )
        .unwrap();
    let mut ecps = builder.build();

    let entities: Vec<EntityId> = (0..6u32)
        .map(|i| ecps.spawn().with(a, &(i % 2)).build().unwrap())
        .collect();

    assert_eq!(ecps.run_process(&mut process).unwrap(), 6);
    assert_eq!(victims.borrow().len(), 3);
    for victim in victims.borrow().iter() {
        assert!(!ecps.does_exist(*victim));
        assert!(ecps.component(*victim, a).is_none());
        assert!(ecps.entity(*victim).is_none());
    }
    assert_eq!(ecps.entity_count(), 3);
    assert!(entities.iter().filter(|e| ecps.does_exist(**e)).all(|e| ecps.get::<u32>(*e, a) == Some(&1)));
    assert_eq!(ecps.pending_commands(), 0);
}

#[test]
fn test_add_and_remove_during_iteration_apply_after_post() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let marked = builder.register_component(ComponentType::tag("marked")).unwrap();

    let mut process = builder
        .create_process(
            Process::new("marker", move |ecps, view| {
                ecps.add_component_to(view, marked, None).unwrap();
                ecps.remove_component_from(view, a).unwrap();
                assert!(!ecps.has_component_in(view, marked));
                assert!(ecps.has_component_in(view, a));
            })
            .requires(&[a])
            .with_post(move |ecps| assert_eq!(ecps.pending_commands(), 4)),
        )
        .unwrap();
    let mut ecps = builder.build();
    let e1 = ecps.spawn().with(a, &1u32).build().unwrap();
    let e2 = ecps.spawn().with(a, &2u32).build().unwrap();

    ecps.run_process(&mut process).unwrap();
    for e in [e1, e2] {
        assert!(ecps.has_component(e, marked));
        assert!(!ecps.has_component(e, a));
    }
    // Nothing matches any more.
    assert_eq!(ecps.run_process(&mut process).unwrap(), 0);
}

#[test]
fn test_queued_add_after_queued_destroy_is_skipped() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let b = builder.register::<u32>("b").unwrap();
    let mut process = builder
        .create_process(
            Process::new("conflict", move |ecps, view| {
                assert!(ecps.destroy_entity_in(view));
                ecps.insert(view.id(), b, &5u32).unwrap();
            })
            .requires(&[a]),
        )
        .unwrap();
    let mut ecps = builder.build();
    let e = ecps.spawn().with(a, &1u32).build().unwrap();

    ecps.run_process(&mut process).unwrap();
    assert!(!ecps.does_exist(e));
    assert_eq!(ecps.entity_count(), 0);
}

#[test]
fn test_queued_adds_to_same_component_last_write_wins() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let b = builder.register::<u32>("b").unwrap();
    let mut process = builder
        .create_process(
            Process::new("double_add", move |ecps, view| {
                ecps.insert(view.id(), b, &1u32).unwrap();
                ecps.insert(view.id(), b, &2u32).unwrap();
                ecps.add_component(view.id(), b, None).unwrap();
            })
            .requires(&[a]),
        )
        .unwrap();
    let mut ecps = builder.build();
    let e = ecps.spawn().with(a, &0u32).build().unwrap();

    ecps.run_process(&mut process).unwrap();
    assert_eq!(ecps.get::<u32>(e, b), Some(&2));
}

#[test]
fn test_entity_created_during_iteration_can_be_targeted() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let child_of = builder.register::<u32>("child_of").unwrap();

    let children = Rc::new(RefCell::new(Vec::<EntityId>::new()));
    let spawned = children.clone();
    let mut process = builder
        .create_process(
            Process::new("spawner", move |ecps, view| {
                let child = ecps.spawn().with(a, &100u32).build().unwrap();
                ecps.insert(child, child_of, &view.id().to_bits()).unwrap();
                spawned.borrow_mut().push(child);
            })
            .requires(&[a]),
        )
        .unwrap();
    let mut ecps = builder.build();
    let parent = ecps.spawn().with(a, &1u32).build().unwrap();

    assert_eq!(ecps.run_process(&mut process).unwrap(), 1);
    let child = children.borrow()[0];
    assert_eq!(ecps.get::<u32>(child, a), Some(&100));
    assert_eq!(ecps.get::<u32>(child, child_of), Some(&parent.to_bits()));

    // The child is visited on the next call only.
    assert_eq!(ecps.run_process(&mut process).unwrap(), 2);
}

#[test]
fn test_mutations_in_pre_hook_are_immediate() {
    let mut builder = EcpsBuilder::new();
    let a = builder.register::<u32>("a").unwrap();
    let mut process = builder
        .create_process(
            Process::new("count", |_, _| {})
                .requires(&[a])
                .with_pre(move |ecps| {
                    let e = ecps.spawn().with(a, &0u32).build().unwrap();
                    assert!(ecps.does_exist(e));
                }),
        )
        .unwrap();
    let mut ecps = builder.build();

    assert_eq!(ecps.run_process(&mut process).unwrap(), 1);
    assert_eq!(ecps.run_process(&mut process).unwrap(), 2);
}

#[test]
fn test_whole_world_operations_refused_while_iterating() {
    let builder = EcpsBuilder::new();
    let checked = Rc::new(Cell::new(false));
    let flag = checked.clone();
    let mut process = builder
        .create_process(Process::new("guard", move |ecps, _| {
            assert!(matches!(ecps.generate_snapshot(), Err(EcpsError::ProcessIterating(_))));
            assert!(matches!(ecps.destroy_all_entities(), Err(EcpsError::ProcessIterating(_))));
            flag.set(true);
        }))
        .unwrap();
    let mut ecps = builder.build();
    ecps.create_entity(&[]).unwrap();

    ecps.run_process(&mut process).unwrap();
    assert!(checked.get());
}

#[test]
fn test_add_remove_interleaving_matches_set_model() {
    let mut builder = EcpsBuilder::new();
    let ids: Vec<ComponentId> = (0..8)
        .map(|i| builder.register_component(ComponentType::new(format!("c{i}"), 4 * (i % 3), 4)).unwrap())
        .collect();
    let mut ecps = builder.build();

    let mut state = 0x9E37_79B9_7F4A_7C15;
    let entities: Vec<EntityId> = (0..4).map(|_| ecps.create_entity(&[]).unwrap()).collect();
    let mut models: Vec<BTreeSet<ComponentId>> = vec![BTreeSet::new(); entities.len()];

    for _ in 0..2_000 {
        let which = (xorshift(&mut state) % entities.len() as u64) as usize;
        let component = ids[(xorshift(&mut state) % ids.len() as u64) as usize];
        if xorshift(&mut state) % 2 == 0 {
            ecps.add_component(entities[which], component, None).unwrap();
            models[which].insert(component);
        } else {
            ecps.remove_component(entities[which], component).unwrap();
            models[which].remove(&component);
        }
    }

    for (entity, model) in entities.iter().zip(&models) {
        for component in &ids {
            assert_eq!(ecps.has_component(*entity, *component), model.contains(component));
        }
        let flags = ecps.components_of(*entity).unwrap();
        assert_eq!(flags.count(), model.len() + 2);
    }
}

#[test]
fn test_payloads_survive_migrations() {
    let mut builder = EcpsBuilder::new();
    let value = builder.register::<u64>("value").unwrap();
    let extra: Vec<ComponentId> = (0..4)
        .map(|i| builder.register::<u32>(&format!("extra{i}")).unwrap())
        .collect();
    let mut ecps = builder.build();

    let e = ecps.spawn().with(value, &0xDEAD_BEEF_u64).build().unwrap();
    for (i, id) in extra.iter().enumerate() {
        ecps.insert(e, *id, &(i as u32)).unwrap();
    }
    ecps.remove_component(e, extra[1]).unwrap();
    ecps.remove_component(e, extra[3]).unwrap();

    assert_eq!(ecps.get::<u64>(e, value), Some(&0xDEAD_BEEF));
    assert_eq!(ecps.get::<u32>(e, extra[0]), Some(&0));
    assert_eq!(ecps.get::<u32>(e, extra[2]), Some(&2));
    assert!(ecps.get::<u32>(e, extra[1]).is_none());
}

#[test]
fn test_cleanup_runs_on_remove_destroy_and_teardown() {
    let calls = Rc::new(RefCell::new(Vec::<(EntityId, u32, bool)>::new()));
    let log = calls.clone();

    let mut builder = EcpsBuilder::new();
    let handle = builder
        .register_component(
            ComponentType::of::<u32>("handle").with_cleanup(move |_, entity, bytes, full| {
                log.borrow_mut().push((entity, bytemuck::pod_read_unaligned(bytes), full));
                bytes.fill(0);
            }),
        )
        .unwrap();
    let mut ecps = builder.build();

    let a = ecps.spawn().with(handle, &1u32).build().unwrap();
    let b = ecps.spawn().with(handle, &2u32).build().unwrap();
    let c = ecps.spawn().with(handle, &3u32).build().unwrap();

    ecps.remove_component(a, handle).unwrap();
    ecps.remove_component(a, handle).unwrap();
    assert!(ecps.destroy_entity(b));
    ecps.destroy_all_entities().unwrap();

    assert_eq!(*calls.borrow(), vec![(a, 1, false), (b, 2, false), (c, 3, true)]);
}

#[test]
fn test_cleanup_runs_for_deferred_destroy() {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();

    let mut builder = EcpsBuilder::new();
    let handle = builder
        .register_component(ComponentType::of::<u32>("handle").with_cleanup(move |_, _, _, _| counter.set(counter.get() + 1)))
        .unwrap();
    let mut process = builder
        .create_process(Process::new("destroy_all", |ecps, view| {
            ecps.destroy_entity_in(view);
        }))
        .unwrap();
    let mut ecps = builder.build();
    for i in 0..5u32 {
        ecps.spawn().with(handle, &i).build().unwrap();
    }

    ecps.run_process(&mut process).unwrap();
    assert_eq!(count.get(), 5);
    assert_eq!(ecps.entity_count(), 0);
}
