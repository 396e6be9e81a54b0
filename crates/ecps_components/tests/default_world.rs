//! # Default World Integration
//!
//! Save/load of a transform tree with sprites, resource release, and
//! world extensions.

use std::cell::Cell;
use std::rc::Rc;

use ecps_components::{attach_child, children, DefaultWorld, Phase, Sprite, Transform};
use ecps_core::{ComponentType, EcpsConfig, Process};

fn temp_file(label: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("ecps_components_{label}_{}_{nanos}.ecps", std::process::id()))
}

#[test]
fn test_tree_and_sprites_survive_save_and_load() {
    let mut source = DefaultWorld::new(EcpsConfig::default()).unwrap();
    let c = *source.components();
    let hero = source.names().acquire("hero.png");

    let ecps = source.ecps_mut();
    let root = ecps
        .spawn()
        .with(c.transform, &Transform::at([10.0, 20.0]))
        .with(c.sprite, &Sprite { image: hero, camera_flags: 0b11, depth: -2 })
        .build()
        .unwrap();
    let left = ecps.spawn().with(c.transform, &Transform::at([1.0, 0.0])).build().unwrap();
    let right = ecps.spawn().with(c.transform, &Transform::at([-1.0, 0.0])).build().unwrap();
    attach_child(ecps, c.transform, root, left).unwrap();
    attach_child(ecps, c.transform, root, right).unwrap();

    let path = temp_file("tree");
    source.save(&path).unwrap();

    let mut target = DefaultWorld::new(EcpsConfig::default()).unwrap();
    let tc = *target.components();
    for _ in 0..5 {
        target.ecps_mut().create_entity(&[]).unwrap();
    }
    target.names().acquire("unrelated.png");
    let restored = target.load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.len(), 3);
    let (new_root, new_left, new_right) = (restored[0], restored[1], restored[2]);
    assert_eq!(children(target.ecps(), tc.transform, new_root), vec![new_left, new_right]);
    assert_eq!(
        target.ecps().get::<Transform>(new_left, tc.transform).unwrap().parent(),
        new_root
    );
    assert_eq!(
        target.ecps().get::<Transform>(new_root, tc.transform).unwrap().position,
        [10.0, 20.0]
    );

    let sprite = *target.ecps().get::<Sprite>(new_root, tc.sprite).unwrap();
    assert_eq!(target.names().name(sprite.image).as_deref(), Some("hero.png"));
    assert_ne!(sprite.image, hero);
    assert_eq!(sprite.camera_flags, 0b11);
    assert_eq!(sprite.depth, -2);
    assert_eq!(target.names().ref_count(sprite.image), 1);

    target.clear().unwrap();
    assert_eq!(target.names().ref_count(sprite.image), 0);
}

#[test]
fn test_sprite_removal_releases_image() {
    let mut world = DefaultWorld::new(EcpsConfig::default()).unwrap();
    let c = *world.components();
    let image = world.names().acquire("tree.png");

    let entity = world
        .ecps_mut()
        .spawn()
        .with(c.sprite, &Sprite { image, camera_flags: 1, depth: 0 })
        .build()
        .unwrap();
    world.ecps_mut().remove_component(entity, c.sprite).unwrap();
    assert_eq!(world.names().ref_count(image), 0);

    let again = world.names().acquire("tree.png");
    assert_eq!(again, image);
    let other = world
        .ecps_mut()
        .spawn()
        .with(c.sprite, &Sprite { image, camera_flags: 1, depth: 0 })
        .build()
        .unwrap();
    assert!(world.ecps_mut().destroy_entity(other));
    assert_eq!(world.names().ref_count(image), 0);
}

#[test]
fn test_extension_types_and_processes() {
    let visits = Rc::new(Cell::new(0usize));
    let counter = visits.clone();

    let mut world = DefaultWorld::with_extension(EcpsConfig::default(), 0.1, move |builder, components| {
        let frozen = builder.register_component(ComponentType::tag("Frozen"))?;
        let watcher = builder.create_process(
            Process::new("watch_frozen", move |_, _| counter.set(counter.get() + 1))
                .requires(&[frozen, components.transform]),
        )?;
        Ok(vec![(Phase::Draw, 3, watcher)])
    })
    .unwrap();
    let c = *world.components();
    let frozen = world.ecps().registry().find("Frozen").unwrap();

    world
        .ecps_mut()
        .spawn()
        .with(c.transform, &Transform::default())
        .with_tag(frozen)
        .build()
        .unwrap();
    world.ecps_mut().spawn().with(c.transform, &Transform::default()).build().unwrap();

    assert_eq!(world.run_phase(Phase::Draw).unwrap(), 1);
    assert_eq!(visits.get(), 1);
    world.run_frame().unwrap();
    assert_eq!(visits.get(), 2);
}
