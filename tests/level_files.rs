use std::{fs, path::Path};

use bevy::prelude::*;
use gravity_box::{
    commands::{MapCommand, MapHistory},
    editor::{apply_command, place_object, PlaceKind},
    insert_core_resources,
    level_io::{build_level_file, load_level, load_map, save_map, LoadMode},
    linked::{linked, LinkRole},
    map::Map,
    objects::{spawn_finish, spawn_player, MovingObject},
};
use gravity_box_level::{LevelStore, ObjectKind, SaveOutcome};

fn level_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// A small editor map: player, finish, a moving platform, a rotating
/// destroyable platform and a point.
fn build_map(world: &mut World) {
    insert_core_resources(world);
    world.resource_mut::<Map>().level_id = 7;
    spawn_player(world, 0, Vec2::new(0.5, 0.5), 0.0);
    spawn_finish(world, 1, Vec2::new(10.0, 1.0), 0.0);

    place_object(world, PlaceKind::MovingPlatform, Vec2::new(2.0, 0.0));
    let destroyable = place_object(world, PlaceKind::DestroyablePlatform, Vec2::new(5.0, 0.0));
    let command = MapCommand::set_rotating(world, destroyable, true);
    apply_command(world, command);
    let command = MapCommand::rotate_by(world, destroyable, 90.0);
    apply_command(world, command);
    place_object(world, PlaceKind::CollectiblePoint, Vec2::new(7.0, 3.0));
}

#[test]
fn saved_maps_load_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = LevelStore::new(dir.path());

    let mut world = World::new();
    build_map(&mut world);
    let saved = build_level_file(&mut world);
    assert!(matches!(
        save_map(&mut world, &store, false).unwrap(),
        SaveOutcome::Written(_)
    ));

    assert_eq!(saved.objects.len(), 3);
    assert_eq!(
        saved.objects.iter().map(|object| object.id).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
    assert!(saved.objects[0].moving_to.is_moving());
    assert!(saved.objects[1].is_destroyable && saved.objects[1].is_rotating);
    assert_eq!(saved.objects[1].rotation, 90);
    assert_eq!(saved.objects[2].kind, ObjectKind::Point);

    let mut fresh = World::new();
    insert_core_resources(&mut fresh);
    assert!(load_level(&mut fresh, &store, 7, LoadMode::Editor).unwrap());
    assert_eq!(build_level_file(&mut fresh), saved);
}

#[test]
fn loading_over_an_edited_map_replaces_it() {
    let mut world = World::new();
    build_map(&mut world);
    let saved = build_level_file(&mut world);

    place_object(&mut world, PlaceKind::Platform, Vec2::new(-4.0, -4.0));
    assert_ne!(build_level_file(&mut world), saved);
    assert!(world.resource::<MapHistory>().can_undo());

    load_map(&mut world, &saved, LoadMode::Editor);
    assert_eq!(build_level_file(&mut world), saved);
    assert!(!world.resource::<MapHistory>().can_undo());

    let mut platforms = world.query_filtered::<Entity, With<MovingObject>>();
    let moving = platforms.single(&world).unwrap();
    assert!(linked(&world, moving, LinkRole::MockPlatform).is_some());
}

#[test]
fn load_level_starts_a_fresh_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = LevelStore::new(dir.path());
    let mut world = World::new();
    build_map(&mut world);
    save_map(&mut world, &store, false).unwrap();
    assert!(world.resource::<MapHistory>().can_undo());

    assert!(load_level(&mut world, &store, 7, LoadMode::Editor).unwrap());
    assert!(!world.resource::<MapHistory>().can_undo());
    assert!(!load_level(&mut world, &store, 99, LoadMode::Editor).unwrap());
}

#[test]
fn unchanged_maps_are_not_written_twice() {
    let dir = tempfile::tempdir().unwrap();
    let store = LevelStore::new(dir.path());
    let mut world = World::new();
    build_map(&mut world);

    save_map(&mut world, &store, false).unwrap();
    assert_eq!(
        save_map(&mut world, &store, false).unwrap(),
        SaveOutcome::Unchanged
    );
    assert_eq!(level_files(dir.path()), 1);

    let SaveOutcome::Written(path) = save_map(&mut world, &store, true).unwrap() else {
        panic!("a forced save always writes");
    };
    assert_eq!(level_files(dir.path()), 1);
    assert!(path.exists());

    place_object(&mut world, PlaceKind::CollectiblePoint, Vec2::new(0.0, 8.0));
    assert!(matches!(
        save_map(&mut world, &store, false).unwrap(),
        SaveOutcome::Written(_)
    ));
    assert_eq!(level_files(dir.path()), 1);
}

#[test]
#[should_panic(expected = "exactly one player")]
fn saving_a_map_without_a_player_panics() {
    let dir = tempfile::tempdir().unwrap();
    let store = LevelStore::new(dir.path());
    let mut world = World::new();
    insert_core_resources(&mut world);
    spawn_finish(&mut world, 0, Vec2::ZERO, 0.0);
    let _ = save_map(&mut world, &store, true);
}
