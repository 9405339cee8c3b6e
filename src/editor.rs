use bevy::prelude::*;

use crate::{
    commands::{prune_discarded_commands, MapCommand, MapHistory},
    linked::{linked, LinkRole},
    map::{mark_rounded_platforms_dirty, next_object_id, EditorObject},
    objects::{
        spawn_collectible_point, spawn_moving_helpers, spawn_platform, DestroyablePlatform,
        MapObjectOverlay, MockMapObject, MovingObject, Platform, PlatformParams, RotatingObject,
        MOCK_OFFSET,
    },
};

/// Width of a freshly placed platform.
pub const PLACED_PLATFORM_WIDTH: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceKind {
    Platform,
    DestroyablePlatform,
    MovingPlatform,
    CollectiblePoint,
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Snaps `at` to the center of its grid cell.
pub fn snap_to_cell(at: Vec2) -> Vec2 {
    at.floor() + Vec2::splat(0.5)
}

/// Places a new object at the cell under `at`, appends it to the id sequence,
/// records it in the history and selects it.
pub fn place_object(world: &mut World, kind: PlaceKind, at: Vec2) -> Entity {
    let center = snap_to_cell(at);
    let id = next_object_id(world);

    let entity = match kind {
        PlaceKind::CollectiblePoint => spawn_collectible_point(world, id, center, 0.0),
        PlaceKind::Platform | PlaceKind::DestroyablePlatform | PlaceKind::MovingPlatform => {
            let params = PlatformParams {
                is_destroyable: kind == PlaceKind::DestroyablePlatform,
                moving_to: (kind == PlaceKind::MovingPlatform).then_some(center + MOCK_OFFSET),
                ..PlatformParams::new(id, center, PLACED_PLATFORM_WIDTH)
            };
            let platform = spawn_platform(world, &params);
            if let Some(target) = params.moving_to {
                spawn_moving_helpers(world, platform, target);
            }
            platform
        }
    };

    mark_rounded_platforms_dirty(world);
    let command = MapCommand::add(world, entity);
    world.init_resource::<MapHistory>();
    world
        .resource_mut::<MapHistory>()
        .add_executed_command(command);
    prune_discarded_commands(world);
    select_only(world, entity);
    debug!("Placed {kind:?} with id {id} at {center}");
    entity
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub fn select_only(world: &mut World, entity: Entity) {
    deselect_all(world);
    if let Some(mut editor) = world.get_mut::<EditorObject>(entity) {
        editor.is_selected = true;
    }
}

pub fn deselect_all(world: &mut World) {
    let mut editors = world.query::<&mut EditorObject>();
    for mut editor in editors.iter_mut(world) {
        if editor.is_selected {
            editor.is_selected = false;
        }
    }
}

/// Selected, visible editor objects.
pub fn selected_objects(world: &mut World) -> Vec<Entity> {
    let mut editors = world.query::<(Entity, &EditorObject)>();
    let mut selected: Vec<Entity> = editors
        .iter(world)
        .filter(|(_, editor)| editor.is_selected && !editor.is_deleted)
        .map(|(entity, _)| entity)
        .collect();
    selected.sort_unstable();
    selected
}

// ---------------------------------------------------------------------------
// Command wrappers
// ---------------------------------------------------------------------------

/// Executes `command` and records it. Returns the affected entity.
pub fn apply_command(world: &mut World, command: MapCommand) -> Entity {
    world.init_resource::<MapHistory>();
    let affected =
        world.resource_scope(|world, mut history: Mut<MapHistory>| history.execute(command, world));
    prune_discarded_commands(world);
    affected
}

/// Runs one command per entity as a single history entry.
fn apply_to_each(
    world: &mut World,
    label: &str,
    entities: Vec<Entity>,
    build: impl Fn(&World, Entity) -> MapCommand,
) -> Option<Entity> {
    let mut commands: Vec<MapCommand> = entities
        .into_iter()
        .map(|entity| build(&*world, entity))
        .collect();
    let command = match commands.len() {
        0 => return None,
        1 => commands.pop()?,
        _ => MapCommand::group(label, commands),
    };
    Some(apply_command(world, command))
}

fn selected_with(world: &mut World, allowed: impl Fn(&MapObjectOverlay) -> bool) -> Vec<Entity> {
    selected_objects(world)
        .into_iter()
        .filter(|&entity| world.get::<MapObjectOverlay>(entity).is_none_or(&allowed))
        .collect()
}

fn selected_platforms(world: &mut World) -> Vec<Entity> {
    selected_objects(world)
        .into_iter()
        .filter(|&entity| {
            world.get::<Platform>(entity).is_some()
                || world.get::<DestroyablePlatform>(entity).is_some()
        })
        .collect()
}

pub fn delete_selected(world: &mut World) -> Option<Entity> {
    let selected = selected_with(world, |overlay| overlay.show_deletion_button);
    // A mock goes away with its platform.
    let targets: Vec<Entity> = selected
        .iter()
        .copied()
        .filter(|&entity| {
            world.get::<MockMapObject>(entity).is_none()
                || linked(world, entity, LinkRole::Platform)
                    .is_none_or(|platform| !selected.contains(&platform))
        })
        .collect();
    apply_to_each(world, "Delete selection", targets, MapCommand::delete)
}

pub fn move_selected(world: &mut World, delta: Vec2) -> Option<Entity> {
    let targets = selected_with(world, |overlay| overlay.show_movement_buttons);
    apply_to_each(world, "Move selection", targets, |world, entity| {
        MapCommand::move_by(world, entity, delta)
    })
}

pub fn rotate_selected(world: &mut World, degrees: f32) -> Option<Entity> {
    let targets = selected_with(world, |overlay| overlay.show_rotation_button);
    apply_to_each(world, "Rotate selection", targets, |world, entity| {
        MapCommand::rotate_by(world, entity, degrees)
    })
}

pub fn resize_selected(world: &mut World, size_delta: Vec2, center_delta: Vec2) -> Option<Entity> {
    let targets = selected_with(world, |overlay| overlay.show_resizing_buttons);
    apply_to_each(world, "Resize selection", targets, |world, entity| {
        MapCommand::resize_by(world, entity, size_delta, center_delta)
    })
}

pub fn set_selected_moving(world: &mut World, moving: bool) -> Option<Entity> {
    let targets: Vec<Entity> = selected_platforms(world)
        .into_iter()
        .filter(|&entity| world.get::<MovingObject>(entity).is_some() != moving)
        .collect();
    apply_to_each(world, "Toggle moving", targets, |world, entity| {
        MapCommand::set_moving(world, entity, moving)
    })
}

pub fn set_selected_rotating(world: &mut World, rotating: bool) -> Option<Entity> {
    let targets: Vec<Entity> = selected_platforms(world)
        .into_iter()
        .filter(|&entity| world.get::<RotatingObject>(entity).is_some() != rotating)
        .collect();
    apply_to_each(world, "Toggle rotating", targets, |world, entity| {
        MapCommand::set_rotating(world, entity, rotating)
    })
}

pub fn set_selected_destroyable(world: &mut World, destroyable: bool) -> Option<Entity> {
    let targets: Vec<Entity> = selected_platforms(world)
        .into_iter()
        .filter(|&entity| world.get::<DestroyablePlatform>(entity).is_some() != destroyable)
        .collect();
    apply_to_each(world, "Toggle destroyable", targets, |world, entity| {
        MapCommand::set_destroyable(world, entity, destroyable)
    })
}

/// Requests one undo step and flushes it immediately.
pub fn undo(world: &mut World) {
    world.init_resource::<MapHistory>();
    world.resource_scope(|world, mut history: Mut<MapHistory>| {
        history.request_undo();
        history.flush(world);
    });
}

/// Requests one redo step and flushes it immediately.
pub fn redo(world: &mut World) {
    world.init_resource::<MapHistory>();
    world.resource_scope(|world, mut history: Mut<MapHistory>| {
        history.request_redo();
        history.flush(world);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        map::{visible_object_ids, Map, MapObject},
        objects::{CollectiblePoint, DashedLine},
        scene2d::Scene2D,
    };

    fn setup() -> World {
        let mut world = World::new();
        world.init_resource::<Map>();
        world.init_resource::<MapHistory>();
        world
    }

    #[test]
    fn placement_snaps_and_appends() {
        let mut world = setup();
        let a = place_object(&mut world, PlaceKind::Platform, Vec2::new(2.7, -0.2));
        let b = place_object(&mut world, PlaceKind::CollectiblePoint, Vec2::new(0.0, 0.0));

        assert_eq!(world.get::<Scene2D>(a).unwrap().center, Vec2::new(2.5, -0.5));
        assert_eq!(world.get::<MapObject>(a).unwrap().id, 0);
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 1);
        assert!(world.get::<CollectiblePoint>(b).is_some());
        assert_eq!(selected_objects(&mut world), vec![b]);
        assert_eq!(world.resource::<MapHistory>().undo_len(), 2);
    }

    #[test]
    fn placing_a_moving_platform_creates_its_helpers() {
        let mut world = setup();
        let platform = place_object(&mut world, PlaceKind::MovingPlatform, Vec2::ZERO);
        let mock = linked(&world, platform, LinkRole::MockPlatform).unwrap();
        assert_eq!(world.get::<Scene2D>(mock).unwrap().center, Vec2::new(1.5, 1.5));
        assert!(linked(&world, platform, LinkRole::DashedLine).is_some());
        assert_eq!(world.get::<MovingObject>(platform).unwrap().end, Vec2::new(1.5, 1.5));

        undo(&mut world);
        assert!(world.get::<EditorObject>(platform).unwrap().is_deleted);
        assert!(world.get::<EditorObject>(mock).unwrap().is_deleted);
        assert!(visible_object_ids(&mut world).is_empty());
    }

    #[test]
    fn delete_selection_is_one_history_entry() {
        let mut world = setup();
        let a = place_object(&mut world, PlaceKind::Platform, Vec2::new(0.0, 0.0));
        let b = place_object(&mut world, PlaceKind::Platform, Vec2::new(3.0, 0.0));
        world.get_mut::<EditorObject>(a).unwrap().is_selected = true;
        world.get_mut::<EditorObject>(b).unwrap().is_selected = true;

        delete_selected(&mut world);
        assert!(visible_object_ids(&mut world).is_empty());
        assert_eq!(world.resource::<MapHistory>().undo_len(), 3);

        undo(&mut world);
        assert_eq!(visible_object_ids(&mut world), vec![0, 1]);
        assert_eq!(world.get::<MapObject>(a).unwrap().id, 0);
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 1);
    }

    #[test]
    fn deleting_platform_and_mock_together_deletes_the_platform_only() {
        let mut world = setup();
        let platform = place_object(&mut world, PlaceKind::MovingPlatform, Vec2::ZERO);
        let mock = linked(&world, platform, LinkRole::MockPlatform).unwrap();
        world.get_mut::<EditorObject>(mock).unwrap().is_selected = true;

        assert_eq!(delete_selected(&mut world), Some(platform));
        assert!(world.get::<EditorObject>(mock).unwrap().is_deleted);
        assert!(world.get::<MovingObject>(platform).is_some());
    }

    #[test]
    fn toggles_skip_platforms_already_in_that_state() {
        let mut world = setup();
        let platform = place_object(&mut world, PlaceKind::Platform, Vec2::ZERO);
        place_object(&mut world, PlaceKind::CollectiblePoint, Vec2::new(4.0, 0.0));
        select_only(&mut world, platform);

        assert_eq!(set_selected_moving(&mut world, false), None);
        assert_eq!(set_selected_moving(&mut world, true), Some(platform));
        assert_eq!(world.query::<&DashedLine>().iter(&world).count(), 1);
        assert_eq!(set_selected_rotating(&mut world, true), Some(platform));
        assert_eq!(set_selected_destroyable(&mut world, true), Some(platform));
        assert!(world.get::<DestroyablePlatform>(platform).is_some());

        undo(&mut world);
        undo(&mut world);
        undo(&mut world);
        assert!(world.get::<MovingObject>(platform).is_none());
        assert!(world.get::<RotatingObject>(platform).is_none());
        assert!(world.get::<Platform>(platform).is_some());
        assert_eq!(world.query::<&DashedLine>().iter(&world).count(), 0);

        redo(&mut world);
        assert!(world.get::<MovingObject>(platform).is_some());
    }

    #[test]
    fn resize_skips_points() {
        let mut world = setup();
        let point = place_object(&mut world, PlaceKind::CollectiblePoint, Vec2::ZERO);
        assert_eq!(resize_selected(&mut world, Vec2::X, Vec2::ZERO), None);
        assert_eq!(move_selected(&mut world, Vec2::Y), Some(point));
        assert_eq!(world.get::<Scene2D>(point).unwrap().center, Vec2::new(0.5, 1.5));
    }
}
