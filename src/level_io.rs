use std::path::PathBuf;

use bevy::prelude::*;
use gravity_box_level::{
    LevelFile, LevelStore, MarkerData, MovingTo, ObjectData, ObjectKind, Padding, Position,
    SaveOutcome, PPM,
};

use crate::{
    commands::MapHistory,
    linked::{linked, LinkRole, Respawned},
    map::{is_deleted, update_map_bounds, EditorObject, Map, MapObject, MapPadding},
    objects::{
        spawn_collectible_point, spawn_finish, spawn_moving_helpers, spawn_platform,
        spawn_player, CollectiblePoint, DashedLine, DestroyablePlatform, Finish, MockMapObject,
        MovingObject, Platform, PlatformParams, Player, RotatingIndicator, RotatingObject,
    },
    physics::{create_body, destroy_all_bodies},
    play::LevelState,
    scene2d::Scene2D,
};

pub struct LevelIoPlugin;

impl Plugin for LevelIoPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelIoSettings>()
            .add_observer(handle_save_map)
            .add_observer(handle_load_level);
    }
}

/// Where editor maps live on disk.
#[derive(Resource, Clone, Debug)]
pub struct LevelIoSettings {
    pub maps_dir: PathBuf,
}

impl Default for LevelIoSettings {
    fn default() -> Self {
        Self {
            maps_dir: PathBuf::from("maps/editor"),
        }
    }
}

impl LevelIoSettings {
    pub fn store(&self) -> LevelStore {
        LevelStore::new(&self.maps_dir)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Editor helpers (mock targets, dashed lines, rotation indicators) are
    /// created.
    Editor,
    Play,
}

/// Save the current map to the configured maps directory.
#[derive(Event, Debug, Clone, Copy)]
pub struct SaveMap {
    pub force: bool,
}

/// Replace the current map with a stored level.
#[derive(Event, Debug, Clone, Copy)]
pub struct LoadLevel {
    pub id: i32,
    pub mode: LoadMode,
}

fn handle_save_map(event: On<SaveMap>, mut commands: Commands) {
    let force = event.force;
    commands.queue(move |world: &mut World| {
        let store = world.resource::<LevelIoSettings>().store();
        if let Err(err) = save_map(world, &store, force) {
            warn!("Failed to save map: {err}");
        }
    });
}

fn handle_load_level(event: On<LoadLevel>, mut commands: Commands) {
    let LoadLevel { id, mode } = *event;
    commands.queue(move |world: &mut World| {
        let store = world.resource::<LevelIoSettings>().store();
        match load_level(world, &store, id, mode) {
            Ok(true) => {}
            Ok(false) => warn!("No stored level with id {id}"),
            Err(err) => warn!("Failed to load level {id}: {err}"),
        }
    });
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn marker_data(world: &World, entity: Entity) -> MarkerData {
    let scene = world.get::<Scene2D>(entity);
    MarkerData {
        id: world.get::<MapObject>(entity).map_or(0, |object| object.id),
        position: Position::from_meters(scene.map_or(Vec2::ZERO, |scene| scene.center)),
        rotation: scene.map_or(0, |scene| scene.rotation.round() as i32),
    }
}

fn object_data(world: &World, entity: Entity, kind: ObjectKind) -> ObjectData {
    let id = world.get::<MapObject>(entity).map_or(0, |object| object.id);
    let scene = world.get::<Scene2D>(entity);
    let target = world.get::<MovingObject>(entity).map(|moving| {
        // The mock target is the source of truth while editing.
        linked(world, entity, LinkRole::MockPlatform)
            .and_then(|mock| world.get::<Scene2D>(mock))
            .map_or(moving.end, |mock| mock.center)
    });
    ObjectData {
        kind,
        id,
        position: Position::from_meters(scene.map_or(Vec2::ZERO, |scene| scene.center)),
        rotation: scene.map_or(0, |scene| scene.rotation.round() as i32),
        moving_to: MovingTo::from_meters(target),
        width: scene.map_or(0.0, |scene| scene.width * PPM),
        is_destroyable: world.get::<DestroyablePlatform>(entity).is_some(),
        is_rotating: world.get::<RotatingObject>(entity).is_some(),
    }
}

/// Snapshot of every visible map object.
///
/// # Panics
///
/// When the map does not hold exactly one player and one finish.
pub fn build_level_file(world: &mut World) -> LevelFile {
    let mut query = world.query::<(Entity, &MapObject, Option<&EditorObject>)>();
    let mut visible: Vec<(i32, Entity)> = query
        .iter(world)
        .filter(|(_, _, editor)| !is_deleted(*editor))
        .map(|(entity, object, _)| (object.id, entity))
        .collect();
    visible.sort_by_key(|&(id, _)| id);

    let world: &World = world;
    let mut players = Vec::new();
    let mut finishes = Vec::new();
    let mut objects = Vec::new();
    for &(_, entity) in &visible {
        if world.get::<Player>(entity).is_some() {
            players.push(entity);
        } else if world.get::<Finish>(entity).is_some() {
            finishes.push(entity);
        } else if world.get::<Platform>(entity).is_some()
            || world.get::<DestroyablePlatform>(entity).is_some()
        {
            objects.push(object_data(world, entity, ObjectKind::Platform));
        } else if world.get::<CollectiblePoint>(entity).is_some() {
            objects.push(object_data(world, entity, ObjectKind::Point));
        }
    }
    assert!(
        players.len() == 1,
        "A map must contain exactly one player, found {}",
        players.len()
    );
    assert!(
        finishes.len() == 1,
        "A map must contain exactly one finish point, found {}",
        finishes.len()
    );

    let map = world.get_resource::<Map>().cloned().unwrap_or_default();
    LevelFile {
        id: map.level_id,
        padding: Padding {
            left: map.padding.left.round() as i32,
            right: map.padding.right.round() as i32,
            top: map.padding.top.round() as i32,
            bottom: map.padding.bottom.round() as i32,
        },
        player: marker_data(world, players[0]),
        finish: marker_data(world, finishes[0]),
        objects,
    }
}

pub fn save_map(
    world: &mut World,
    store: &LevelStore,
    force: bool,
) -> gravity_box_level::Result<SaveOutcome> {
    let level = build_level_file(world);
    let outcome = store.save(&level, force)?;
    if outcome == SaveOutcome::Unchanged {
        debug!("Level {} unchanged, not saved", level.id);
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Replaces the current map with `level`. The edit history and the play
/// progress start over, since both refer to the replaced objects.
pub fn load_map(world: &mut World, level: &LevelFile, mode: LoadMode) {
    destroy_all_bodies(world);
    remove_transient_entities(world);
    if let Some(mut respawned) = world.get_resource_mut::<Respawned>() {
        respawned.clear();
    }
    if let Some(mut history) = world.get_resource_mut::<MapHistory>() {
        history.reset();
    }
    if let Some(mut state) = world.get_resource_mut::<LevelState>() {
        *state = LevelState::default();
    }

    {
        let mut map = world.get_resource_or_init::<Map>();
        map.level_id = level.id;
        map.padding = MapPadding {
            left: level.padding.left as f32,
            right: level.padding.right as f32,
            top: level.padding.top as f32,
            bottom: level.padding.bottom as f32,
        };
        map.update_rounded_platforms = true;
    }

    place_marker::<Player>(world, &level.player, spawn_player);
    place_marker::<Finish>(world, &level.finish, spawn_finish);

    for object in &level.objects {
        let center = object.position.to_meters();
        let rotation = object.rotation as f32;
        match object.kind {
            ObjectKind::Platform => {
                let params = PlatformParams {
                    id: object.id,
                    center,
                    width: object.width / PPM,
                    rotation,
                    is_destroyable: object.is_destroyable,
                    is_rotating: object.is_rotating,
                    moving_to: object.moving_to.to_meters(),
                };
                let platform = spawn_platform(world, &params);
                if mode == LoadMode::Editor {
                    if let Some(target) = params.moving_to {
                        spawn_moving_helpers(world, platform, target);
                    }
                    if params.is_rotating {
                        world.entity_mut(platform).insert(RotatingIndicator);
                    }
                }
            }
            ObjectKind::Point => {
                spawn_collectible_point(world, object.id, center, rotation);
            }
            ObjectKind::Unknown => warn!("Skipping object {} of unknown type", object.id),
        }
    }

    update_map_bounds(world);
    info!(
        "Loaded level {} with {} objects ({mode:?})",
        level.id,
        level.objects.len()
    );
}

/// Loads level `id` from `store`. Returns false when the store has no such
/// level.
pub fn load_level(
    world: &mut World,
    store: &LevelStore,
    id: i32,
    mode: LoadMode,
) -> gravity_box_level::Result<bool> {
    let Some(level) = store.load(id)? else {
        return Ok(false);
    };
    load_map(world, &level, mode);
    Ok(true)
}

/// Every map object except the player and the finish, plus editor helpers.
fn remove_transient_entities(world: &mut World) {
    let mut objects =
        world.query_filtered::<Entity, (With<MapObject>, Without<Player>, Without<Finish>)>();
    let mut doomed: Vec<Entity> = objects.iter(world).collect();
    let mut helpers =
        world.query_filtered::<Entity, Or<(With<MockMapObject>, With<DashedLine>)>>();
    doomed.extend(helpers.iter(world));
    for entity in doomed {
        world.despawn(entity);
    }
}

/// Reuses the existing player (or finish) entity when there is one.
fn place_marker<M: Component>(
    world: &mut World,
    data: &MarkerData,
    spawn: fn(&mut World, i32, Vec2, f32) -> Entity,
) {
    let center = data.position.to_meters();
    let rotation = data.rotation as f32;
    let mut markers = world.query_filtered::<Entity, With<M>>();
    let existing: Vec<Entity> = markers.iter(world).collect();

    let Some((&reused, extra)) = existing.split_first() else {
        spawn(world, data.id, center, rotation);
        return;
    };
    for &entity in extra {
        world.despawn(entity);
    }
    let mut entity = world.entity_mut(reused);
    entity.insert((MapObject { id: data.id }, EditorObject::default()));
    if let Some(mut player) = entity.get_mut::<Player>() {
        player.is_inside_finish = false;
    }
    if let Some(mut scene) = entity.get_mut::<Scene2D>() {
        scene.center = center;
        scene.rotation = rotation;
        scene.set_shown(true);
    }
    create_body(world, reused);
}
