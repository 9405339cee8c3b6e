use avian2d::prelude::CollidingEntities;
use bevy::prelude::*;

use crate::{
    level_io::{LoadLevel, LoadMode},
    map::{is_deleted, EditorObject, Map},
    objects::{CollectiblePoint, DestroyablePlatform, Finish, MovingObject, Player, RotatingObject},
    physics::{create_body, destroy_body, reset_body, PhysicsBody},
    scene2d::Scene2D,
    GameMode,
};

pub struct PlayPlugin;

impl Plugin for PlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelState>()
            .init_resource::<PlaySettings>()
            .add_systems(
                Update,
                (
                    collect_contacts,
                    check_finish,
                    auto_restart,
                    restart_level_system,
                    move_platforms,
                    rotate_objects,
                )
                    .chain()
                    .run_if(resource_equals(GameMode::Play)),
            );
    }
}

/// Progress through the level being played.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct LevelState {
    pub restart_requested: bool,
    pub finished: bool,
    pub collected_points: u32,
}

#[derive(Resource, Clone, Debug)]
pub struct PlaySettings {
    /// Meters per second.
    pub moving_speed: f32,
    /// Degrees per second.
    pub rotation_speed: f32,
    /// The level restarts once the player falls below this height.
    pub fall_limit: f32,
    /// Start over instead of moving on when the finish is reached.
    pub restart_when_finished: bool,
    /// Id of the last level. Finishing it loads it again.
    pub level_count: i32,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self {
            moving_speed: 4.0,
            rotation_speed: 90.0,
            fall_limit: -10.0,
            restart_when_finished: false,
            level_count: 10,
        }
    }
}

/// Placement of a destroyable platform from before it broke.
#[derive(Component, Clone, Copy, Debug)]
pub struct BrokenBody {
    center: Vec2,
    rotation: f32,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Applies the rules for everything `player` currently touches: points are
/// collected and the finish marks the player as inside it.
pub fn register_contacts(world: &mut World, player: Entity, touching: &[Entity]) {
    let mut inside_finish = false;
    let mut collected = 0;
    for &other in touching {
        if world.get::<Finish>(other).is_some() {
            inside_finish = true;
        }
        let Ok(mut entity) = world.get_entity_mut(other) else {
            continue;
        };
        let Some(mut point) = entity.get_mut::<CollectiblePoint>() else {
            continue;
        };
        if point.is_collected {
            continue;
        }
        point.is_collected = true;
        if let Some(mut scene) = entity.get_mut::<Scene2D>() {
            scene.visible = false;
        }
        collected += 1;
    }

    if let Some(mut player) = world.get_mut::<Player>(player)
        && player.is_inside_finish != inside_finish
    {
        player.is_inside_finish = inside_finish;
    }
    if collected > 0 {
        let mut state = world.get_resource_or_init::<LevelState>();
        state.collected_points += collected;
        debug!("Collected {collected} point(s), {} total", state.collected_points);
    }
}

fn collect_contacts(world: &mut World) {
    let mut players = world.query_filtered::<(Entity, &CollidingEntities), With<Player>>();
    let contacts: Vec<(Entity, Vec<Entity>)> = players
        .iter(world)
        .map(|(entity, colliding)| (entity, colliding.iter().copied().collect()))
        .collect();
    for (player, touching) in contacts {
        register_contacts(world, player, &touching);
    }
}

/// The level that follows `current`, never past the last one.
pub fn next_level_id(current: i32, level_count: i32) -> i32 {
    (current + 1).min(level_count)
}

fn check_finish(
    mut commands: Commands,
    players: Query<&Player>,
    settings: Res<PlaySettings>,
    mut state: ResMut<LevelState>,
    mut map: ResMut<Map>,
) {
    if state.finished || !players.iter().any(|player| player.is_inside_finish) {
        return;
    }
    info!(
        "Level {} finished with {} point(s)",
        map.level_id, state.collected_points
    );
    state.finished = true;
    if settings.restart_when_finished {
        state.restart_requested = true;
        return;
    }

    let next = next_level_id(map.level_id, settings.level_count);
    map.level_id = next;
    map.update_rounded_platforms = true;
    commands.trigger(LoadLevel {
        id: next,
        mode: LoadMode::Play,
    });
}

fn auto_restart(
    players: Query<&Scene2D, With<Player>>,
    settings: Res<PlaySettings>,
    mut state: ResMut<LevelState>,
) {
    if players
        .iter()
        .any(|scene| scene.center.y < settings.fall_limit)
    {
        state.restart_requested = true;
    }
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

/// Hides a destroyable platform and destroys its body until the next restart.
pub fn break_destroyable_platform(world: &mut World, entity: Entity) -> bool {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return false;
    };
    let Some(mut destroyable) = entity_mut.get_mut::<DestroyablePlatform>() else {
        return false;
    };
    if destroyable.is_removed {
        return false;
    }
    destroyable.is_removed = true;
    if let Some(&body) = entity_mut.get::<PhysicsBody>() {
        entity_mut.insert(BrokenBody {
            center: body.initial_center,
            rotation: body.initial_rotation,
        });
    }
    if let Some(mut scene) = entity_mut.get_mut::<Scene2D>() {
        scene.visible = false;
    }
    destroy_body(world, entity);
    true
}

/// Puts everything back where the level started.
pub fn restart_level(world: &mut World) {
    let mut bodies = world.query_filtered::<Entity, With<PhysicsBody>>();
    let bodies: Vec<Entity> = bodies.iter(world).collect();
    for entity in bodies {
        reset_body(world, entity);
    }

    let mut moving = world.query::<(&mut MovingObject, &mut Scene2D)>();
    for (mut moving, mut scene) in moving.iter_mut(world) {
        moving.toward_end = true;
        scene.center = moving.start;
    }

    let mut destroyables =
        world.query::<(Entity, &DestroyablePlatform, Option<&EditorObject>)>();
    let removed: Vec<Entity> = destroyables
        .iter(world)
        .filter(|(_, destroyable, editor)| destroyable.is_removed && !is_deleted(*editor))
        .map(|(entity, _, _)| entity)
        .collect();
    for entity in removed {
        let mut entity_mut = world.entity_mut(entity);
        if let Some(mut destroyable) = entity_mut.get_mut::<DestroyablePlatform>() {
            destroyable.is_removed = false;
        }
        let broken = entity_mut.take::<BrokenBody>();
        if let Some(mut scene) = entity_mut.get_mut::<Scene2D>() {
            scene.visible = true;
            if let Some(broken) = broken {
                scene.center = broken.center;
                scene.rotation = broken.rotation;
            }
        }
        create_body(world, entity);
    }

    let mut points = world.query::<(&mut CollectiblePoint, &mut Scene2D, Option<&EditorObject>)>();
    for (mut point, mut scene, editor) in points.iter_mut(world) {
        if point.is_collected && !is_deleted(editor) {
            point.is_collected = false;
            scene.visible = true;
        }
    }

    let mut players = world.query::<&mut Player>();
    for mut player in players.iter_mut(world) {
        player.is_inside_finish = false;
    }

    *world.get_resource_or_init::<LevelState>() = LevelState::default();
    info!("Level restarted");
}

fn restart_level_system(world: &mut World) {
    if world
        .get_resource::<LevelState>()
        .is_some_and(|state| state.restart_requested)
    {
        restart_level(world);
    }
}

// ---------------------------------------------------------------------------
// Moving and rotating objects
// ---------------------------------------------------------------------------

/// Advances a moving platform by `distance`, turning around at either end.
pub fn step_moving(scene: &mut Scene2D, moving: &mut MovingObject, distance: f32) {
    let target = moving.target();
    let to_target = target - scene.center;
    if to_target.length() <= distance {
        scene.center = target;
        moving.toward_end = !moving.toward_end;
    } else {
        scene.center += to_target.normalize() * distance;
    }
}

fn move_platforms(
    time: Res<Time>,
    settings: Res<PlaySettings>,
    mut platforms: Query<(&mut Scene2D, &mut MovingObject, Option<&DestroyablePlatform>)>,
) {
    let distance = settings.moving_speed * time.delta_secs();
    for (mut scene, mut moving, destroyable) in &mut platforms {
        if destroyable.is_some_and(|destroyable| destroyable.is_removed) {
            continue;
        }
        step_moving(&mut scene, &mut moving, distance);
    }
}

fn rotate_objects(
    time: Res<Time>,
    settings: Res<PlaySettings>,
    mut objects: Query<&mut Scene2D, With<RotatingObject>>,
) {
    let degrees = settings.rotation_speed * time.delta_secs();
    for mut scene in &mut objects {
        scene.rotation = (scene.rotation + degrees) % 360.0;
    }
}
