use bevy::prelude::*;

use crate::{
    linked::{link, LinkRole, LinkedEntities},
    map::{EditorObject, MapObject, Polygon},
    physics::{create_body, BodyDef, BodyType, EntityCategory},
    scene2d::{ColorType, Scene2D},
};

pub const PLATFORM_HEIGHT: f32 = 0.25;
pub const POINT_SIZE: f32 = 1.0;
pub const PLAYER_SIZE: f32 = 1.0;
pub const FINISH_SIZE: f32 = 2.0;
/// Width of one piece of a destroyable platform.
pub const FRAGMENT_WIDTH: f32 = 0.25;
/// Offset of a fresh mock target from its platform.
pub const MOCK_OFFSET: Vec2 = Vec2::new(1.0, 1.0);

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Platform;

/// A platform that breaks apart when hit and comes back on restart.
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct DestroyablePlatform {
    pub is_removed: bool,
    /// Fragment centers relative to the platform center, unrotated.
    pub fragments: Vec<Vec2>,
}

impl DestroyablePlatform {
    pub fn for_scene(scene: &Scene2D) -> Self {
        Self {
            is_removed: false,
            fragments: fragment_offsets(scene.width),
        }
    }

    pub fn update_fragments(&mut self, scene: &Scene2D) {
        self.fragments = fragment_offsets(scene.width);
    }
}

fn fragment_offsets(width: f32) -> Vec<Vec2> {
    let count = (width / FRAGMENT_WIDTH).round().max(1.0) as usize;
    let step = width / count as f32;
    (0..count)
        .map(|i| Vec2::new(-width / 2.0 + step * (i as f32 + 0.5), 0.0))
        .collect()
}

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct CollectiblePoint {
    pub is_collected: bool,
}

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Player {
    pub is_inside_finish: bool,
}

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Finish;

/// Editor-only placeholder showing where a moving platform travels to.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct MockMapObject;

/// Line drawn between a moving platform and its mock target.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct DashedLine {
    pub start: Vec2,
    pub end: Vec2,
}

// ---------------------------------------------------------------------------
// Behaviors
// ---------------------------------------------------------------------------

/// Platform that travels back and forth between `start` and `end`.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct MovingObject {
    pub start: Vec2,
    pub end: Vec2,
    pub toward_end: bool,
}

impl MovingObject {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            end,
            toward_end: true,
        }
    }

    pub fn target(&self) -> Vec2 {
        if self.toward_end { self.end } else { self.start }
    }
}

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct RotatingObject;

/// Editor hint that a platform spins during play.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct RotatingIndicator;

/// Which handles the editor overlay shows around a selected object.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapObjectOverlay {
    pub show_movement_buttons: bool,
    pub show_rotation_button: bool,
    pub show_resizing_buttons: bool,
    pub show_deletion_button: bool,
    pub show_settings_button: bool,
}

impl MapObjectOverlay {
    pub const PLATFORM: Self = Self {
        show_movement_buttons: true,
        show_rotation_button: true,
        show_resizing_buttons: true,
        show_deletion_button: true,
        show_settings_button: true,
    };
    pub const POINT: Self = Self {
        show_movement_buttons: true,
        show_rotation_button: true,
        show_resizing_buttons: false,
        show_deletion_button: true,
        show_settings_button: false,
    };
    pub const MOCK: Self = Self {
        show_movement_buttons: true,
        show_rotation_button: false,
        show_resizing_buttons: false,
        show_deletion_button: true,
        show_settings_button: false,
    };
    pub const MARKER: Self = Self {
        show_movement_buttons: true,
        show_rotation_button: true,
        show_resizing_buttons: false,
        show_deletion_button: false,
        show_settings_button: false,
    };
}

// ---------------------------------------------------------------------------
// Body definitions
// ---------------------------------------------------------------------------

pub fn platform_body_def() -> BodyDef {
    // Kinematic so that moving and rotating platforms push the player.
    BodyDef::new(
        BodyType::Kinematic,
        EntityCategory::PLATFORM,
        EntityCategory::OBSTACLE,
    )
}

pub fn player_body_def() -> BodyDef {
    BodyDef::new(
        BodyType::Dynamic,
        EntityCategory::PLAYER,
        EntityCategory::PLATFORM | EntityCategory::FINISH | EntityCategory::COLLECTIBLE,
    )
    .with_density(1.15)
    .with_friction(2.0)
}

pub fn finish_body_def() -> BodyDef {
    BodyDef::new(BodyType::Static, EntityCategory::FINISH, EntityCategory::PLAYER).sensor()
}

pub fn collectible_body_def() -> BodyDef {
    BodyDef::new(BodyType::Static, EntityCategory::COLLECTIBLE, EntityCategory::PLAYER).sensor()
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Everything needed to build a platform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformParams {
    pub id: i32,
    pub center: Vec2,
    pub width: f32,
    pub rotation: f32,
    pub is_destroyable: bool,
    pub is_rotating: bool,
    pub moving_to: Option<Vec2>,
}

impl PlatformParams {
    pub fn new(id: i32, center: Vec2, width: f32) -> Self {
        Self {
            id,
            center,
            width,
            rotation: 0.0,
            is_destroyable: false,
            is_rotating: false,
            moving_to: None,
        }
    }
}

/// Spawns a platform with its body. Editor helpers (mock target, dashed line,
/// rotation indicator) are not created here.
pub fn spawn_platform(world: &mut World, params: &PlatformParams) -> Entity {
    let scene = Scene2D::new(params.center, params.width, PLATFORM_HEIGHT, params.rotation);
    let mut entity = world.spawn((
        MapObject { id: params.id },
        EditorObject::default(),
        Polygon,
        ColorType::Dark,
        MapObjectOverlay::PLATFORM,
        platform_body_def(),
    ));
    if params.is_destroyable {
        entity.insert(DestroyablePlatform::for_scene(&scene));
    } else {
        entity.insert(Platform);
    }
    if params.is_rotating {
        entity.insert(RotatingObject);
    }
    if let Some(target) = params.moving_to {
        entity.insert(MovingObject::new(params.center, target));
    }
    entity.insert(scene);
    let entity = entity.id();
    create_body(world, entity);
    entity
}

pub fn spawn_collectible_point(world: &mut World, id: i32, center: Vec2, rotation: f32) -> Entity {
    let entity = world
        .spawn((
            MapObject { id },
            EditorObject::default(),
            Polygon,
            CollectiblePoint::default(),
            Scene2D::new(center, POINT_SIZE, POINT_SIZE, rotation),
            ColorType::Dark,
            MapObjectOverlay::POINT,
            collectible_body_def(),
        ))
        .id();
    create_body(world, entity);
    entity
}

pub fn spawn_player(world: &mut World, id: i32, center: Vec2, rotation: f32) -> Entity {
    let entity = world
        .spawn((
            MapObject { id },
            EditorObject::default(),
            Polygon,
            Player::default(),
            Scene2D::new(center, PLAYER_SIZE, PLAYER_SIZE, rotation),
            ColorType::Dark,
            MapObjectOverlay::MARKER,
            player_body_def(),
        ))
        .id();
    create_body(world, entity);
    entity
}

pub fn spawn_finish(world: &mut World, id: i32, center: Vec2, rotation: f32) -> Entity {
    let entity = world
        .spawn((
            MapObject { id },
            EditorObject::default(),
            Polygon,
            Finish,
            Scene2D::new(center, FINISH_SIZE, FINISH_SIZE, rotation),
            ColorType::Dark,
            MapObjectOverlay::MARKER,
            finish_body_def(),
        ))
        .id();
    create_body(world, entity);
    entity
}

/// Spawns the mock target of `platform` and links it back to the platform.
/// The platform side of the link is left to the caller.
pub fn spawn_mock_platform(
    world: &mut World,
    platform: Entity,
    center: Vec2,
    width: f32,
    rotation: f32,
) -> Entity {
    let mock = world
        .spawn((
            MockMapObject,
            EditorObject::default(),
            Polygon,
            Scene2D::new(center, width, PLATFORM_HEIGHT, rotation),
            ColorType::Dark,
            MapObjectOverlay::MOCK,
        ))
        .id();
    link(world, mock, LinkRole::Platform, platform);
    mock
}

pub fn spawn_dashed_line(world: &mut World, start: Vec2, end: Vec2) -> Entity {
    world
        .spawn((DashedLine { start, end }, ColorType::Dark))
        .id()
}

/// Creates the mock target and dashed line of a moving platform and links the
/// three together. Returns the mock.
pub fn spawn_moving_helpers(world: &mut World, platform: Entity, mock_center: Vec2) -> Entity {
    let (center, width, rotation) = match world.get::<Scene2D>(platform) {
        Some(scene) => (scene.center, scene.width, scene.rotation),
        None => (mock_center, 1.0, 0.0),
    };
    let mock = spawn_mock_platform(world, platform, mock_center, width, rotation);
    let line = spawn_dashed_line(world, center, mock_center);
    link(world, platform, LinkRole::MockPlatform, mock);
    link(world, platform, LinkRole::DashedLine, line);
    link(world, mock, LinkRole::DashedLine, line);
    mock
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Keeps every dashed line between its platform and the mock target.
pub(crate) fn update_dashed_lines(
    platforms: Query<(&Scene2D, &LinkedEntities), With<MovingObject>>,
    scenes: Query<&Scene2D>,
    mut lines: Query<&mut DashedLine>,
) {
    for (scene, links) in &platforms {
        let (Some(mock), Some(line)) = (
            links.get(LinkRole::MockPlatform),
            links.get(LinkRole::DashedLine),
        ) else {
            continue;
        };
        let (Ok(mock_scene), Ok(mut dashed)) = (scenes.get(mock), lines.get_mut(line)) else {
            continue;
        };
        let updated = DashedLine {
            start: scene.center,
            end: mock_scene.center,
        };
        if *dashed != updated {
            *dashed = updated;
        }
    }
}
