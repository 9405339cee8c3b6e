use avian2d::prelude::{
    AngularVelocity, Collider, ColliderDensity, CollidingEntities, CollisionLayers, Friction,
    LinearVelocity, Position, RigidBody, Rotation, Sensor,
};
use bevy::prelude::*;

use crate::scene2d::Scene2D;

/// Connects the body requests recorded by the core to avian. The avian
/// `PhysicsPlugins` themselves are added by the host app.
pub struct PhysicsBridgePlugin;

impl Plugin for PhysicsBridgePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PostUpdate,
            (attach_rigid_bodies, pull_dynamic_bodies, push_scene_to_bodies).chain(),
        )
        .add_observer(on_physics_body_removed);
    }
}

// ---------------------------------------------------------------------------
// Body definitions
// ---------------------------------------------------------------------------

/// Collision category bits.
pub struct EntityCategory;

impl EntityCategory {
    pub const NONE: u32 = 0;
    pub const PLAYER: u32 = 1 << 0;
    pub const FINISH: u32 = 1 << 1;
    pub const PLATFORM: u32 = 1 << 2;
    pub const COLLECTIBLE: u32 = 1 << 3;
    pub const BULLET: u32 = 1 << 4;
    /// Everything that blocks the player and bullets.
    pub const OBSTACLE: u32 = Self::PLAYER | Self::BULLET;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

impl From<BodyType> for RigidBody {
    fn from(body_type: BodyType) -> Self {
        match body_type {
            BodyType::Static => RigidBody::Static,
            BodyType::Kinematic => RigidBody::Kinematic,
            BodyType::Dynamic => RigidBody::Dynamic,
        }
    }
}

/// How to build the body of an entity. The shape is the entity's `Scene2D`
/// rectangle at creation time.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub category_bits: u32,
    pub mask_bits: u32,
    pub density: f32,
    pub friction: f32,
    pub is_sensor: bool,
}

impl BodyDef {
    pub fn new(body_type: BodyType, category_bits: u32, mask_bits: u32) -> Self {
        Self {
            body_type,
            category_bits,
            mask_bits,
            density: 1.0,
            friction: 0.2,
            is_sensor: false,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Handle of a live body. Present exactly while the entity has a body.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct PhysicsBody {
    pub def: BodyDef,
    pub size: Vec2,
    pub initial_center: Vec2,
    pub initial_rotation: f32,
}

// ---------------------------------------------------------------------------
// Body lifecycle
// ---------------------------------------------------------------------------

/// Creates (or re-creates) the body of `entity` from its `BodyDef`. Returns
/// false when the entity has no body definition or placement.
pub fn create_body(world: &mut World, entity: Entity) -> bool {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return false;
    };
    let (Some(&def), Some(scene)) = (entity_mut.get::<BodyDef>(), entity_mut.get::<Scene2D>())
    else {
        return false;
    };
    let body = PhysicsBody {
        def,
        size: scene.size(),
        initial_center: scene.center,
        initial_rotation: scene.rotation,
    };
    // Replace any previous body so the avian components are rebuilt.
    entity_mut.remove::<PhysicsBody>();
    entity_mut.insert(body);
    true
}

pub fn destroy_body(world: &mut World, entity: Entity) {
    if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
        entity_mut.remove::<PhysicsBody>();
    }
}

/// Puts the entity back where its body was created.
pub fn reset_body(world: &mut World, entity: Entity) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    let Some(&body) = entity_mut.get::<PhysicsBody>() else {
        return;
    };
    if let Some(mut scene) = entity_mut.get_mut::<Scene2D>() {
        scene.center = body.initial_center;
        scene.rotation = body.initial_rotation;
    }
    if let Some(mut velocity) = entity_mut.get_mut::<LinearVelocity>() {
        *velocity = LinearVelocity::ZERO;
    }
    if let Some(mut velocity) = entity_mut.get_mut::<AngularVelocity>() {
        *velocity = AngularVelocity::ZERO;
    }
}

/// Makes the current placement the one [`reset_body`] returns to.
pub fn rebase_body(world: &mut World, entity: Entity) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    let Some((center, rotation)) = entity_mut
        .get::<Scene2D>()
        .map(|scene| (scene.center, scene.rotation))
    else {
        return;
    };
    if let Some(mut body) = entity_mut.get_mut::<PhysicsBody>() {
        body.initial_center = center;
        body.initial_rotation = rotation;
    }
}

pub fn destroy_all_bodies(world: &mut World) {
    let bodies: Vec<Entity> = world
        .query_filtered::<Entity, With<PhysicsBody>>()
        .iter(world)
        .collect();
    for entity in bodies {
        destroy_body(world, entity);
    }
}

pub fn body_count(world: &mut World) -> usize {
    world
        .query_filtered::<(), With<PhysicsBody>>()
        .iter(world)
        .count()
}

// ---------------------------------------------------------------------------
// avian synchronization
// ---------------------------------------------------------------------------

fn attach_rigid_bodies(
    mut commands: Commands,
    added: Query<(Entity, &PhysicsBody, &Scene2D), Added<PhysicsBody>>,
) {
    for (entity, body, scene) in &added {
        let def = body.def;
        let mut entity_commands = commands.entity(entity);
        entity_commands.insert((
            RigidBody::from(def.body_type),
            Collider::rectangle(body.size.x, body.size.y),
            CollisionLayers::from_bits(def.category_bits, def.mask_bits),
            Friction::new(def.friction),
            ColliderDensity(def.density),
            Position::new(scene.center),
            Rotation::degrees(scene.rotation),
        ));
        if def.is_sensor {
            entity_commands.insert(Sensor);
        }
        if def.category_bits & EntityCategory::PLAYER != 0 {
            entity_commands.insert(CollidingEntities::default());
        }
    }
}

fn on_physics_body_removed(trigger: On<Remove, PhysicsBody>, mut commands: Commands) {
    let entity = trigger.event_target();
    if let Ok(mut entity_commands) = commands.get_entity(entity) {
        entity_commands.try_remove::<(
            RigidBody,
            Collider,
            CollisionLayers,
            Friction,
            ColliderDensity,
            Sensor,
            CollidingEntities,
        )>();
    }
}

/// Dynamic bodies are driven by the simulation.
fn pull_dynamic_bodies(mut bodies: Query<(&PhysicsBody, &Position, &Rotation, &mut Scene2D)>) {
    for (body, position, rotation, mut scene) in &mut bodies {
        if body.def.body_type != BodyType::Dynamic {
            continue;
        }
        if scene.center != position.0 {
            scene.center = position.0;
        }
        let degrees = rotation.as_degrees();
        if scene.rotation != degrees {
            scene.rotation = degrees;
        }
    }
}

/// Every other body follows its placement (editor edits, moving platforms).
fn push_scene_to_bodies(
    mut commands: Commands,
    mut bodies: Query<
        (Entity, &mut PhysicsBody, &Scene2D, &mut Position, &mut Rotation),
        Changed<Scene2D>,
    >,
) {
    for (entity, mut body, scene, mut position, mut rotation) in &mut bodies {
        if body.def.body_type == BodyType::Dynamic {
            continue;
        }
        position.0 = scene.center;
        *rotation = Rotation::degrees(scene.rotation);
        if body.size != scene.size() {
            body.size = scene.size();
            commands
                .entity(entity)
                .insert(Collider::rectangle(body.size.x, body.size.y));
        }
    }
}
