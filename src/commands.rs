use bevy::prelude::*;
use gravity_box_commands::flush_command_history;
pub use gravity_box_commands::{CommandHistory, EditorCommand};

use crate::{
    linked::{linked, record_respawn, resolve, unlink_all, LinkRole, Respawned},
    map::{mark_rounded_platforms_dirty, renumber_on_delete, renumber_on_insert, EditorObject, MapObject},
    objects::{
        spawn_moving_helpers, DestroyablePlatform, MockMapObject, MovingObject, Platform,
        RotatingIndicator, RotatingObject, MOCK_OFFSET,
    },
    physics::{create_body, destroy_body, rebase_body, BodyDef},
    scene2d::{ColorType, Scene2D},
};

pub type MapHistory = CommandHistory<MapCommand>;

pub struct CommandHistoryPlugin;

impl Plugin for CommandHistoryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MapHistory>()
            .add_observer(handle_undo_redo_request)
            .add_systems(
                Update,
                (flush_command_history::<MapCommand>, prune_discarded_commands).chain(),
            );
    }
}

/// Asks the ledger for one more undo or redo step. The step itself runs when
/// the ledger is flushed later in the frame.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoRedoRequest {
    Undo,
    Redo,
}

fn handle_undo_redo_request(event: On<UndoRedoRequest>, mut history: ResMut<MapHistory>) {
    match *event {
        UndoRedoRequest::Undo => history.request_undo(),
        UndoRedoRequest::Redo => history.request_redo(),
    }
}

// ---------------------------------------------------------------------------
// MapCommand
// ---------------------------------------------------------------------------

/// Every reversible edit the map editor can make.
///
/// Entities are stored as they were when the command was built and resolved
/// through [`resolve`] on every run, so commands keep working on mock targets
/// that undo/redo despawned and re-created.
#[derive(Debug, Clone)]
pub enum MapCommand {
    Move {
        entity: Entity,
        delta: Vec2,
    },
    Rotate {
        entity: Entity,
        degrees: f32,
    },
    Resize {
        entity: Entity,
        size_delta: Vec2,
        center_delta: Vec2,
    },
    Add(AddObject),
    /// The inverse of [`MapCommand::Add`].
    Delete(AddObject),
    /// MakeDestroyable when `destroyable`, MakeNonDestroyable otherwise.
    SetDestroyable {
        entity: Entity,
        destroyable: bool,
    },
    /// MakeMoving when `moving`, MakeNonMoving otherwise.
    SetMoving {
        toggle: MovingToggle,
        moving: bool,
    },
    /// MakeRotating when `rotating`, MakeNonRotating otherwise.
    SetRotating {
        entity: Entity,
        rotating: bool,
    },
    /// Runs in order, reverts in reverse order.
    Group {
        label: String,
        commands: Vec<MapCommand>,
    },
}

fn assert_spatial(world: &World, entity: Entity, command: &str) {
    assert!(
        world.get::<Scene2D>(entity).is_some(),
        "{command} command requires an entity with a spatial placement, got {entity}"
    );
}

fn assert_platform(world: &World, entity: Entity, command: &str) {
    assert!(
        world.get::<Platform>(entity).is_some() || world.get::<DestroyablePlatform>(entity).is_some(),
        "{command} command requires a platform, got {entity}"
    );
}

impl MapCommand {
    pub fn move_by(world: &World, entity: Entity, delta: Vec2) -> Self {
        assert_spatial(world, entity, "Move");
        Self::Move { entity, delta }
    }

    pub fn rotate_by(world: &World, entity: Entity, degrees: f32) -> Self {
        assert_spatial(world, entity, "Rotate");
        Self::Rotate { entity, degrees }
    }

    pub fn resize_by(world: &World, entity: Entity, size_delta: Vec2, center_delta: Vec2) -> Self {
        assert_spatial(world, entity, "Resize");
        Self::Resize {
            entity,
            size_delta,
            center_delta,
        }
    }

    pub fn add(world: &World, entity: Entity) -> Self {
        Self::Add(AddObject::new(world, entity))
    }

    pub fn delete(world: &World, entity: Entity) -> Self {
        assert!(
            world
                .get::<EditorObject>(entity)
                .is_some_and(|editor| !editor.is_deleted),
            "Delete command requires a visible editor object, got {entity}"
        );
        Self::Delete(AddObject::new(world, entity))
    }

    pub fn set_destroyable(world: &World, entity: Entity, destroyable: bool) -> Self {
        assert_platform(world, entity, "Destroyable");
        Self::SetDestroyable {
            entity,
            destroyable,
        }
    }

    pub fn set_moving(world: &World, platform: Entity, moving: bool) -> Self {
        assert_platform(world, platform, "Moving");
        Self::SetMoving {
            toggle: MovingToggle::new(world, platform),
            moving,
        }
    }

    pub fn set_rotating(world: &World, entity: Entity, rotating: bool) -> Self {
        assert_platform(world, entity, "Rotating");
        Self::SetRotating { entity, rotating }
    }

    pub fn group(label: impl Into<String>, commands: Vec<MapCommand>) -> Self {
        Self::Group {
            label: label.into(),
            commands,
        }
    }

    /// Every entity the command refers to, as stored.
    fn collect_entities(&self, out: &mut Vec<Entity>) {
        match self {
            Self::Move { entity, .. }
            | Self::Rotate { entity, .. }
            | Self::Resize { entity, .. }
            | Self::SetDestroyable { entity, .. }
            | Self::SetRotating { entity, .. } => out.push(*entity),
            Self::Add(add) | Self::Delete(add) => add.collect_entities(out),
            Self::SetMoving { toggle, .. } => toggle.collect_entities(out),
            Self::Group { commands, .. } => {
                for command in commands {
                    command.collect_entities(out);
                }
            }
        }
    }

    /// Objects this command brings into the map.
    fn collect_added_objects(&self, out: &mut Vec<Entity>) {
        match self {
            Self::Add(AddObject {
                target: AddTarget::Object(entity),
            }) => out.push(*entity),
            Self::Group { commands, .. } => {
                for command in commands {
                    command.collect_added_objects(out);
                }
            }
            _ => {}
        }
    }
}

/// Cleans up after redo entries that a new edit invalidated. Hidden objects
/// only those entries could have brought back are despawned with their
/// helpers, and respawn records no remaining command resolves through are
/// dropped.
pub fn prune_discarded_commands(world: &mut World) {
    let Some(mut history) = world.get_resource_mut::<MapHistory>() else {
        return;
    };
    let discarded = history.take_discarded();
    if discarded.is_empty() {
        return;
    }
    let mut referenced = Vec::new();
    for command in history.undo_commands() {
        command.collect_entities(&mut referenced);
    }

    let mut added = Vec::new();
    for command in &discarded {
        command.collect_added_objects(&mut added);
    }
    for entity in added {
        if referenced.contains(&entity)
            || !world
                .get::<EditorObject>(entity)
                .is_some_and(|editor| editor.is_deleted)
        {
            continue;
        }
        let helpers = [LinkRole::MockPlatform, LinkRole::DashedLine]
            .map(|role| linked(world, entity, role));
        for helper in helpers.into_iter().flatten() {
            if !referenced.contains(&helper) {
                world.despawn(helper);
            }
        }
        destroy_body(world, entity);
        world.despawn(entity);
        debug!("Despawned {entity}, it can no longer be restored");
    }

    if let Some(mut respawned) = world.get_resource_mut::<Respawned>() {
        respawned.retain_reachable(referenced);
    }
}

impl EditorCommand for MapCommand {
    fn execute(&mut self, world: &mut World) -> Entity {
        match self {
            Self::Move { entity, delta } => {
                let entity = resolve(world, *entity);
                translate(world, entity, *delta);
                entity
            }
            Self::Rotate { entity, degrees } => {
                let entity = resolve(world, *entity);
                rotate(world, entity, *degrees);
                entity
            }
            Self::Resize {
                entity,
                size_delta,
                center_delta,
            } => {
                let entity = resolve(world, *entity);
                resize(world, entity, *size_delta, *center_delta);
                entity
            }
            Self::Add(add) => add.add(world),
            Self::Delete(add) => add.remove(world),
            Self::SetDestroyable {
                entity,
                destroyable,
            } => {
                set_destroyable(world, *entity, *destroyable);
                *entity
            }
            Self::SetMoving { toggle, moving } => {
                if *moving {
                    toggle.make_moving(world);
                } else {
                    toggle.make_non_moving(world);
                }
                toggle.platform
            }
            Self::SetRotating { entity, rotating } => {
                set_rotating(world, *entity, *rotating);
                *entity
            }
            Self::Group { commands, .. } => {
                let mut affected = Entity::PLACEHOLDER;
                for command in commands.iter_mut() {
                    affected = command.execute(world);
                }
                affected
            }
        }
    }

    fn unexecute(&mut self, world: &mut World) {
        match self {
            Self::Move { entity, delta } => {
                let entity = resolve(world, *entity);
                translate(world, entity, -*delta);
            }
            Self::Rotate { entity, degrees } => {
                let entity = resolve(world, *entity);
                rotate(world, entity, -*degrees);
            }
            Self::Resize {
                entity,
                size_delta,
                center_delta,
            } => {
                let entity = resolve(world, *entity);
                resize(world, entity, -*size_delta, -*center_delta);
            }
            Self::Add(add) => {
                add.remove(world);
            }
            Self::Delete(add) => {
                add.add(world);
            }
            Self::SetDestroyable {
                entity,
                destroyable,
            } => set_destroyable(world, *entity, !*destroyable),
            Self::SetMoving { toggle, moving } => {
                if *moving {
                    toggle.make_non_moving(world);
                } else {
                    toggle.make_moving(world);
                }
            }
            Self::SetRotating { entity, rotating } => set_rotating(world, *entity, !*rotating),
            Self::Group { commands, .. } => {
                for command in commands.iter_mut().rev() {
                    command.unexecute(world);
                }
            }
        }
    }

    fn description(&self) -> &str {
        match self {
            Self::Move { .. } => "Move object",
            Self::Rotate { .. } => "Rotate object",
            Self::Resize { .. } => "Resize object",
            Self::Add(_) => "Add object",
            Self::Delete(_) => "Delete object",
            Self::SetDestroyable { destroyable: true, .. } => "Make destroyable",
            Self::SetDestroyable { destroyable: false, .. } => "Make non-destroyable",
            Self::SetMoving { moving: true, .. } => "Make moving",
            Self::SetMoving { moving: false, .. } => "Make non-moving",
            Self::SetRotating { rotating: true, .. } => "Make rotating",
            Self::SetRotating { rotating: false, .. } => "Make non-rotating",
            Self::Group { label, .. } => label.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Spatial edits
// ---------------------------------------------------------------------------

fn translate(world: &mut World, entity: Entity, delta: Vec2) {
    if let Some(mut scene) = world.get_mut::<Scene2D>(entity) {
        scene.center += delta;
    }
    placement_edited(world, entity);
}

/// Rotates the entity and, for a moving platform, its mock target.
fn rotate(world: &mut World, entity: Entity, degrees: f32) {
    if let Some(mut scene) = world.get_mut::<Scene2D>(entity) {
        scene.rotation += degrees;
    }
    if world.get::<MovingObject>(entity).is_some()
        && let Some(mock) = linked(world, entity, LinkRole::MockPlatform)
        && let Some(mut scene) = world.get_mut::<Scene2D>(mock)
    {
        scene.rotation += degrees;
    }
    placement_edited(world, entity);
}

fn resize(world: &mut World, entity: Entity, size_delta: Vec2, center_delta: Vec2) {
    let scene = {
        let Some(mut scene) = world.get_mut::<Scene2D>(entity) else {
            return;
        };
        grow(&mut scene, size_delta, center_delta);
        scene.clone()
    };
    if let Some(mut destroyable) = world.get_mut::<DestroyablePlatform>(entity) {
        destroyable.update_fragments(&scene);
    }
    if world.get::<MovingObject>(entity).is_some()
        && let Some(mock) = linked(world, entity, LinkRole::MockPlatform)
        && let Some(mut mock_scene) = world.get_mut::<Scene2D>(mock)
    {
        grow(&mut mock_scene, size_delta, center_delta);
    }
    placement_edited(world, entity);
    mark_rounded_platforms_dirty(world);
}

/// An edited placement is where play starts from: the body resets there and a
/// moving platform travels between it and its mock target.
fn placement_edited(world: &mut World, entity: Entity) {
    rebase_body(world, entity);

    let platform = if world.get::<MockMapObject>(entity).is_some() {
        let Some(platform) = linked(world, entity, LinkRole::Platform) else {
            return;
        };
        platform
    } else {
        entity
    };
    let Some(start) = world.get::<Scene2D>(platform).map(|scene| scene.center) else {
        return;
    };
    let end = linked(world, platform, LinkRole::MockPlatform)
        .and_then(|mock| world.get::<Scene2D>(mock))
        .map(|scene| scene.center);
    if let Some(mut moving) = world.get_mut::<MovingObject>(platform) {
        moving.start = start;
        moving.end = end.unwrap_or(moving.end);
        moving.toward_end = true;
    }
}

fn grow(scene: &mut Scene2D, size_delta: Vec2, center_delta: Vec2) {
    scene.width += size_delta.x;
    scene.height += size_delta.y;
    scene.image_size += size_delta;
    scene.center += center_delta;
}

// ---------------------------------------------------------------------------
// Capability toggles
// ---------------------------------------------------------------------------

fn set_destroyable(world: &mut World, entity: Entity, destroyable: bool) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    let Some(scene) = entity_mut.get::<Scene2D>().cloned() else {
        return;
    };
    if destroyable {
        entity_mut.remove::<Platform>();
        entity_mut.insert(DestroyablePlatform::for_scene(&scene));
    } else {
        entity_mut.remove::<DestroyablePlatform>();
        entity_mut.insert(Platform);
    }
    mark_rounded_platforms_dirty(world);
}

fn set_rotating(world: &mut World, entity: Entity, rotating: bool) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    if rotating {
        entity_mut.insert((RotatingObject, RotatingIndicator));
    } else {
        entity_mut.remove::<(RotatingObject, RotatingIndicator)>();
    }
}

/// Turns a platform's moving capability on and off, remembering where its
/// mock target was so that turning it back on restores the same target.
#[derive(Debug, Clone)]
pub struct MovingToggle {
    platform: Entity,
    /// The mock created or removed last.
    last_mock: Option<Entity>,
    /// Center of the mock target when the platform last stopped moving.
    target: Option<Vec2>,
}

impl MovingToggle {
    pub fn new(world: &World, platform: Entity) -> Self {
        let mock = linked(world, platform, LinkRole::MockPlatform);
        Self {
            platform,
            last_mock: mock,
            target: mock.and_then(|mock| world.get::<Scene2D>(mock)).map(|scene| scene.center),
        }
    }

    pub fn platform(&self) -> Entity {
        self.platform
    }

    fn collect_entities(&self, out: &mut Vec<Entity>) {
        out.push(self.platform);
        out.extend(self.last_mock);
    }

    /// Attaches the moving component and spawns the mock target with its
    /// dashed line. Returns the new mock.
    pub fn make_moving(&mut self, world: &mut World) -> Entity {
        let center = world
            .get::<Scene2D>(self.platform)
            .map(|scene| scene.center)
            .unwrap_or_default();
        let target = self.target.unwrap_or(center + MOCK_OFFSET);
        if let Ok(mut platform) = world.get_entity_mut(self.platform) {
            platform.insert(MovingObject::new(center, target));
        }
        let mock = spawn_moving_helpers(world, self.platform, target);
        if let Some(old) = self.last_mock {
            record_respawn(world, old, mock);
        }
        self.last_mock = Some(mock);
        mark_rounded_platforms_dirty(world);
        mock
    }

    /// Removes the moving component, despawns the mock target and the dashed
    /// line and clears the platform's links. Returns the removed mock.
    pub fn make_non_moving(&mut self, world: &mut World) -> Option<Entity> {
        let mock = linked(world, self.platform, LinkRole::MockPlatform);
        let line = linked(world, self.platform, LinkRole::DashedLine);
        if let Some(mock) = mock {
            self.target = world.get::<Scene2D>(mock).map(|scene| scene.center);
            self.last_mock = Some(mock);
            world.despawn(mock);
        }
        if let Some(line) = line {
            world.despawn(line);
        }
        if let Ok(mut platform) = world.get_entity_mut(self.platform) {
            platform.remove::<MovingObject>();
        }
        unlink_all(world, self.platform);
        mark_rounded_platforms_dirty(world);
        mock
    }
}

// ---------------------------------------------------------------------------
// Add / Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum AddTarget {
    Object(Entity),
    /// A mock target. Adding it makes its platform moving again.
    Mock(MovingToggle),
}

/// Shows a hidden object again, or hides it when reverted.
#[derive(Debug, Clone)]
pub struct AddObject {
    target: AddTarget,
}

impl AddObject {
    pub fn new(world: &World, entity: Entity) -> Self {
        assert!(
            world.get::<EditorObject>(entity).is_some(),
            "Add command requires an editor object, got {entity}"
        );
        let target = if world.get::<MockMapObject>(entity).is_some() {
            let platform = linked(world, entity, LinkRole::Platform)
                .unwrap_or_else(|| panic!("Mock object {entity} is not linked to a platform"));
            let mut toggle = MovingToggle::new(world, platform);
            toggle.last_mock = Some(entity);
            toggle.target = world.get::<Scene2D>(entity).map(|scene| scene.center);
            AddTarget::Mock(toggle)
        } else {
            AddTarget::Object(entity)
        };
        Self { target }
    }

    fn collect_entities(&self, out: &mut Vec<Entity>) {
        match &self.target {
            AddTarget::Object(entity) => out.push(*entity),
            AddTarget::Mock(toggle) => toggle.collect_entities(out),
        }
    }

    /// Makes the object visible and returns the entity that was shown.
    fn add(&mut self, world: &mut World) -> Entity {
        let entity = match &mut self.target {
            AddTarget::Object(entity) => *entity,
            AddTarget::Mock(toggle) => toggle.make_moving(world),
        };

        if let Some(mut editor) = world.get_mut::<EditorObject>(entity) {
            editor.is_deleted = false;
        }
        if let Some(mut scene) = world.get_mut::<Scene2D>(entity) {
            scene.set_shown(true);
        }
        if world.get::<BodyDef>(entity).is_some() {
            create_body(world, entity);
        }
        if world.get::<MovingObject>(entity).is_some()
            && let Some(mock) = linked(world, entity, LinkRole::MockPlatform)
        {
            show_editor_object(world, mock, true);
        }
        if let Some(mut color) = world.get_mut::<ColorType>(entity) {
            *color = ColorType::Dark;
        }
        if let Some(&MapObject { id }) = world.get::<MapObject>(entity) {
            renumber_on_insert(world, entity, id);
        }
        mark_rounded_platforms_dirty(world);
        entity
    }

    /// Hides the object and returns the entity that was hidden.
    fn remove(&mut self, world: &mut World) -> Entity {
        let entity = match &mut self.target {
            AddTarget::Object(entity) => {
                let entity = *entity;
                show_editor_object(world, entity, false);
                if world.get::<MovingObject>(entity).is_some()
                    && let Some(mock) = linked(world, entity, LinkRole::MockPlatform)
                {
                    show_editor_object(world, mock, false);
                }
                destroy_body(world, entity);
                if let Some(&MapObject { id }) = world.get::<MapObject>(entity) {
                    renumber_on_delete(world, id);
                }
                entity
            }
            // The mock may have been re-created since this command was built.
            AddTarget::Mock(toggle) => toggle
                .make_non_moving(world)
                .unwrap_or_else(|| resolve(world, toggle.last_mock.unwrap_or(toggle.platform))),
        };
        mark_rounded_platforms_dirty(world);
        entity
    }
}

fn show_editor_object(world: &mut World, entity: Entity, shown: bool) {
    if let Some(mut editor) = world.get_mut::<EditorObject>(entity) {
        editor.is_deleted = !shown;
        if !shown {
            editor.is_selected = false;
        }
    }
    if let Some(mut scene) = world.get_mut::<Scene2D>(entity) {
        scene.set_shown(shown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        map::{visible_object_ids, Map},
        objects::{spawn_platform, DashedLine, PlatformParams},
        physics::PhysicsBody,
    };

    fn setup() -> World {
        let mut world = World::new();
        world.init_resource::<Map>();
        world.init_resource::<MapHistory>();
        world
    }

    fn platform(world: &mut World, id: i32, x: f32) -> Entity {
        spawn_platform(world, &PlatformParams::new(id, Vec2::new(x, 0.0), 2.0))
    }

    fn scene(world: &World, entity: Entity) -> Scene2D {
        world.get::<Scene2D>(entity).unwrap().clone()
    }

    fn count<C: Component>(world: &mut World) -> usize {
        world.query_filtered::<(), With<C>>().iter(world).count()
    }

    #[test]
    fn move_rotate_resize_round_trip() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 1.5);
        let before = scene(&world, entity);

        let mut commands = vec![
            MapCommand::move_by(&world, entity, Vec2::new(1.0, -2.0)),
            MapCommand::rotate_by(&world, entity, 45.0),
            MapCommand::resize_by(&world, entity, Vec2::new(1.0, 0.0), Vec2::new(0.5, 0.0)),
        ];
        for command in &mut commands {
            command.execute(&mut world);
        }
        let after = scene(&world, entity);
        assert_eq!(after.center, Vec2::new(3.0, -2.0));
        assert_eq!(after.rotation, 45.0);
        assert_eq!(after.width, 3.0);

        for command in commands.iter_mut().rev() {
            command.unexecute(&mut world);
        }
        assert_eq!(scene(&world, entity), before);
    }

    #[test]
    fn rotate_and_resize_propagate_to_the_mock() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        let mut moving = MapCommand::set_moving(&world, entity, true);
        moving.execute(&mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();

        MapCommand::rotate_by(&world, entity, 90.0).execute(&mut world);
        MapCommand::resize_by(&world, entity, Vec2::new(2.0, 0.0), Vec2::new(1.0, 0.0))
            .execute(&mut world);

        let mock_scene = scene(&world, mock);
        assert_eq!(mock_scene.rotation, 90.0);
        assert_eq!(mock_scene.width, 4.0);
        assert_eq!(mock_scene.image_size.x, 4.0);
        assert_eq!(mock_scene.center, MOCK_OFFSET + Vec2::new(1.0, 0.0));
    }

    #[test]
    fn edits_keep_the_moving_path_on_the_platform_and_its_mock() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        MapCommand::set_moving(&world, entity, true).execute(&mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();

        let mut move_platform = MapCommand::move_by(&world, entity, Vec2::new(4.0, 0.0));
        move_platform.execute(&mut world);
        MapCommand::move_by(&world, mock, Vec2::new(0.0, 6.0)).execute(&mut world);

        let moving = *world.get::<MovingObject>(entity).unwrap();
        assert_eq!(moving.start, Vec2::new(4.0, 0.0));
        assert_eq!(moving.end, MOCK_OFFSET + Vec2::new(0.0, 6.0));
        assert_eq!(
            world.get::<PhysicsBody>(entity).unwrap().initial_center,
            Vec2::new(4.0, 0.0)
        );

        move_platform.unexecute(&mut world);
        assert_eq!(world.get::<MovingObject>(entity).unwrap().start, Vec2::ZERO);
        assert_eq!(world.get::<PhysicsBody>(entity).unwrap().initial_center, Vec2::ZERO);
    }

    #[test]
    fn resize_updates_destroyable_fragments() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        MapCommand::set_destroyable(&world, entity, true).execute(&mut world);
        assert_eq!(world.get::<DestroyablePlatform>(entity).unwrap().fragments.len(), 8);

        MapCommand::resize_by(&world, entity, Vec2::new(1.0, 0.0), Vec2::ZERO).execute(&mut world);
        assert_eq!(world.get::<DestroyablePlatform>(entity).unwrap().fragments.len(), 12);
    }

    #[test]
    fn toggle_moving_creates_and_removes_helpers() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        let mut command = MapCommand::set_moving(&world, entity, true);

        command.execute(&mut world);
        assert!(world.get::<MovingObject>(entity).is_some());
        assert_eq!(count::<MockMapObject>(&mut world), 1);
        assert_eq!(count::<DashedLine>(&mut world), 1);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();
        assert_eq!(linked(&world, mock, LinkRole::Platform), Some(entity));

        command.unexecute(&mut world);
        assert!(world.get::<MovingObject>(entity).is_none());
        assert_eq!(count::<MockMapObject>(&mut world), 0);
        assert_eq!(count::<DashedLine>(&mut world), 0);
        assert_eq!(linked(&world, entity, LinkRole::MockPlatform), None);
    }

    #[test]
    fn redo_of_moving_restores_the_moved_mock() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        let mut history = MapHistory::default();

        history.execute(MapCommand::set_moving(&world, entity, true), &mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();
        history.execute(MapCommand::move_by(&world, mock, Vec2::new(3.0, 0.0)), &mut world);
        let target = scene(&world, mock).center;

        // Undo both, then redo both: the move must land on the new mock.
        history.request_undo();
        history.request_undo();
        history.flush(&mut world);
        assert_eq!(count::<MockMapObject>(&mut world), 0);

        history.request_redo();
        history.request_redo();
        history.flush(&mut world);
        let new_mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();
        assert_ne!(new_mock, mock);
        assert_eq!(scene(&world, new_mock).center, target);
    }

    #[test]
    fn delete_mock_makes_the_platform_static_and_undo_brings_it_back() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        MapCommand::set_moving(&world, entity, true).execute(&mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();
        MapCommand::move_by(&world, mock, Vec2::new(0.0, 4.0)).execute(&mut world);
        let mock_center = scene(&world, mock).center;

        let mut delete = MapCommand::delete(&world, mock);
        assert_eq!(delete.execute(&mut world), mock);
        assert!(world.get::<MovingObject>(entity).is_none());
        assert_eq!(count::<MockMapObject>(&mut world), 0);

        delete.unexecute(&mut world);
        let restored = linked(&world, entity, LinkRole::MockPlatform).unwrap();
        assert_eq!(scene(&world, restored).center, mock_center);
        assert_eq!(resolve(&world, mock), restored);
        assert_eq!(
            world.get::<MovingObject>(entity).unwrap().end,
            mock_center
        );
    }

    #[test]
    fn add_on_mock_returns_the_new_mock() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        MapCommand::set_moving(&world, entity, true).execute(&mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();

        let mut add = MapCommand::add(&world, mock);
        add.unexecute(&mut world);
        assert_eq!(count::<MockMapObject>(&mut world), 0);
        let affected = add.execute(&mut world);
        assert_ne!(affected, mock);
        assert_eq!(linked(&world, entity, LinkRole::MockPlatform), Some(affected));
    }

    #[test]
    fn delete_hides_and_renumbers() {
        let mut world = setup();
        let a = platform(&mut world, 0, 0.0);
        let b = platform(&mut world, 1, 5.0);

        let mut delete = MapCommand::delete(&world, a);
        delete.execute(&mut world);
        assert!(world.get::<EditorObject>(a).unwrap().is_deleted);
        assert!(!scene(&world, a).visible);
        assert!(world.get::<PhysicsBody>(a).is_none());
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 0);

        delete.unexecute(&mut world);
        assert!(!world.get::<EditorObject>(a).unwrap().is_deleted);
        assert!(world.get::<PhysicsBody>(a).is_some());
        assert_eq!(world.get::<MapObject>(a).unwrap().id, 0);
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 1);
        assert_eq!(visible_object_ids(&mut world), vec![0, 1]);
    }

    #[test]
    fn deleting_a_moving_platform_hides_its_mock() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);
        MapCommand::set_moving(&world, entity, true).execute(&mut world);
        let mock = linked(&world, entity, LinkRole::MockPlatform).unwrap();

        let mut delete = MapCommand::delete(&world, entity);
        delete.execute(&mut world);
        assert!(world.get::<EditorObject>(mock).unwrap().is_deleted);
        delete.unexecute(&mut world);
        assert!(!world.get::<EditorObject>(mock).unwrap().is_deleted);
        assert!(scene(&world, mock).visible);
    }

    #[test]
    fn toggles_swap_components() {
        let mut world = setup();
        let entity = platform(&mut world, 0, 0.0);

        let mut destroyable = MapCommand::set_destroyable(&world, entity, true);
        destroyable.execute(&mut world);
        assert!(world.get::<Platform>(entity).is_none());
        assert!(world.get::<DestroyablePlatform>(entity).is_some());
        destroyable.unexecute(&mut world);
        assert!(world.get::<Platform>(entity).is_some());
        assert!(world.get::<DestroyablePlatform>(entity).is_none());

        let mut rotating = MapCommand::set_rotating(&world, entity, true);
        rotating.execute(&mut world);
        assert!(world.get::<RotatingObject>(entity).is_some());
        assert!(world.get::<RotatingIndicator>(entity).is_some());
        rotating.unexecute(&mut world);
        assert!(world.get::<RotatingObject>(entity).is_none());
        assert!(world.get::<RotatingIndicator>(entity).is_none());
    }

    #[test]
    fn group_reverts_in_reverse_order() {
        let mut world = setup();
        let a = platform(&mut world, 0, 0.0);
        let b = platform(&mut world, 1, 4.0);
        let c = platform(&mut world, 2, 8.0);

        let mut group = MapCommand::group(
            "Delete selection",
            vec![MapCommand::delete(&world, a), MapCommand::delete(&world, c)],
        );
        assert_eq!(group.description(), "Delete selection");
        group.execute(&mut world);
        assert_eq!(visible_object_ids(&mut world), vec![0]);
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 0);

        group.unexecute(&mut world);
        assert_eq!(world.get::<MapObject>(a).unwrap().id, 0);
        assert_eq!(world.get::<MapObject>(b).unwrap().id, 1);
        assert_eq!(world.get::<MapObject>(c).unwrap().id, 2);
    }

    #[test]
    fn undo_redo_requests_are_deferred_until_flush() {
        let mut app = App::new();
        app.add_plugins(CommandHistoryPlugin);
        app.init_resource::<Map>();
        let world = app.world_mut();
        let entity = platform(world, 0, 0.0);
        world.resource_scope(|world, mut history: Mut<MapHistory>| {
            history.execute(MapCommand::move_by(world, entity, Vec2::X), world);
        });

        world.trigger(UndoRedoRequest::Undo);
        assert_eq!(world.resource::<MapHistory>().levels_to_undo(), 1);
        assert_eq!(scene(world, entity).center, Vec2::X);

        app.update();
        let world = app.world_mut();
        assert_eq!(scene(world, entity).center, Vec2::ZERO);
        assert_eq!(world.resource::<MapHistory>().redo_len(), 1);
    }

    #[test]
    #[should_panic(expected = "spatial placement")]
    fn move_requires_a_placement() {
        let mut world = setup();
        let entity = world.spawn_empty().id();
        MapCommand::move_by(&world, entity, Vec2::X);
    }

    #[test]
    #[should_panic(expected = "requires a platform")]
    fn moving_requires_a_platform() {
        let mut world = setup();
        let entity = world.spawn(Scene2D::new(Vec2::ZERO, 1.0, 1.0, 0.0)).id();
        MapCommand::set_moving(&world, entity, true);
    }
}
