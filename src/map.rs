use bevy::prelude::*;

use crate::scene2d::Scene2D;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Any placeable object that is saved with the level.
///
/// `id` is the dense, zero-based position of the object among the visible
/// objects and doubles as the serialization order.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapObject {
    pub id: i32,
}

/// Editable object. Deleted objects stay in the world, hidden, so that undo
/// can bring them back without rebuilding them.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditorObject {
    pub is_selected: bool,
    pub is_deleted: bool,
}

/// Marks entities whose placement counts towards the map bounds.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Polygon;

pub(crate) fn is_deleted(editor: Option<&EditorObject>) -> bool {
    editor.is_some_and(|editor| editor.is_deleted)
}

// ---------------------------------------------------------------------------
// Map resource
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapPadding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for MapPadding {
    fn default() -> Self {
        Self {
            left: 2.0,
            right: 2.0,
            top: 5.0,
            bottom: 5.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl MapBounds {
    pub const EMPTY: Self = Self {
        left: f32::INFINITY,
        right: f32::NEG_INFINITY,
        bottom: f32::INFINITY,
        top: f32::NEG_INFINITY,
    };

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }

    pub fn include(&mut self, scene: &Scene2D) {
        let (min, max) = scene.aabb();
        self.left = self.left.min(min.x);
        self.right = self.right.max(max.x);
        self.bottom = self.bottom.min(min.y);
        self.top = self.top.max(max.y);
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The level currently loaded in the world.
#[derive(Resource, Clone, Debug)]
pub struct Map {
    pub level_id: i32,
    pub padding: MapPadding,
    pub bounds: MapBounds,
    /// Platform corner geometry must be regenerated before the next frame.
    pub update_rounded_platforms: bool,
}

impl Default for Map {
    fn default() -> Self {
        Self {
            level_id: 1,
            padding: MapPadding::default(),
            bounds: MapBounds::EMPTY,
            update_rounded_platforms: true,
        }
    }
}

impl Map {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub(crate) fn mark_rounded_platforms_dirty(world: &mut World) {
    if let Some(mut map) = world.get_resource_mut::<Map>() {
        map.update_rounded_platforms = true;
    }
}

// ---------------------------------------------------------------------------
// Id bookkeeping
// ---------------------------------------------------------------------------

/// Shifts every visible object at or above `new_id` up by one to make room
/// for `inserted`, which must already carry `new_id`.
pub fn renumber_on_insert(world: &mut World, inserted: Entity, new_id: i32) {
    let mut objects = world.query::<(Entity, &mut MapObject, Option<&EditorObject>)>();
    for (entity, mut object, editor) in objects.iter_mut(world) {
        if entity != inserted && !is_deleted(editor) && object.id >= new_id {
            object.id += 1;
        }
    }
}

/// Closes the gap left by a hidden object.
pub fn renumber_on_delete(world: &mut World, deleted_id: i32) {
    let mut objects = world.query::<(&mut MapObject, Option<&EditorObject>)>();
    for (mut object, editor) in objects.iter_mut(world) {
        if !is_deleted(editor) && object.id > deleted_id {
            object.id -= 1;
        }
    }
}

/// Id for an object appended after every visible one.
pub fn next_object_id(world: &mut World) -> i32 {
    let mut objects = world.query::<(&MapObject, Option<&EditorObject>)>();
    objects
        .iter(world)
        .filter(|(_, editor)| !is_deleted(*editor))
        .count() as i32
}

/// Ids of the visible objects, sorted.
pub fn visible_object_ids(world: &mut World) -> Vec<i32> {
    let mut objects = world.query::<(&MapObject, Option<&EditorObject>)>();
    let mut ids: Vec<i32> = objects
        .iter(world)
        .filter(|(_, editor)| !is_deleted(*editor))
        .map(|(object, _)| object.id)
        .collect();
    ids.sort_unstable();
    ids
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

pub fn compute_bounds(world: &mut World) -> MapBounds {
    let mut bounds = MapBounds::EMPTY;
    let mut polygons = world.query_filtered::<(&Scene2D, Option<&EditorObject>), With<Polygon>>();
    for (scene, editor) in polygons.iter(world) {
        if is_deleted(editor) {
            continue;
        }
        bounds.include(scene);
    }
    bounds
}

pub fn update_map_bounds(world: &mut World) {
    let bounds = compute_bounds(world);
    if let Some(mut map) = world.get_resource_mut::<Map>() {
        map.bounds = bounds;
    }
}

/// Full rescan whenever any placement or deletion flag changed this frame.
pub(crate) fn refresh_map_bounds(
    changed: Query<(), Or<(Changed<Scene2D>, Changed<EditorObject>)>>,
    polygons: Query<(&Scene2D, Option<&EditorObject>), With<Polygon>>,
    mut map: ResMut<Map>,
) {
    if changed.is_empty() {
        return;
    }
    let mut bounds = MapBounds::EMPTY;
    for (scene, editor) in &polygons {
        if is_deleted(editor) {
            continue;
        }
        bounds.include(scene);
    }
    map.bounds = bounds;
}
