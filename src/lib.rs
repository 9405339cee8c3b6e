pub mod commands;
pub mod editor;
pub mod level_io;
pub mod linked;
pub mod map;
pub mod objects;
pub mod physics;
pub mod play;
pub mod scene2d;

use bevy::prelude::*;

/// Whether the world is being edited or played.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameMode {
    #[default]
    Editor,
    Play,
}

/// Game and level editor logic.
///
/// Rendering, input and the avian `PhysicsPlugins` are left to the host app;
/// this plugin only keeps the map, the edit history and the body requests
/// consistent.
pub struct GravityBoxPlugin;

impl Plugin for GravityBoxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameMode>()
            .init_resource::<map::Map>()
            .init_resource::<linked::Respawned>()
            .add_plugins((
                commands::CommandHistoryPlugin,
                level_io::LevelIoPlugin,
                physics::PhysicsBridgePlugin,
                play::PlayPlugin,
            ))
            .add_systems(
                Update,
                (
                    objects::update_dashed_lines.run_if(resource_equals(GameMode::Editor)),
                    map::refresh_map_bounds,
                ),
            );
    }
}

/// Resources the core functions expect, for worlds built without an [`App`].
pub fn insert_core_resources(world: &mut World) {
    world.init_resource::<GameMode>();
    world.init_resource::<map::Map>();
    world.init_resource::<linked::Respawned>();
    world.init_resource::<commands::MapHistory>();
    world.init_resource::<play::LevelState>();
}
