//! Named, non-owning references between entities.
//!
//! A moving platform and its editor-only mock target are separate entities.
//! They find each other through these links, never through stored ownership,
//! so either side can be despawned without leaving a dangling handle behind:
//! a lookup simply stops resolving.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkRole {
    /// From a mock target to the real platform.
    Platform,
    /// From a moving platform to its mock target.
    MockPlatform,
    /// From a platform or its mock to the dashed line joining them.
    DashedLine,
}

impl LinkRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::MockPlatform => "mockPlatform",
            Self::DashedLine => "dashedLine",
        }
    }
}

#[derive(Component, Clone, Debug, Default)]
pub struct LinkedEntities {
    links: HashMap<LinkRole, Entity>,
}

impl LinkedEntities {
    pub fn add(&mut self, role: LinkRole, target: Entity) {
        self.links.insert(role, target);
    }

    pub fn get(&self, role: LinkRole) -> Option<Entity> {
        self.links.get(&role).copied()
    }

    pub fn remove(&mut self, role: LinkRole) -> Option<Entity> {
        self.links.remove(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

pub fn link(world: &mut World, owner: Entity, role: LinkRole, target: Entity) {
    let Ok(mut owner) = world.get_entity_mut(owner) else {
        return;
    };
    match owner.get_mut::<LinkedEntities>() {
        Some(mut links) => links.add(role, target),
        None => {
            let mut links = LinkedEntities::default();
            links.add(role, target);
            owner.insert(links);
        }
    }
}

/// The live entity linked from `owner` under `role`.
pub fn linked(world: &World, owner: Entity, role: LinkRole) -> Option<Entity> {
    let target = world.get::<LinkedEntities>(owner)?.get(role)?;
    world.get_entity(target).is_ok().then_some(target)
}

/// Drops every link held by `owner`.
pub fn unlink_all(world: &mut World, owner: Entity) {
    if let Ok(mut owner) = world.get_entity_mut(owner) {
        owner.remove::<LinkedEntities>();
    }
}

// ---------------------------------------------------------------------------
// Respawned helper entities
// ---------------------------------------------------------------------------

/// Replacement entities for helpers that were despawned and re-created by
/// undo/redo. Older commands still hold the despawned id and resolve it here.
#[derive(Resource, Default, Debug)]
pub struct Respawned {
    replacements: HashMap<Entity, Entity>,
}

impl Respawned {
    pub fn clear(&mut self) {
        self.replacements.clear();
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Keeps only the records some entity in `referenced` resolves through.
    pub fn retain_reachable(&mut self, referenced: impl IntoIterator<Item = Entity>) {
        let mut reachable = HashSet::new();
        for entity in referenced {
            let mut current = entity;
            while let Some(&next) = self.replacements.get(&current) {
                if !reachable.insert(current) {
                    break;
                }
                current = next;
            }
        }
        self.replacements.retain(|old, _| reachable.contains(old));
    }
}

pub fn record_respawn(world: &mut World, old: Entity, new: Entity) {
    if old == new {
        return;
    }
    world
        .get_resource_or_init::<Respawned>()
        .replacements
        .insert(old, new);
}

/// Follows replacements until reaching an entity that was not re-created.
pub fn resolve(world: &World, entity: Entity) -> Entity {
    let Some(respawned) = world.get_resource::<Respawned>() else {
        return entity;
    };
    let mut current = entity;
    // A chain can never be longer than the number of recorded replacements.
    for _ in 0..=respawned.replacements.len() {
        match respawned.replacements.get(&current) {
            Some(&next) => current = next,
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_resolve_only_to_live_entities() {
        let mut world = World::new();
        let platform = world.spawn_empty().id();
        let mock = world.spawn_empty().id();
        link(&mut world, platform, LinkRole::MockPlatform, mock);
        link(&mut world, mock, LinkRole::Platform, platform);

        assert_eq!(linked(&world, platform, LinkRole::MockPlatform), Some(mock));
        assert_eq!(linked(&world, mock, LinkRole::Platform), Some(platform));
        assert_eq!(linked(&world, platform, LinkRole::DashedLine), None);

        world.despawn(mock);
        assert_eq!(linked(&world, platform, LinkRole::MockPlatform), None);
    }

    #[test]
    fn unlink_all_clears_every_role() {
        let mut world = World::new();
        let platform = world.spawn_empty().id();
        let mock = world.spawn_empty().id();
        let line = world.spawn_empty().id();
        link(&mut world, platform, LinkRole::MockPlatform, mock);
        link(&mut world, platform, LinkRole::DashedLine, line);

        unlink_all(&mut world, platform);
        assert!(world.get::<LinkedEntities>(platform).is_none());
        assert_eq!(linked(&world, platform, LinkRole::DashedLine), None);
    }

    #[test]
    fn resolve_follows_replacement_chains() {
        let mut world = World::new();
        let first = world.spawn_empty().id();
        let second = world.spawn_empty().id();
        let third = world.spawn_empty().id();
        assert_eq!(resolve(&world, first), first);

        record_respawn(&mut world, first, second);
        record_respawn(&mut world, second, third);
        assert_eq!(resolve(&world, first), third);
        assert_eq!(resolve(&world, third), third);

        world.resource_mut::<Respawned>().clear();
        assert_eq!(resolve(&world, first), first);
    }

    #[test]
    fn only_reachable_replacements_are_retained() {
        let mut world = World::new();
        let [first, second, third, other, other_new] =
            [(); 5].map(|_| world.spawn_empty().id());
        record_respawn(&mut world, first, second);
        record_respawn(&mut world, second, third);
        record_respawn(&mut world, other, other_new);

        world.resource_mut::<Respawned>().retain_reachable([second]);
        assert_eq!(world.resource::<Respawned>().len(), 1);
        assert_eq!(resolve(&world, second), third);
        assert_eq!(resolve(&world, first), first);
        assert_eq!(resolve(&world, other), other);

        world.resource_mut::<Respawned>().retain_reachable([]);
        assert!(world.resource::<Respawned>().is_empty());
    }

    #[test]
    fn role_names() {
        assert_eq!(LinkRole::MockPlatform.as_str(), "mockPlatform");
        assert_eq!(LinkRole::DashedLine.as_str(), "dashedLine");
    }
}
