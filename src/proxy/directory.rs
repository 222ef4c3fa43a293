//! Entity visibility and synthetic player lookup.

use dashmap::DashMap;
use mcshim_proto::{EntityId, RosterEntry};
use std::collections::HashSet;
use uuid::Uuid;

/// What the proxy needs to know about entities it sees spawning.
///
/// Implemented by the embedding server's object model; [`EntityTable`] is
/// the in-memory default.
pub trait EntityDirectory: Send + Sync {
    /// Roster profile of a server-side-only player entity, if `entity_id`
    /// is one. The client must know the profile before the spawn arrives.
    fn synthetic_profile(&self, entity_id: EntityId) -> Option<RosterEntry>;

    /// Whether `entity_id` must not be shown to `viewer`.
    fn is_hidden(&self, viewer: Uuid, entity_id: EntityId) -> bool;
}

/// In-memory [`EntityDirectory`].
#[derive(Debug, Default)]
pub struct EntityTable {
    synthetic: DashMap<EntityId, RosterEntry>,
    hidden: DashMap<Uuid, HashSet<EntityId>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `entity_id` as a synthetic player announced with `profile`.
    pub fn register_synthetic(&self, entity_id: EntityId, profile: RosterEntry) -> Option<RosterEntry> {
        self.synthetic.insert(entity_id, profile)
    }

    pub fn remove_synthetic(&self, entity_id: EntityId) -> Option<RosterEntry> {
        self.synthetic.remove(&entity_id).map(|(_, profile)| profile)
    }

    /// Hide `entity_id` from `viewer`. Returns false if it already was.
    pub fn hide(&self, viewer: Uuid, entity_id: EntityId) -> bool {
        self.hidden.entry(viewer).or_default().insert(entity_id)
    }

    /// Show `entity_id` to `viewer` again. Returns false if it was not hidden.
    pub fn show(&self, viewer: Uuid, entity_id: EntityId) -> bool {
        let Some(mut set) = self.hidden.get_mut(&viewer) else {
            return false;
        };
        let removed = set.remove(&entity_id);
        let empty = set.is_empty();
        drop(set);
        if empty {
            self.hidden.remove_if(&viewer, |_, set| set.is_empty());
        }
        removed
    }

    /// Drop every rule for a viewer that left.
    pub fn forget_viewer(&self, viewer: Uuid) {
        self.hidden.remove(&viewer);
    }

    /// Drop every rule mentioning an entity that despawned.
    pub fn remove_entity(&self, entity_id: EntityId) {
        self.synthetic.remove(&entity_id);
        self.hidden.iter_mut().for_each(|mut set| {
            set.remove(&entity_id);
        });
        self.hidden.retain(|_, set| !set.is_empty());
    }
}

impl EntityDirectory for EntityTable {
    fn synthetic_profile(&self, entity_id: EntityId) -> Option<RosterEntry> {
        self.synthetic.get(&entity_id).map(|entry| entry.value().clone())
    }

    fn is_hidden(&self, viewer: Uuid, entity_id: EntityId) -> bool {
        self.hidden
            .get(&viewer)
            .is_some_and(|set| set.contains(&entity_id))
    }
}
