//! Per-player profile overrides applied to roster updates.
//!
//! Lets the server show a player under another name, skin or tab-list
//! display name without touching the real profile.

use dashmap::DashMap;
use mcshim_proto::roster::clamp_player_name;
use mcshim_proto::{ProfileProperty, RosterUpdate};
use uuid::Uuid;

/// Replacement profile fields; `None` keeps the server's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOverride {
    pub name: Option<String>,
    /// Replaces all properties (typically `textures`).
    pub properties: Option<Vec<ProfileProperty>>,
    /// Raw chat component JSON for the tab list.
    pub display_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProfileOverrides {
    overrides: DashMap<Uuid, ProfileOverride>,
}

impl ProfileOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, uuid: Uuid, profile: ProfileOverride) -> Option<ProfileOverride> {
        self.overrides.insert(uuid, profile)
    }

    pub fn clear(&self, uuid: Uuid) -> Option<ProfileOverride> {
        self.overrides.remove(&uuid).map(|(_, profile)| profile)
    }

    pub fn get(&self, uuid: Uuid) -> Option<ProfileOverride> {
        self.overrides.get(&uuid).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Rewrite `update` in place. Returns whether anything changed.
    pub fn apply(&self, update: &mut RosterUpdate) -> bool {
        let mut changed = false;
        match update {
            RosterUpdate::Add(entries) => {
                for entry in entries.iter_mut() {
                    let Some(profile) = self.overrides.get(&entry.uuid) else {
                        continue;
                    };
                    if let Some(name) = &profile.name {
                        entry.name = clamp_player_name(name).to_owned();
                        changed = true;
                    }
                    if let Some(properties) = &profile.properties {
                        entry.properties = properties.clone();
                        changed = true;
                    }
                    if let Some(display) = &profile.display_name {
                        entry.display_name = Some(display.clone());
                        changed = true;
                    }
                }
            }
            RosterUpdate::DisplayName(entries) => {
                for (uuid, display) in entries.iter_mut() {
                    if let Some(profile) = self.overrides.get(uuid)
                        && let Some(name) = &profile.display_name
                    {
                        *display = Some(name.clone());
                        changed = true;
                    }
                }
            }
            RosterUpdate::GameMode(_) | RosterUpdate::Latency(_) | RosterUpdate::Remove(_) => {}
        }
        changed
    }
}
