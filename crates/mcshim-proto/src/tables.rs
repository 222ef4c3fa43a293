//! Per-version accessor tables.
//!
//! Each supported revision declares, explicitly, the packet id of every wire
//! kind the shim touches and the layout details that differ between
//! revisions. The tables are built and validated once by [`init`] and are
//! read-only for the rest of the process.

use std::sync::OnceLock;

use crate::error::{CodecError, Result};
use crate::version::ProtocolVersion;

/// Clientbound packets the shim knows by layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Chat,
    SpawnPlayer,
    SpawnObject,
    SpawnMob,
    SpawnPainting,
    SpawnExperienceOrb,
    EntityMetadata,
    SetSlot,
    WindowItems,
    PluginMessage,
    PlayerInfo,
    DestroyEntities,
}

impl WireKind {
    pub const ALL: [WireKind; 12] = [
        Self::Chat,
        Self::SpawnPlayer,
        Self::SpawnObject,
        Self::SpawnMob,
        Self::SpawnPainting,
        Self::SpawnExperienceOrb,
        Self::EntityMetadata,
        Self::SetSlot,
        Self::WindowItems,
        Self::PluginMessage,
        Self::PlayerInfo,
        Self::DestroyEntities,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::SpawnPlayer => "spawn_player",
            Self::SpawnObject => "spawn_object",
            Self::SpawnMob => "spawn_mob",
            Self::SpawnPainting => "spawn_painting",
            Self::SpawnExperienceOrb => "spawn_experience_orb",
            Self::EntityMetadata => "entity_metadata",
            Self::SetSlot => "set_slot",
            Self::WindowItems => "window_items",
            Self::PluginMessage => "plugin_message",
            Self::PlayerInfo => "player_info",
            Self::DestroyEntities => "destroy_entities",
        }
    }

    pub const fn is_spawn(self) -> bool {
        matches!(
            self,
            Self::SpawnPlayer
                | Self::SpawnObject
                | Self::SpawnMob
                | Self::SpawnPainting
                | Self::SpawnExperienceOrb
        )
    }
}

/// How spawn packets lay out identity and coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnLayout {
    /// 1.8: no UUIDs except on players, fixed-point int coordinates (1/32).
    FixedPoint,
    /// 1.9+: UUIDs on everything but orbs, double coordinates.
    Double {
        /// Mob type became a VarInt in 1.11.
        varint_mob_type: bool,
    },
}

/// Everything that differs between protocol revisions for the fields the shim
/// reads and writes.
#[derive(Debug, Clone)]
pub struct AccessorTable {
    pub version: ProtocolVersion,
    ids: [(WireKind, i32); 12],
    lookup: [Option<WireKind>; 128],
    pub spawn_layout: SpawnLayout,
    /// Character limit of sub-channel names.
    pub channel_name_limit: usize,
    /// Character limit of painting titles.
    pub painting_title_limit: usize,
}

const V1_8_R3_IDS: [(WireKind, i32); 12] = [
    (WireKind::Chat, 0x02),
    (WireKind::SpawnPlayer, 0x0C),
    (WireKind::SpawnObject, 0x0E),
    (WireKind::SpawnMob, 0x0F),
    (WireKind::SpawnPainting, 0x10),
    (WireKind::SpawnExperienceOrb, 0x11),
    (WireKind::DestroyEntities, 0x13),
    (WireKind::EntityMetadata, 0x1C),
    (WireKind::SetSlot, 0x2F),
    (WireKind::WindowItems, 0x30),
    (WireKind::PlayerInfo, 0x38),
    (WireKind::PluginMessage, 0x3F),
];

const V1_9_R2_IDS: [(WireKind, i32); 12] = [
    (WireKind::SpawnObject, 0x00),
    (WireKind::SpawnExperienceOrb, 0x01),
    (WireKind::SpawnMob, 0x03),
    (WireKind::SpawnPainting, 0x04),
    (WireKind::SpawnPlayer, 0x05),
    (WireKind::Chat, 0x0F),
    (WireKind::WindowItems, 0x14),
    (WireKind::SetSlot, 0x16),
    (WireKind::PluginMessage, 0x18),
    (WireKind::PlayerInfo, 0x2D),
    (WireKind::DestroyEntities, 0x30),
    (WireKind::EntityMetadata, 0x39),
];

const V1_12_R1_IDS: [(WireKind, i32); 12] = [
    (WireKind::SpawnObject, 0x00),
    (WireKind::SpawnExperienceOrb, 0x01),
    (WireKind::SpawnMob, 0x03),
    (WireKind::SpawnPainting, 0x04),
    (WireKind::SpawnPlayer, 0x05),
    (WireKind::Chat, 0x0F),
    (WireKind::WindowItems, 0x14),
    (WireKind::SetSlot, 0x16),
    (WireKind::PluginMessage, 0x18),
    (WireKind::PlayerInfo, 0x2E),
    (WireKind::DestroyEntities, 0x32),
    (WireKind::EntityMetadata, 0x3C),
];

impl AccessorTable {
    /// Build and validate a table from an explicit id list.
    pub fn build(
        version: ProtocolVersion,
        ids: [(WireKind, i32); 12],
        spawn_layout: SpawnLayout,
    ) -> Result<Self> {
        let invalid = |reason: String| CodecError::IncompleteTable { version, reason };

        let mut lookup: [Option<WireKind>; 128] = [None; 128];
        for (kind, id) in ids {
            if !(0..128).contains(&id) {
                return Err(invalid(format!("{} has out-of-range id 0x{id:X}", kind.name())));
            }
            if let Some(existing) = lookup[id as usize] {
                return Err(invalid(format!(
                    "{} and {} share id 0x{id:02X}",
                    existing.name(),
                    kind.name()
                )));
            }
            lookup[id as usize] = Some(kind);
        }
        for kind in WireKind::ALL {
            if !ids.iter().any(|(k, _)| *k == kind) {
                return Err(invalid(format!("missing id for {}", kind.name())));
            }
        }

        Ok(Self {
            version,
            ids,
            lookup,
            spawn_layout,
            channel_name_limit: 20,
            painting_title_limit: 13,
        })
    }

    /// The built-in table for a revision.
    pub fn for_version(version: ProtocolVersion) -> Result<Self> {
        match version {
            ProtocolVersion::V1_8_R3 => {
                Self::build(version, V1_8_R3_IDS, SpawnLayout::FixedPoint)
            }
            ProtocolVersion::V1_9_R2 => Self::build(
                version,
                V1_9_R2_IDS,
                SpawnLayout::Double {
                    varint_mob_type: false,
                },
            ),
            ProtocolVersion::V1_12_R1 => Self::build(
                version,
                V1_12_R1_IDS,
                SpawnLayout::Double {
                    varint_mob_type: true,
                },
            ),
        }
    }

    /// Wire kind for a packet id, if the shim knows it.
    #[inline]
    pub fn kind_of(&self, id: i32) -> Option<WireKind> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.lookup.get(i).copied().flatten())
    }

    /// Packet id of a wire kind.
    pub fn id_of(&self, kind: WireKind) -> i32 {
        // Completeness is checked in build().
        self.ids
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(-1, |(_, id)| *id)
    }
}

static TABLES: OnceLock<[AccessorTable; 3]> = OnceLock::new();

/// Build and validate every supported table. Call once at startup, before
/// any connection exists; later calls return the already-built tables.
pub fn init() -> Result<&'static [AccessorTable; 3]> {
    if let Some(tables) = TABLES.get() {
        return Ok(tables);
    }
    let built = [
        AccessorTable::for_version(ProtocolVersion::V1_8_R3)?,
        AccessorTable::for_version(ProtocolVersion::V1_9_R2)?,
        AccessorTable::for_version(ProtocolVersion::V1_12_R1)?,
    ];
    Ok(TABLES.get_or_init(|| built))
}

/// The validated table for `version`.
pub fn table(version: ProtocolVersion) -> Result<&'static AccessorTable> {
    TABLES
        .get()
        .map(|tables| &tables[version.index()])
        .ok_or(CodecError::TablesNotInitialized)
}
