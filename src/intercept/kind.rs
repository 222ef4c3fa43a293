//! Closed classification of outbound messages.

use mcshim_proto::TRADE_LIST_CHANNEL;
use std::collections::HashSet;
use std::fmt;

/// Which spawn packet announced an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnKind {
    /// A player (real or synthetic).
    Named,
    /// Vehicles, projectiles, falling blocks, item drops.
    Object,
    Living,
    Painting,
    ExperienceOrb,
}

/// A recognized plugin message channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubChannel {
    /// `MC|TrList`, the villager trade offer list.
    TradeOfferList,
    /// A channel enabled through `intercept.extra_channels`.
    Named(String),
}

impl SubChannel {
    pub fn name(&self) -> &str {
        match self {
            Self::TradeOfferList => TRADE_LIST_CHANNEL,
            Self::Named(name) => name,
        }
    }
}

/// What an outbound message is, as far as interception is concerned.
///
/// `Other` is the default; those messages are forwarded without dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum InterceptKind {
    Chat,
    EntitySpawn(SpawnKind),
    EntityMetadata,
    SetSlot,
    WindowItems,
    CustomPayload(SubChannel),
    /// Player list updates.
    Roster,
    #[default]
    Other,
}

/// Payload-free discriminant of [`InterceptKind`], for filters and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Chat,
    EntitySpawn,
    EntityMetadata,
    SetSlot,
    WindowItems,
    CustomPayload,
    Roster,
    Other,
}

impl KindTag {
    /// Static label for metrics and logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::EntitySpawn => "entity_spawn",
            Self::EntityMetadata => "entity_metadata",
            Self::SetSlot => "set_slot",
            Self::WindowItems => "window_items",
            Self::CustomPayload => "custom_payload",
            Self::Roster => "roster",
            Self::Other => "other",
        }
    }
}

impl InterceptKind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Chat => KindTag::Chat,
            Self::EntitySpawn(_) => KindTag::EntitySpawn,
            Self::EntityMetadata => KindTag::EntityMetadata,
            Self::SetSlot => KindTag::SetSlot,
            Self::WindowItems => KindTag::WindowItems,
            Self::CustomPayload(_) => KindTag::CustomPayload,
            Self::Roster => KindTag::Roster,
            Self::Other => KindTag::Other,
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.tag().label()
    }

    /// The channel of a `CustomPayload`.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::CustomPayload(sub) => Some(sub.name()),
            _ => None,
        }
    }
}

impl fmt::Display for InterceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntitySpawn(sub) => write!(f, "entity_spawn({sub:?})"),
            Self::CustomPayload(sub) => write!(f, "custom_payload({})", sub.name()),
            other => f.write_str(other.label()),
        }
    }
}

/// Which messages a handler wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindFilter {
    /// Every dispatched message.
    Any,
    /// Messages whose kind discriminant is in the set.
    Kinds(HashSet<KindTag>),
    /// Plugin messages on one channel.
    Channel(String),
}

impl KindFilter {
    pub fn kinds(tags: impl IntoIterator<Item = KindTag>) -> Self {
        Self::Kinds(tags.into_iter().collect())
    }

    pub fn only(tag: KindTag) -> Self {
        Self::kinds([tag])
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::Channel(name.into())
    }

    pub fn matches(&self, kind: &InterceptKind) -> bool {
        match self {
            Self::Any => true,
            Self::Kinds(tags) => tags.contains(&kind.tag()),
            Self::Channel(name) => kind.channel() == Some(name.as_str()),
        }
    }
}
