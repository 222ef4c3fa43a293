//! Player list ("roster") updates.
//!
//! The player list item packet keeps one layout from 1.8 to 1.12: a VarInt
//! action, a VarInt entry count, then per entry a UUID followed by the
//! action-specific fields.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::wire::{put_string, put_uuid, put_varint, Reader, MAX_CHAT_LEN};

/// Longest player name a roster entry may carry.
pub const MAX_PLAYER_NAME_LEN: usize = 16;
const MAX_PROPERTY_LEN: usize = 32767;

/// A signed or unsigned game profile property (skin textures, capes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// A full roster entry, as announced by an add action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub uuid: Uuid,
    pub name: String,
    pub properties: Vec<ProfileProperty>,
    pub game_mode: i32,
    pub latency: i32,
    /// Raw chat component JSON.
    pub display_name: Option<String>,
}

impl RosterEntry {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            properties: Vec::new(),
            game_mode: 0,
            latency: 0,
            display_name: None,
        }
    }
}

/// One decoded player list item packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterUpdate {
    Add(Vec<RosterEntry>),
    GameMode(Vec<(Uuid, i32)>),
    Latency(Vec<(Uuid, i32)>),
    DisplayName(Vec<(Uuid, Option<String>)>),
    Remove(Vec<Uuid>),
}

impl RosterUpdate {
    fn action(&self) -> i32 {
        match self {
            Self::Add(_) => 0,
            Self::GameMode(_) => 1,
            Self::Latency(_) => 2,
            Self::DisplayName(_) => 3,
            Self::Remove(_) => 4,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Add(v) => v.len(),
            Self::GameMode(v) | Self::Latency(v) => v.len(),
            Self::DisplayName(v) => v.len(),
            Self::Remove(v) => v.len(),
        }
    }

    /// Every UUID the update mentions.
    pub fn uuids(&self) -> Vec<Uuid> {
        match self {
            Self::Add(v) => v.iter().map(|e| e.uuid).collect(),
            Self::GameMode(v) | Self::Latency(v) => v.iter().map(|(u, _)| *u).collect(),
            Self::DisplayName(v) => v.iter().map(|(u, _)| *u).collect(),
            Self::Remove(v) => v.clone(),
        }
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);
        let action = r.varint("roster action")?;
        let count = r.varint("roster count")?;
        if count < 0 {
            return Err(CodecError::InvalidLength {
                field: "roster count",
                length: i64::from(count),
                limit: i32::MAX as usize,
            });
        }
        let count = count as usize;
        let update = match action {
            0 => {
                let mut entries = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    entries.push(read_entry(&mut r)?);
                }
                Self::Add(entries)
            }
            1 | 2 => {
                let mut values = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    values.push((r.uuid("roster uuid")?, r.varint("roster value")?));
                }
                if action == 1 {
                    Self::GameMode(values)
                } else {
                    Self::Latency(values)
                }
            }
            3 => {
                let mut values = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let uuid = r.uuid("roster uuid")?;
                    values.push((uuid, read_optional_chat(&mut r)?));
                }
                Self::DisplayName(values)
            }
            4 => {
                let mut uuids = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    uuids.push(r.uuid("roster uuid")?);
                }
                Self::Remove(uuids)
            }
            other => return Err(CodecError::UnknownRosterAction(other)),
        };
        Ok(update)
    }

    pub fn encode(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(32);
        put_varint(&mut dst, self.action());
        put_varint(&mut dst, self.len() as i32);
        match self {
            Self::Add(entries) => entries.iter().for_each(|e| write_entry(&mut dst, e)),
            Self::GameMode(values) | Self::Latency(values) => {
                for (uuid, value) in values {
                    put_uuid(&mut dst, uuid);
                    put_varint(&mut dst, *value);
                }
            }
            Self::DisplayName(values) => {
                for (uuid, name) in values {
                    put_uuid(&mut dst, uuid);
                    write_optional_chat(&mut dst, name.as_deref());
                }
            }
            Self::Remove(uuids) => uuids.iter().for_each(|u| put_uuid(&mut dst, u)),
        }
        dst
    }
}

fn read_optional_chat(r: &mut Reader<'_>) -> Result<Option<String>> {
    if r.bool("roster has display name")? {
        Ok(Some(r.string(MAX_CHAT_LEN, "roster display name")?.to_owned()))
    } else {
        Ok(None)
    }
}

fn write_optional_chat(dst: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(json) => {
            dst.put_u8(1);
            put_string(dst, json);
        }
        None => dst.put_u8(0),
    }
}

fn read_entry(r: &mut Reader<'_>) -> Result<RosterEntry> {
    let uuid = r.uuid("roster uuid")?;
    let name = r.string(MAX_PLAYER_NAME_LEN, "roster name")?.to_owned();
    let property_count = r.varint("roster property count")?;
    let mut properties = Vec::with_capacity(property_count.clamp(0, 8) as usize);
    for _ in 0..property_count.max(0) {
        let name = r.string(MAX_PROPERTY_LEN, "property name")?.to_owned();
        let value = r.string(MAX_PROPERTY_LEN, "property value")?.to_owned();
        let signature = if r.bool("property signed")? {
            Some(r.string(MAX_PROPERTY_LEN, "property signature")?.to_owned())
        } else {
            None
        };
        properties.push(ProfileProperty {
            name,
            value,
            signature,
        });
    }
    Ok(RosterEntry {
        uuid,
        name,
        properties,
        game_mode: r.varint("roster game mode")?,
        latency: r.varint("roster latency")?,
        display_name: read_optional_chat(r)?,
    })
}

/// `name` cut to the roster limit, borrowed when it already fits.
pub fn clamp_player_name(name: &str) -> &str {
    match name.char_indices().nth(MAX_PLAYER_NAME_LEN) {
        Some((end, _)) => &name[..end],
        None => name,
    }
}

fn write_entry(dst: &mut BytesMut, entry: &RosterEntry) {
    put_uuid(dst, &entry.uuid);
    put_string(dst, clamp_player_name(&entry.name));
    put_varint(dst, entry.properties.len() as i32);
    for property in &entry.properties {
        put_string(dst, &property.name);
        put_string(dst, &property.value);
        match &property.signature {
            Some(sig) => {
                dst.put_u8(1);
                put_string(dst, sig);
            }
            None => dst.put_u8(0),
        }
    }
    put_varint(dst, entry.game_mode);
    put_varint(dst, entry.latency);
    write_optional_chat(dst, entry.display_name.as_deref());
}
