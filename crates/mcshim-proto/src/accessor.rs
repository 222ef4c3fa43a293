//! Typed field access over version-specific packet layouts.
//!
//! A [`FieldAccessor`] is a thin view over one [`AccessorTable`]. Reads never
//! modify the message. Writes rebuild the body from the untouched prefix, the
//! re-encoded field and the untouched suffix, so length prefixes stay correct
//! and unrelated bytes stay bit-identical.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::item::ItemPayload;
use crate::packet::OutboundMessage;
use crate::roster::{RosterEntry, RosterUpdate};
use crate::tables::{self, AccessorTable, SpawnLayout, WireKind};
use crate::trade::TradeOfferList;
use crate::version::ProtocolVersion;
use crate::wire::{check_string, put_string, Reader, MAX_CHAT_LEN, MAX_PLUGIN_DATA_LEN};

/// Chat position byte for the action bar above the hotbar.
pub const CHAT_POSITION_ACTION_BAR: u8 = 2;
/// Chat position byte for the regular chat box.
pub const CHAT_POSITION_CHAT: u8 = 0;

/// Entity id as sent on the wire.
pub type EntityId = i32;

/// Spatial coordinates of a spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Decoded SetSlot header and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUpdate {
    pub window_id: i8,
    pub slot: i16,
    pub item: ItemPayload,
}

/// Decoded WindowItems contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowContents {
    pub window_id: u8,
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldAccessor<'t> {
    table: &'t AccessorTable,
}

impl FieldAccessor<'static> {
    /// Accessor over the process-wide validated table for `version`.
    pub fn for_version(version: ProtocolVersion) -> Result<Self> {
        tables::table(version).map(FieldAccessor::new)
    }
}

impl<'t> FieldAccessor<'t> {
    pub fn new(table: &'t AccessorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t AccessorTable {
        self.table
    }

    pub fn version(&self) -> ProtocolVersion {
        self.table.version
    }

    /// Wire kind of `msg`, or `None` for packets the shim does not know.
    #[inline]
    pub fn kind_of(&self, msg: &OutboundMessage) -> Option<WireKind> {
        if msg.version() != self.table.version {
            return None;
        }
        self.table.kind_of(msg.id())
    }

    fn ensure_kind(&self, msg: &OutboundMessage, expected: WireKind) -> Result<()> {
        if self.kind_of(msg) == Some(expected) {
            Ok(())
        } else {
            Err(CodecError::WrongKind {
                expected: expected.name(),
                id: msg.id(),
                version: msg.version(),
            })
        }
    }

    fn expect_spawn(&self, msg: &OutboundMessage) -> Result<WireKind> {
        match self.kind_of(msg) {
            Some(kind) if kind.is_spawn() => Ok(kind),
            _ => Err(CodecError::WrongKind {
                expected: "entity spawn",
                id: msg.id(),
                version: msg.version(),
            }),
        }
    }

    fn message(&self, kind: WireKind, body: impl Into<Bytes>) -> OutboundMessage {
        OutboundMessage::new(self.table.version, self.table.id_of(kind), body)
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Raw chat component JSON.
    pub fn read_text(&self, msg: &OutboundMessage) -> Result<String> {
        self.ensure_kind(msg, WireKind::Chat)?;
        let mut r = Reader::new(msg.body());
        Ok(r.string(MAX_CHAT_LEN, "chat component")?.to_owned())
    }

    /// Replace the chat component JSON; the position byte is kept.
    pub fn write_text(&self, msg: &mut OutboundMessage, json: &str) -> Result<()> {
        self.ensure_kind(msg, WireKind::Chat)?;
        check_string(json, MAX_CHAT_LEN, "chat component")?;
        let body = msg.body().clone();
        let mut r = Reader::new(&body);
        r.string(MAX_CHAT_LEN, "chat component")?;
        let suffix = r.position();

        let mut out = BytesMut::with_capacity(json.len() + body.len() - suffix + 5);
        put_string(&mut out, json);
        out.extend_from_slice(&body[suffix..]);
        msg.set_body(out.freeze());
        Ok(())
    }

    /// Chat text with formatting stripped (`text` and `extra` flattened).
    pub fn read_plain_text(&self, msg: &OutboundMessage) -> Result<String> {
        let json = self.read_text(msg)?;
        let value: Value =
            serde_json::from_str(&json).map_err(|e| CodecError::InvalidChat(e.to_string()))?;
        let mut out = String::new();
        flatten_component(&value, &mut out);
        Ok(out)
    }

    /// Replace the chat component with an unformatted text component.
    pub fn write_plain_text(&self, msg: &mut OutboundMessage, text: &str) -> Result<()> {
        self.write_text(msg, &text_component(text))
    }

    /// Chat position byte (0 chat, 1 system, 2 action bar).
    pub fn read_chat_position(&self, msg: &OutboundMessage) -> Result<u8> {
        self.ensure_kind(msg, WireKind::Chat)?;
        let mut r = Reader::new(msg.body());
        r.string(MAX_CHAT_LEN, "chat component")?;
        r.u8("chat position")
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    pub fn read_slot_stack(&self, msg: &OutboundMessage) -> Result<SlotUpdate> {
        self.ensure_kind(msg, WireKind::SetSlot)?;
        let mut r = Reader::new(msg.body());
        Ok(SlotUpdate {
            window_id: r.i8("set slot window")?,
            slot: r.i16("set slot index")?,
            item: ItemPayload::read(&mut r)?,
        })
    }

    pub fn write_slot_stack(&self, msg: &mut OutboundMessage, item: &ItemPayload) -> Result<()> {
        self.ensure_kind(msg, WireKind::SetSlot)?;
        let body = msg.body().clone();
        let mut r = Reader::new(&body);
        r.skip(3, "set slot header")?;
        let prefix = r.position();
        ItemPayload::read(&mut r)?;
        let suffix = r.position();

        let mut out = BytesMut::with_capacity(body.len() + 16);
        out.extend_from_slice(&body[..prefix]);
        item.write(&mut out);
        out.extend_from_slice(&body[suffix..]);
        msg.set_body(out.freeze());
        Ok(())
    }

    pub fn read_window_contents(&self, msg: &OutboundMessage) -> Result<WindowContents> {
        self.ensure_kind(msg, WireKind::WindowItems)?;
        let mut r = Reader::new(msg.body());
        let window_id = r.u8("window items window")?;
        let count = window_count(&mut r)?;
        let items = (0..count)
            .map(|_| ItemPayload::read(&mut r))
            .collect::<Result<Vec<_>>>()?;
        Ok(WindowContents { window_id, items })
    }

    pub fn write_window_contents(
        &self,
        msg: &mut OutboundMessage,
        items: &[ItemPayload],
    ) -> Result<()> {
        self.ensure_kind(msg, WireKind::WindowItems)?;
        if items.len() > i16::MAX as usize {
            return Err(CodecError::InvalidLength {
                field: "window items count",
                length: items.len() as i64,
                limit: i16::MAX as usize,
            });
        }
        let body = msg.body().clone();
        let mut r = Reader::new(&body);
        let window_id = r.u8("window items window")?;
        let count = window_count(&mut r)?;
        for _ in 0..count {
            ItemPayload::read(&mut r)?;
        }
        let suffix = r.position();

        let mut out = BytesMut::with_capacity(body.len() + 16);
        out.put_u8(window_id);
        out.put_i16(items.len() as i16);
        items.iter().for_each(|item| item.write(&mut out));
        out.extend_from_slice(&body[suffix..]);
        msg.set_body(out.freeze());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Entity id of any spawn packet.
    pub fn read_entity_spawn_id(&self, msg: &OutboundMessage) -> Result<EntityId> {
        self.expect_spawn(msg)?;
        Reader::new(msg.body()).varint("spawn entity id")
    }

    /// Entity UUID, where the revision sends one for this spawn kind.
    pub fn read_entity_spawn_uuid(&self, msg: &OutboundMessage) -> Result<Option<Uuid>> {
        let kind = self.expect_spawn(msg)?;
        let has_uuid = match self.table.spawn_layout {
            SpawnLayout::FixedPoint => kind == WireKind::SpawnPlayer,
            SpawnLayout::Double { .. } => kind != WireKind::SpawnExperienceOrb,
        };
        if !has_uuid {
            return Ok(None);
        }
        let mut r = Reader::new(msg.body());
        r.varint("spawn entity id")?;
        Ok(Some(r.uuid("spawn uuid")?))
    }

    pub fn read_spawn_position(&self, msg: &OutboundMessage) -> Result<Position3> {
        let kind = self.expect_spawn(msg)?;
        let mut r = Reader::new(msg.body());
        r.varint("spawn entity id")?;

        match self.table.spawn_layout {
            SpawnLayout::FixedPoint => {
                match kind {
                    WireKind::SpawnPlayer => r.skip(16, "spawn uuid")?,
                    WireKind::SpawnObject | WireKind::SpawnMob => r.skip(1, "spawn type")?,
                    WireKind::SpawnPainting => {
                        return self.read_painting_position(&mut r);
                    }
                    _ => {}
                }
                let x = r.i32("spawn x")?;
                let y = r.i32("spawn y")?;
                let z = r.i32("spawn z")?;
                Ok(Position3 {
                    x: f64::from(x) / 32.0,
                    y: f64::from(y) / 32.0,
                    z: f64::from(z) / 32.0,
                })
            }
            SpawnLayout::Double { varint_mob_type } => {
                if kind != WireKind::SpawnExperienceOrb {
                    r.skip(16, "spawn uuid")?;
                }
                match kind {
                    WireKind::SpawnObject => r.skip(1, "spawn type")?,
                    WireKind::SpawnMob if varint_mob_type => {
                        r.varint("spawn type")?;
                    }
                    WireKind::SpawnMob => r.skip(1, "spawn type")?,
                    WireKind::SpawnPainting => {
                        return self.read_painting_position(&mut r);
                    }
                    _ => {}
                }
                Ok(Position3 {
                    x: r.f64("spawn x")?,
                    y: r.f64("spawn y")?,
                    z: r.f64("spawn z")?,
                })
            }
        }
    }

    fn read_painting_position(&self, r: &mut Reader<'_>) -> Result<Position3> {
        r.string(self.table.painting_title_limit, "painting title")?;
        let pos = r.position_packed("painting position")?;
        Ok(Position3 {
            x: f64::from(pos.x),
            y: f64::from(pos.y),
            z: f64::from(pos.z),
        })
    }

    /// Entity id of an entity metadata packet.
    pub fn read_entity_id(&self, msg: &OutboundMessage) -> Result<EntityId> {
        self.ensure_kind(msg, WireKind::EntityMetadata)?;
        Reader::new(msg.body()).varint("metadata entity id")
    }

    // ------------------------------------------------------------------
    // Sub-channels
    // ------------------------------------------------------------------

    /// Sub-channel name and its data. The message is not modified.
    pub fn read_subchannel(&self, msg: &OutboundMessage) -> Result<(String, Bytes)> {
        self.ensure_kind(msg, WireKind::PluginMessage)?;
        let body = msg.body();
        let mut r = Reader::new(body);
        let name = r.string(self.table.channel_name_limit, "channel name")?.to_owned();
        Ok((name, body.slice(r.position()..)))
    }

    /// Sub-channel name only.
    pub fn read_subchannel_name(&self, msg: &OutboundMessage) -> Result<String> {
        self.ensure_kind(msg, WireKind::PluginMessage)?;
        let mut r = Reader::new(msg.body());
        Ok(r.string(self.table.channel_name_limit, "channel name")?.to_owned())
    }

    /// Replace the sub-channel data, keeping the channel name.
    pub fn write_subchannel(&self, msg: &mut OutboundMessage, data: Bytes) -> Result<()> {
        self.ensure_kind(msg, WireKind::PluginMessage)?;
        if data.len() > MAX_PLUGIN_DATA_LEN {
            return Err(CodecError::InvalidLength {
                field: "channel data",
                length: data.len() as i64,
                limit: MAX_PLUGIN_DATA_LEN,
            });
        }
        let body = msg.body().clone();
        let mut r = Reader::new(&body);
        r.string(self.table.channel_name_limit, "channel name")?;
        let header = r.position();

        let mut out = BytesMut::with_capacity(header + data.len());
        out.extend_from_slice(&body[..header]);
        out.extend_from_slice(&data);
        msg.set_body(out.freeze());
        Ok(())
    }

    pub fn read_trade_offers(&self, msg: &OutboundMessage) -> Result<TradeOfferList> {
        let (_, data) = self.read_subchannel(msg)?;
        TradeOfferList::decode(&data)
    }

    pub fn write_trade_offers(&self, msg: &mut OutboundMessage, list: &TradeOfferList) -> Result<()> {
        self.write_subchannel(msg, list.encode())
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    pub fn read_roster(&self, msg: &OutboundMessage) -> Result<RosterUpdate> {
        self.ensure_kind(msg, WireKind::PlayerInfo)?;
        RosterUpdate::decode(msg.body())
    }

    pub fn write_roster(&self, msg: &mut OutboundMessage, update: &RosterUpdate) -> Result<()> {
        self.ensure_kind(msg, WireKind::PlayerInfo)?;
        msg.set_body(update.encode().freeze());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// A chat packet carrying `json` at `position`.
    pub fn chat(&self, json: &str, position: u8) -> OutboundMessage {
        let mut body = BytesMut::with_capacity(json.len() + 6);
        put_string(&mut body, json);
        body.put_u8(position);
        self.message(WireKind::Chat, body.freeze())
    }

    /// Unformatted text shown above the hotbar.
    pub fn action_bar(&self, text: &str) -> OutboundMessage {
        self.chat(&text_component(text), CHAT_POSITION_ACTION_BAR)
    }

    /// Announce `entries` on the client's roster.
    pub fn roster_add(&self, entries: Vec<RosterEntry>) -> OutboundMessage {
        self.message(WireKind::PlayerInfo, RosterUpdate::Add(entries).encode().freeze())
    }

    /// Withdraw `uuids` from the client's roster.
    pub fn roster_remove(&self, uuids: Vec<Uuid>) -> OutboundMessage {
        self.message(WireKind::PlayerInfo, RosterUpdate::Remove(uuids).encode().freeze())
    }

    /// Destroy entities client-side.
    pub fn destroy_entities(&self, ids: &[EntityId]) -> OutboundMessage {
        let mut body = BytesMut::with_capacity(1 + ids.len() * 2);
        crate::wire::put_varint(&mut body, ids.len() as i32);
        ids.iter().for_each(|id| crate::wire::put_varint(&mut body, *id));
        self.message(WireKind::DestroyEntities, body.freeze())
    }
}

fn window_count(r: &mut Reader<'_>) -> Result<usize> {
    let count = r.i16("window items count")?;
    if count < 0 {
        return Err(CodecError::InvalidLength {
            field: "window items count",
            length: i64::from(count),
            limit: i16::MAX as usize,
        });
    }
    Ok(count as usize)
}

/// JSON text component for a plain string.
pub fn text_component(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

fn flatten_component(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|p| flatten_component(p, out)),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                extra.iter().for_each(|p| flatten_component(p, out));
            }
        }
        _ => {}
    }
}
