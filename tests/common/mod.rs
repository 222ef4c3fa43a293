//! Integration test common infrastructure.
//!
//! Provides an in-process harness wrapping one proxied connection, plus
//! framed peers for driving the relay over real sockets.

pub mod peer;

#[allow(unused_imports)]
pub use peer::FramedPeer;

use bytes::{BufMut, BytesMut};
use mcshim::intercept::HandlerRegistry;
use mcshim::proxy::{Connection, ConnectionInfo, ConnectionProxy, EntityTable, ProfileOverrides, ProxyDeps};
use mcshim::scheduler::{DeferredTaskScheduler, TickDriver};
use mcshim_proto::wire::{put_string, put_uuid, put_varint};
use mcshim_proto::{FieldAccessor, ItemPayload, OutboundMessage, ProtocolVersion, WireKind, tables};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[allow(dead_code)]
pub const VIEWER: Uuid = Uuid::from_u128(0x5EE5);

/// One connection with an installed proxy whose send path is a channel.
#[allow(dead_code)]
pub struct Harness {
    pub registry: Arc<HandlerRegistry>,
    pub entities: Arc<EntityTable>,
    pub profiles: Arc<ProfileOverrides>,
    pub driver: TickDriver,
    pub conn: Connection,
    pub proxy: Arc<ConnectionProxy>,
    pub acc: FieldAccessor<'static>,
    rx: mpsc::Receiver<OutboundMessage>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_queue(version, 64)
    }

    pub fn with_queue(version: ProtocolVersion, capacity: usize) -> Self {
        tables::init().expect("built-in tables");
        let registry = Arc::new(HandlerRegistry::new());
        let entities = Arc::new(EntityTable::new());
        let profiles = Arc::new(ProfileOverrides::new());
        let (scheduler, driver) = DeferredTaskScheduler::new();

        let (tx, rx) = mpsc::channel(capacity);
        let info = ConnectionInfo::new(7, version, VIEWER, "Viewer");
        let conn = Connection::new(info, Arc::new(tx));
        let deps = ProxyDeps::new(Arc::clone(&registry), scheduler)
            .with_directory(entities.clone())
            .with_profiles(Arc::clone(&profiles));
        let proxy = ConnectionProxy::install(&conn, deps).expect("first install");

        Self {
            registry,
            entities,
            profiles,
            driver,
            conn,
            proxy,
            acc: FieldAccessor::for_version(version).expect("table present"),
            rx,
        }
    }

    /// Everything forwarded to the original send path so far.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn id_of(&self, kind: WireKind) -> i32 {
        self.acc.table().id_of(kind)
    }

    /// A SetSlot for the player inventory holding `item`.
    pub fn set_slot(&self, slot: i16, item: ItemPayload) -> OutboundMessage {
        let mut body = BytesMut::new();
        body.put_i8(0);
        body.put_i16(slot);
        item.write(&mut body);
        OutboundMessage::new(self.acc.version(), self.id_of(WireKind::SetSlot), body.freeze())
    }

    /// A plugin message on `channel`.
    pub fn plugin_message(&self, channel: &str, data: &[u8]) -> OutboundMessage {
        let mut body = BytesMut::new();
        put_string(&mut body, channel);
        body.put_slice(data);
        OutboundMessage::new(self.acc.version(), self.id_of(WireKind::PluginMessage), body.freeze())
    }

    /// A named-entity spawn in the modern (1.9+) layout.
    pub fn spawn_player(&self, entity_id: i32, uuid: Uuid) -> OutboundMessage {
        assert_ne!(self.acc.version(), ProtocolVersion::V1_8_R3, "modern layout only");
        let mut body = BytesMut::new();
        put_varint(&mut body, entity_id);
        put_uuid(&mut body, &uuid);
        body.put_f64(0.5);
        body.put_f64(64.0);
        body.put_f64(0.5);
        body.put_slice(&[0, 0, 0xFF]);
        OutboundMessage::new(self.acc.version(), self.id_of(WireKind::SpawnPlayer), body.freeze())
    }
}
