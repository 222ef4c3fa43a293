//! Maps outbound messages to an [`InterceptKind`].
//!
//! Classification is a pure function of the packet id (through the
//! version's accessor table) and, for plugin messages, the channel name. It
//! never looks at slot or entity contents.

use mcshim_proto::{FieldAccessor, OutboundMessage, TRADE_LIST_CHANNEL, WireKind};
use std::collections::HashSet;
use tracing::debug;

use super::kind::{InterceptKind, SpawnKind, SubChannel};

/// Classifies outbound messages.
#[derive(Debug, Clone, Default)]
pub struct MessageClassifier {
    extra_channels: HashSet<String>,
}

impl MessageClassifier {
    /// Classifier dispatching the trade list plus `extra_channels`.
    pub fn new(extra_channels: impl IntoIterator<Item = String>) -> Self {
        Self {
            extra_channels: extra_channels.into_iter().collect(),
        }
    }

    /// Classify `msg`. Total: anything unknown or malformed is `Other`.
    pub fn classify(&self, msg: &OutboundMessage) -> InterceptKind {
        let Ok(accessor) = FieldAccessor::for_version(msg.version()) else {
            return InterceptKind::Other;
        };
        self.classify_with(&accessor, msg)
    }

    /// Classify with an accessor the caller already holds.
    pub fn classify_with(&self, accessor: &FieldAccessor<'_>, msg: &OutboundMessage) -> InterceptKind {
        let Some(wire) = accessor.kind_of(msg) else {
            return InterceptKind::Other;
        };
        match wire {
            WireKind::Chat => InterceptKind::Chat,
            WireKind::SpawnPlayer => InterceptKind::EntitySpawn(SpawnKind::Named),
            WireKind::SpawnObject => InterceptKind::EntitySpawn(SpawnKind::Object),
            WireKind::SpawnMob => InterceptKind::EntitySpawn(SpawnKind::Living),
            WireKind::SpawnPainting => InterceptKind::EntitySpawn(SpawnKind::Painting),
            WireKind::SpawnExperienceOrb => InterceptKind::EntitySpawn(SpawnKind::ExperienceOrb),
            WireKind::EntityMetadata => InterceptKind::EntityMetadata,
            WireKind::SetSlot => InterceptKind::SetSlot,
            WireKind::WindowItems => InterceptKind::WindowItems,
            WireKind::PluginMessage => self.classify_channel(accessor, msg),
            WireKind::PlayerInfo => InterceptKind::Roster,
            WireKind::DestroyEntities => InterceptKind::Other,
        }
    }

    fn classify_channel(&self, accessor: &FieldAccessor<'_>, msg: &OutboundMessage) -> InterceptKind {
        match accessor.read_subchannel_name(msg) {
            Ok(name) if name == TRADE_LIST_CHANNEL => {
                InterceptKind::CustomPayload(SubChannel::TradeOfferList)
            }
            Ok(name) if self.extra_channels.contains(&name) => {
                InterceptKind::CustomPayload(SubChannel::Named(name))
            }
            Ok(_) => InterceptKind::Other,
            Err(e) => {
                debug!(error = %e, "Malformed plugin message");
                crate::metrics::record_codec_error(e.error_code());
                InterceptKind::Other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, Bytes, BytesMut};
    use mcshim_proto::wire::put_string;
    use mcshim_proto::{ProtocolVersion, tables};

    fn plugin(version: ProtocolVersion, id: i32, channel: &str) -> OutboundMessage {
        let mut body = BytesMut::new();
        put_string(&mut body, channel);
        body.put_u8(1);
        OutboundMessage::new(version, id, body.freeze())
    }

    #[test]
    fn test_ids_per_version() {
        tables::init().unwrap();
        let classifier = MessageClassifier::default();
        let cases = [
            (ProtocolVersion::V1_8_R3, 0x02, InterceptKind::Chat),
            (ProtocolVersion::V1_8_R3, 0x0C, InterceptKind::EntitySpawn(SpawnKind::Named)),
            (ProtocolVersion::V1_8_R3, 0x2F, InterceptKind::SetSlot),
            (ProtocolVersion::V1_8_R3, 0x38, InterceptKind::Roster),
            (ProtocolVersion::V1_9_R2, 0x0F, InterceptKind::Chat),
            (ProtocolVersion::V1_9_R2, 0x00, InterceptKind::EntitySpawn(SpawnKind::Object)),
            (ProtocolVersion::V1_9_R2, 0x14, InterceptKind::WindowItems),
            (ProtocolVersion::V1_12_R1, 0x03, InterceptKind::EntitySpawn(SpawnKind::Living)),
            (ProtocolVersion::V1_12_R1, 0x3C, InterceptKind::EntityMetadata),
            (ProtocolVersion::V1_12_R1, 0x2E, InterceptKind::Roster),
        ];
        for (version, id, expected) in cases {
            let msg = OutboundMessage::new(version, id, Bytes::new());
            assert_eq!(classifier.classify(&msg), expected, "{version} id {id:#04x}");
        }
    }

    #[test]
    fn test_unknown_and_destroy_are_other() {
        tables::init().unwrap();
        let classifier = MessageClassifier::default();
        // keep-alive in 1.8
        let msg = OutboundMessage::new(ProtocolVersion::V1_8_R3, 0x00, Bytes::new());
        assert_eq!(classifier.classify(&msg), InterceptKind::Other);
        let msg = OutboundMessage::new(ProtocolVersion::V1_8_R3, 0x13, Bytes::new());
        assert_eq!(classifier.classify(&msg), InterceptKind::Other);
    }

    #[test]
    fn test_channels() {
        tables::init().unwrap();
        let classifier = MessageClassifier::new(["WECUI".to_string()]);
        let v = ProtocolVersion::V1_8_R3;

        assert_eq!(
            classifier.classify(&plugin(v, 0x3F, TRADE_LIST_CHANNEL)),
            InterceptKind::CustomPayload(SubChannel::TradeOfferList)
        );
        assert_eq!(
            classifier.classify(&plugin(v, 0x3F, "WECUI")),
            InterceptKind::CustomPayload(SubChannel::Named("WECUI".into()))
        );
        assert_eq!(classifier.classify(&plugin(v, 0x3F, "MC|Brand")), InterceptKind::Other);
    }

    #[test]
    fn test_malformed_plugin_message_is_other() {
        tables::init().unwrap();
        let classifier = MessageClassifier::default();
        let msg = OutboundMessage::new(
            ProtocolVersion::V1_12_R1,
            0x18,
            Bytes::from_static(&[0x40, b'M']),
        );
        assert_eq!(classifier.classify(&msg), InterceptKind::Other);
    }
}
