//! The outbound message type handed through the interception layer.

use bytes::{Bytes, BytesMut};
use std::fmt;

use crate::error::Result;
use crate::version::ProtocolVersion;
use crate::wire::{put_varint, varint_len, Reader};

/// One clientbound packet, decoded only as far as its id.
///
/// The body is kept as shared bytes so cloning a message is cheap and an
/// untouched message forwards bit-identical.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    version: ProtocolVersion,
    id: i32,
    body: Bytes,
}

impl OutboundMessage {
    pub fn new(version: ProtocolVersion, id: i32, body: impl Into<Bytes>) -> Self {
        Self {
            version,
            id,
            body: body.into(),
        }
    }

    /// Split a frame payload (`VarInt id ++ body`) into a message.
    pub fn decode(version: ProtocolVersion, frame: Bytes) -> Result<Self> {
        let mut reader = Reader::new(&frame);
        let id = reader.varint("packet id")?;
        let header = reader.position();
        Ok(Self {
            version,
            id,
            body: frame.slice(header..),
        })
    }

    /// Append the frame payload (`VarInt id ++ body`) to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        put_varint(dst, self.id);
        dst.extend_from_slice(&self.body);
    }

    /// Length of the frame payload.
    pub fn encoded_len(&self) -> usize {
        varint_len(self.id) + self.body.len()
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }
}

impl fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessage")
            .field("version", &self.version)
            .field("id", &format_args!("0x{:02X}", self.id))
            .field("len", &self.body.len())
            .finish()
    }
}
