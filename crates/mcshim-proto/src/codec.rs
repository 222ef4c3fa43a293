//! Length-prefixed frame codec for tokio.
//!
//! Uncompressed Minecraft framing: a VarInt length followed by that many
//! bytes of frame payload (`VarInt packet id ++ body`).

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, Result};
use crate::packet::OutboundMessage;
use crate::wire::{put_varint, varint_len, MAX_VARINT_LEN};

/// Largest frame a three-byte VarInt length can declare.
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Tokio codec splitting a byte stream into frame payloads.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_len: MAX_FRAME_LEN,
        }
    }

    /// Codec with a custom frame limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Peek a VarInt at the start of `src`: `Ok(None)` if more bytes are needed.
fn peek_varint(src: &[u8]) -> Result<Option<(usize, usize)>> {
    let mut value: u32 = 0;
    for (i, byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value as usize, i + 1)));
        }
    }
    if src.len() >= MAX_VARINT_LEN {
        Err(CodecError::VarIntTooLong)
    } else {
        Ok(None)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some((len, header)) = peek_varint(src)? else {
            return Ok(None);
        };
        if len > self.max_len {
            return Err(CodecError::FrameTooLong {
                actual: len,
                limit: self.max_len,
            });
        }
        if src.len() < header + len {
            src.reserve(header + len - src.len());
            return Ok(None);
        }
        src.advance(header);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_len {
            return Err(CodecError::FrameTooLong {
                actual: payload.len(),
                limit: self.max_len,
            });
        }
        dst.reserve(varint_len(payload.len() as i32) + payload.len());
        put_varint(dst, payload.len() as i32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Encoder<OutboundMessage> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: OutboundMessage, dst: &mut BytesMut) -> Result<()> {
        let len = msg.encoded_len();
        if len > self.max_len {
            return Err(CodecError::FrameTooLong {
                actual: len,
                limit: self.max_len,
            });
        }
        dst.reserve(varint_len(len as i32) + len);
        put_varint(dst, len as i32);
        msg.encode(dst);
        Ok(())
    }
}
