//! Primitive wire types: VarInt, strings, block positions, UUIDs.
//!
//! [`Reader`] walks a packet body while remembering its offset so callers can
//! splice rewritten fields between untouched prefix and suffix bytes.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::error::{CodecError, Result};

/// Maximum encoded size of a VarInt.
pub const MAX_VARINT_LEN: usize = 5;

/// Default string limit (characters) for chat components.
pub const MAX_CHAT_LEN: usize = 32767;

/// Largest plugin message payload a client accepts.
pub const MAX_PLUGIN_DATA_LEN: usize = 1_048_576;

/// Cursor over a packet body.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset into the body.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Whether the whole body has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Take `n` raw bytes.
    pub fn bytes(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(CodecError::UnexpectedEof {
                field,
                needed: n - available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize, field: &'static str) -> Result<()> {
        self.bytes(n, field).map(|_| ())
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N, field)?);
        Ok(out)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.array::<1>(field)?[0])
    }

    pub fn i8(&mut self, field: &'static str) -> Result<i8> {
        Ok(self.u8(field)? as i8)
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.u8(field)? != 0)
    }

    pub fn i16(&mut self, field: &'static str) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array(field)?))
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array(field)?))
    }

    pub fn i64(&mut self, field: &'static str) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array(field)?))
    }

    pub fn f64(&mut self, field: &'static str) -> Result<f64> {
        Ok(f64::from_be_bytes(self.array(field)?))
    }

    pub fn uuid(&mut self, field: &'static str) -> Result<Uuid> {
        Ok(Uuid::from_bytes(self.array(field)?))
    }

    /// Read a VarInt.
    pub fn varint(&mut self, field: &'static str) -> Result<i32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.u8(field)?;
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(CodecError::VarIntTooLong)
    }

    /// Read a length-prefixed UTF-8 string of at most `max_chars` characters.
    pub fn string(&mut self, max_chars: usize, field: &'static str) -> Result<&'a str> {
        let len = self.varint(field)?;
        // Four bytes per char is the UTF-8 worst case.
        let byte_limit = max_chars.saturating_mul(4);
        if len < 0 || len as usize > byte_limit {
            return Err(CodecError::InvalidLength {
                field,
                length: i64::from(len),
                limit: byte_limit,
            });
        }
        let raw = self.bytes(len as usize, field)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 { field })?;
        if s.chars().count() > max_chars {
            return Err(CodecError::InvalidLength {
                field,
                length: s.chars().count() as i64,
                limit: max_chars,
            });
        }
        Ok(s)
    }

    /// Read a packed block position.
    pub fn position_packed(&mut self, field: &'static str) -> Result<BlockPos> {
        Ok(BlockPos::unpack(self.i64(field)?))
    }
}

/// Number of bytes `value` occupies as a VarInt.
pub fn varint_len(value: i32) -> usize {
    let mut v = value as u32;
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

/// Append a VarInt.
pub fn put_varint(dst: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7F == 0 {
            dst.put_u8(v as u8);
            return;
        }
        dst.put_u8(((v & 0x7F) | 0x80) as u8);
        v >>= 7;
    }
}

/// Append a length-prefixed UTF-8 string.
pub fn put_string(dst: &mut BytesMut, value: &str) {
    put_varint(dst, value.len() as i32);
    dst.put_slice(value.as_bytes());
}

/// Reject `value` if a reader limited to `max_chars` would refuse it.
pub fn check_string(value: &str, max_chars: usize, field: &'static str) -> Result<()> {
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(CodecError::InvalidLength {
            field,
            length: chars as i64,
            limit: max_chars,
        });
    }
    Ok(())
}

/// Append a UUID as two big-endian longs.
pub fn put_uuid(dst: &mut BytesMut, value: &Uuid) {
    dst.put_slice(value.as_bytes());
}

/// A block position as packed into a single long (26/12/26 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn unpack(raw: i64) -> Self {
        let x = (raw >> 38) as i32;
        let y = ((raw << 26) >> 52) as i32;
        let z = ((raw << 38) >> 38) as i32;
        Self { x, y, z }
    }

    pub fn pack(self) -> i64 {
        ((i64::from(self.x) & 0x3FF_FFFF) << 38)
            | ((i64::from(self.y) & 0xFFF) << 26)
            | (i64::from(self.z) & 0x3FF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_known_encodings() {
        let cases: [(i32, &[u8]); 5] = [
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (2_097_151, &[0xFF, 0xFF, 0x7F]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for (value, encoded) in cases {
            let mut buf = BytesMut::new();
            put_varint(&mut buf, value);
            assert_eq!(&buf[..], encoded, "encoding {value}");
            assert_eq!(varint_len(value), encoded.len());
            assert_eq!(Reader::new(encoded).varint("test").unwrap(), value);
        }
    }

    #[test]
    fn test_varint_too_long() {
        let raw = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(
            Reader::new(&raw).varint("test"),
            Err(CodecError::VarIntTooLong)
        );
    }

    #[test]
    fn test_string_limit_enforced() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "MC|TrList-but-much-longer-than-twenty");
        let err = Reader::new(&buf).string(20, "channel").unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength { field: "channel", .. }));
    }

    #[test]
    fn test_check_string_counts_chars() {
        assert!(check_string("éé", 2, "name").is_ok());
        assert_eq!(
            check_string("abc", 2, "name"),
            Err(CodecError::InvalidLength {
                field: "name",
                length: 3,
                limit: 2
            })
        );
    }

    #[test]
    fn test_truncated_read_reports_missing_bytes() {
        let err = Reader::new(&[0x00, 0x01]).i32("window").unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedEof {
                field: "window",
                needed: 2
            }
        );
    }

    #[test]
    fn test_block_pos_negative_coordinates() {
        let pos = BlockPos { x: -30, y: 64, z: -1_000_000 };
        assert_eq!(BlockPos::unpack(pos.pack()), pos);
    }
}
