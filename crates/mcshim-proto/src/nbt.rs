//! Structural NBT skipping.
//!
//! Item stacks carry an optional NBT compound. The shim never interprets tag
//! contents; it only needs to know where the compound ends so the bytes can
//! be carried through a rewrite untouched.

use crate::error::{CodecError, Result};
use crate::wire::Reader;

const TAG_END: u8 = 0;
const TAG_COMPOUND: u8 = 10;
const MAX_DEPTH: usize = 512;

/// Read an optional root compound, returning its raw bytes (type byte
/// included), or `None` when the stack carries no tag.
pub fn read_optional<'a>(reader: &mut Reader<'a>) -> Result<Option<&'a [u8]>> {
    let start = reader.remaining();
    let begin = reader.position();
    let tag = reader.u8("nbt")?;
    if tag == TAG_END {
        return Ok(None);
    }
    skip_name(reader)?;
    skip_payload(reader, tag, 0)?;
    Ok(Some(&start[..reader.position() - begin]))
}

fn skip_name(reader: &mut Reader<'_>) -> Result<()> {
    let len = reader.i16("nbt name")? as u16;
    reader.skip(usize::from(len), "nbt name")
}

fn array_len(reader: &mut Reader<'_>, field: &'static str) -> Result<usize> {
    let len = reader.i32(field)?;
    if len < 0 {
        return Err(CodecError::InvalidLength {
            field,
            length: i64::from(len),
            limit: i32::MAX as usize,
        });
    }
    Ok(len as usize)
}

fn skip_payload(reader: &mut Reader<'_>, tag: u8, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(CodecError::NbtTooDeep);
    }
    match tag {
        1 => reader.skip(1, "nbt byte"),
        2 => reader.skip(2, "nbt short"),
        3 | 5 => reader.skip(4, "nbt int"),
        4 | 6 => reader.skip(8, "nbt long"),
        7 => {
            let len = array_len(reader, "nbt byte array")?;
            reader.skip(len, "nbt byte array")
        }
        8 => {
            let len = reader.i16("nbt string")? as u16;
            reader.skip(usize::from(len), "nbt string")
        }
        9 => {
            let element = reader.u8("nbt list")?;
            let len = array_len(reader, "nbt list")?;
            if element == TAG_END && len > 0 {
                return Err(CodecError::UnknownNbtTag(TAG_END));
            }
            for _ in 0..len {
                skip_payload(reader, element, depth + 1)?;
            }
            Ok(())
        }
        TAG_COMPOUND => loop {
            let child = reader.u8("nbt compound")?;
            if child == TAG_END {
                return Ok(());
            }
            skip_name(reader)?;
            skip_payload(reader, child, depth + 1)?;
        },
        11 => {
            let len = array_len(reader, "nbt int array")?;
            reader.skip(len.saturating_mul(4), "nbt int array")
        }
        12 => {
            let len = array_len(reader, "nbt long array")?;
            reader.skip(len.saturating_mul(8), "nbt long array")
        }
        other => Err(CodecError::UnknownNbtTag(other)),
    }
}
