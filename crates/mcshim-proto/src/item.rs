//! Inventory slot payloads.
//!
//! 1.8 through 1.12 share one slot layout: a short item id (`-1` for an empty
//! slot), then count, damage and an optional NBT compound.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::nbt;
use crate::wire::Reader;

/// A non-empty item stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub id: i16,
    pub count: i8,
    pub damage: i16,
    /// Raw NBT compound, type byte included.
    pub nbt: Option<Bytes>,
}

impl ItemStack {
    pub fn new(id: i16, count: i8) -> Self {
        Self {
            id,
            count,
            damage: 0,
            nbt: None,
        }
    }
}

/// Contents of one inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemPayload {
    #[default]
    Empty,
    Stack(ItemStack),
}

impl ItemPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Stack(stack) => stack.count <= 0,
        }
    }

    pub fn stack(&self) -> Option<&ItemStack> {
        match self {
            Self::Empty => None,
            Self::Stack(stack) => Some(stack),
        }
    }

    pub fn stack_mut(&mut self) -> Option<&mut ItemStack> {
        match self {
            Self::Empty => None,
            Self::Stack(stack) => Some(stack),
        }
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let id = reader.i16("slot item id")?;
        if id < 0 {
            return Ok(Self::Empty);
        }
        let count = reader.i8("slot count")?;
        let damage = reader.i16("slot damage")?;
        let nbt = nbt::read_optional(reader)?.map(Bytes::copy_from_slice);
        Ok(Self::Stack(ItemStack {
            id,
            count,
            damage,
            nbt,
        }))
    }

    pub fn write(&self, dst: &mut BytesMut) {
        match self {
            Self::Empty => dst.put_i16(-1),
            Self::Stack(stack) => {
                dst.put_i16(stack.id);
                dst.put_i8(stack.count);
                dst.put_i16(stack.damage);
                match &stack.nbt {
                    Some(raw) => dst.put_slice(raw),
                    None => dst.put_u8(0),
                }
            }
        }
    }
}

impl From<ItemStack> for ItemPayload {
    fn from(stack: ItemStack) -> Self {
        Self::Stack(stack)
    }
}
