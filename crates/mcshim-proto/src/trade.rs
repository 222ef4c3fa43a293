//! Villager trade offer lists carried on the `MC|TrList` sub-channel.
//!
//! Layout: int window id, byte offer count, then per offer the first input,
//! the output, an optional second input, a disabled flag and the use
//! counters. Anything after the declared offers is kept verbatim in
//! [`TradeOfferList::trailing`] so a rewrite never truncates it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::item::ItemPayload;
use crate::wire::Reader;

/// Wire name of the trade list sub-channel.
pub const TRADE_LIST_CHANNEL: &str = "MC|TrList";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOffer {
    pub first_input: ItemPayload,
    pub output: ItemPayload,
    pub second_input: Option<ItemPayload>,
    pub disabled: bool,
    pub uses: i32,
    pub max_uses: i32,
}

impl TradeOffer {
    /// Price of the offer: the count of its first input.
    pub fn price(&self) -> i8 {
        self.first_input.stack().map_or(0, |s| s.count)
    }

    /// Set the price. Has no effect on an offer whose first input is empty.
    pub fn set_price(&mut self, price: i8) {
        if let Some(stack) = self.first_input.stack_mut() {
            stack.count = price;
        }
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let first_input = ItemPayload::read(reader)?;
        let output = ItemPayload::read(reader)?;
        let second_input = if reader.bool("trade has second input")? {
            Some(ItemPayload::read(reader)?)
        } else {
            None
        };
        Ok(Self {
            first_input,
            output,
            second_input,
            disabled: reader.bool("trade disabled")?,
            uses: reader.i32("trade uses")?,
            max_uses: reader.i32("trade max uses")?,
        })
    }

    fn write(&self, dst: &mut BytesMut) {
        self.first_input.write(dst);
        self.output.write(dst);
        match &self.second_input {
            Some(item) => {
                dst.put_u8(1);
                item.write(dst);
            }
            None => dst.put_u8(0),
        }
        dst.put_u8(u8::from(self.disabled));
        dst.put_i32(self.uses);
        dst.put_i32(self.max_uses);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOfferList {
    pub window_id: i32,
    pub offers: Vec<TradeOffer>,
    /// Bytes after the last declared offer.
    pub trailing: Bytes,
}

impl TradeOfferList {
    /// Decode from sub-channel data.
    pub fn decode(data: &Bytes) -> Result<Self> {
        let mut reader = Reader::new(data);
        let window_id = reader.i32("trade window id")?;
        let count = reader.u8("trade count")?;
        let offers = (0..count)
            .map(|_| TradeOffer::read(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        let trailing = data.slice(reader.position()..);
        Ok(Self {
            window_id,
            offers,
            trailing,
        })
    }

    /// Encode back into sub-channel data.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(64 + self.trailing.len());
        dst.put_i32(self.window_id);
        dst.put_u8(self.offers.len().min(u8::MAX as usize) as u8);
        for offer in self.offers.iter().take(u8::MAX as usize) {
            offer.write(&mut dst);
        }
        dst.extend_from_slice(&self.trailing);
        dst.freeze()
    }
}
