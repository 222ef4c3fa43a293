//! # mcshim-proto
//!
//! Version-aware codec for the clientbound Minecraft packets the interception
//! layer reads and rewrites.
//!
//! ## Features
//!
//! - Explicit per-revision accessor tables, validated once at startup
//! - Typed field access (chat text, slots, window contents, spawn identity
//!   and coordinates, sub-channel data, trade offers, roster updates)
//! - Rewrites that keep length prefixes valid and unrelated bytes identical
//! - Optional Tokio frame codec
//!
//! ## Quick Start
//!
//! ```rust
//! use mcshim_proto::{tables, FieldAccessor, ProtocolVersion};
//!
//! tables::init().expect("built-in tables are valid");
//! let acc = FieldAccessor::for_version(ProtocolVersion::V1_12_R1).unwrap();
//!
//! let mut msg = acc.chat(r#"{"text":"hello"}"#, 0);
//! acc.write_plain_text(&mut msg, "hello, world").unwrap();
//! assert_eq!(acc.read_plain_text(&msg).unwrap(), "hello, world");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accessor;
#[cfg(feature = "tokio")]
pub mod codec;
pub mod error;
pub mod item;
pub mod nbt;
pub mod packet;
pub mod roster;
pub mod tables;
pub mod trade;
pub mod version;
pub mod wire;

pub use self::accessor::{
    text_component, EntityId, FieldAccessor, Position3, SlotUpdate, WindowContents,
    CHAT_POSITION_ACTION_BAR, CHAT_POSITION_CHAT,
};
#[cfg(feature = "tokio")]
pub use self::codec::{FrameCodec, MAX_FRAME_LEN};
pub use self::error::CodecError;
pub use self::item::{ItemPayload, ItemStack};
pub use self::packet::OutboundMessage;
pub use self::roster::{ProfileProperty, RosterEntry, RosterUpdate, MAX_PLAYER_NAME_LEN};
pub use self::tables::{AccessorTable, SpawnLayout, WireKind};
pub use self::trade::{TradeOffer, TradeOfferList, TRADE_LIST_CHANNEL};
pub use self::version::{ProtocolVersion, UnknownVersion};
