//! Error types for the packet codec.
//!
//! Field access against a layout the codec did not expect surfaces as
//! [`CodecError`]. Callers in the interception layer treat every variant as
//! non-fatal: the affected field is left alone and the message is forwarded.

use thiserror::Error;

use crate::version::ProtocolVersion;

/// Convenience type alias for Results using [`CodecError`].
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// Errors raised while reading or rewriting packet fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The body ended before the field was complete.
    #[error("unexpected end of packet: needed {needed} more bytes for {field}")]
    UnexpectedEof {
        /// Field being decoded.
        field: &'static str,
        /// Bytes still missing.
        needed: usize,
    },

    /// A VarInt ran past five bytes.
    #[error("varint too long")]
    VarIntTooLong,

    /// A length prefix was negative or over the protocol limit.
    #[error("invalid length {length} for {field} (limit: {limit})")]
    InvalidLength {
        /// Field being decoded.
        field: &'static str,
        /// Declared length.
        length: i64,
        /// Maximum accepted length.
        limit: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 {
        /// Field being decoded.
        field: &'static str,
    },

    /// An NBT tag type outside the known set.
    #[error("unknown nbt tag type {0}")]
    UnknownNbtTag(u8),

    /// NBT nesting exceeded the depth limit.
    #[error("nbt nesting too deep")]
    NbtTooDeep,

    /// A chat component was not valid JSON.
    #[error("invalid chat component: {0}")]
    InvalidChat(String),

    /// The message is not of the kind the accessor operates on.
    #[error("packet 0x{id:02X} is not a {expected} packet under {version}")]
    WrongKind {
        /// Kind the accessor expected.
        expected: &'static str,
        /// Actual packet id.
        id: i32,
        /// Protocol revision of the message.
        version: ProtocolVersion,
    },

    /// Roster action byte outside the known set.
    #[error("unknown roster action {0}")]
    UnknownRosterAction(i32),

    /// The operation has no representation in this protocol revision.
    #[error("{operation} is not supported by {version}")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Protocol revision.
        version: ProtocolVersion,
    },

    /// A frame exceeded the protocol's maximum frame length.
    #[error("frame too long: {actual} bytes (limit: {limit})")]
    FrameTooLong {
        /// Declared frame length.
        actual: usize,
        /// Maximum accepted length.
        limit: usize,
    },

    /// A protocol version table failed startup validation.
    #[error("accessor table for {version} is invalid: {reason}")]
    IncompleteTable {
        /// Protocol revision of the table.
        version: ProtocolVersion,
        /// What was wrong with it.
        reason: String,
    },

    /// Accessor tables were used before `tables::init()`.
    #[error("accessor tables not initialized")]
    TablesNotInitialized,

    /// I/O failure in the frame codec.
    #[error("io error: {0}")]
    Io(String),
}

impl CodecError {
    /// Static label for metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnexpectedEof { .. } => "unexpected_eof",
            Self::VarIntTooLong => "varint_too_long",
            Self::InvalidLength { .. } => "invalid_length",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
            Self::UnknownNbtTag(_) => "unknown_nbt_tag",
            Self::NbtTooDeep => "nbt_too_deep",
            Self::InvalidChat(_) => "invalid_chat",
            Self::WrongKind { .. } => "wrong_kind",
            Self::UnknownRosterAction(_) => "unknown_roster_action",
            Self::Unsupported { .. } => "unsupported",
            Self::FrameTooLong { .. } => "frame_too_long",
            Self::IncompleteTable { .. } => "incomplete_table",
            Self::TablesNotInitialized => "tables_not_initialized",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
