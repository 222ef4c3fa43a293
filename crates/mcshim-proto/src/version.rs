//! Supported protocol revisions.

use std::fmt;
use std::str::FromStr;

/// A protocol revision the shim knows how to intercept.
///
/// Named after the server implementation revisions they correspond to; the
/// wire protocol number is available through [`ProtocolVersion::protocol`].
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// 1.8.x, protocol 47.
    V1_8_R3,
    /// 1.9.4, protocol 110.
    V1_9_R2,
    /// 1.12.2, protocol 340.
    V1_12_R1,
}

impl ProtocolVersion {
    /// Every supported revision, oldest first.
    pub const ALL: [ProtocolVersion; 3] = [Self::V1_8_R3, Self::V1_9_R2, Self::V1_12_R1];

    /// Wire protocol number sent in the handshake.
    pub const fn protocol(self) -> i32 {
        match self {
            Self::V1_8_R3 => 47,
            Self::V1_9_R2 => 110,
            Self::V1_12_R1 => 340,
        }
    }

    /// Look up a revision by its handshake protocol number.
    pub fn from_protocol(protocol: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.protocol() == protocol)
    }

    /// Human-readable game version.
    pub const fn game_version(self) -> &'static str {
        match self {
            Self::V1_8_R3 => "1.8.8",
            Self::V1_9_R2 => "1.9.4",
            Self::V1_12_R1 => "1.12.2",
        }
    }

    /// Index into per-version arrays.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::V1_8_R3 => 0,
            Self::V1_9_R2 => 1,
            Self::V1_12_R1 => 2,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::V1_8_R3 => "v1_8_R3",
            Self::V1_9_R2 => "v1_9_R2",
            Self::V1_12_R1 => "v1_12_R1",
        };
        f.write_str(label)
    }
}

/// Error returned when a version label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol version: {0}")]
pub struct UnknownVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        match label.to_ascii_lowercase().as_str() {
            "v1_8_r3" | "1.8" | "1.8.8" | "1.8.9" | "47" => Ok(Self::V1_8_R3),
            "v1_9_r2" | "1.9.4" | "110" => Ok(Self::V1_9_R2),
            "v1_12_r1" | "1.12" | "1.12.2" | "340" => Ok(Self::V1_12_R1),
            _ => Err(UnknownVersion(label.to_string())),
        }
    }
}
