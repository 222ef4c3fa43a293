//! Unified error handling for mcshim.
//!
//! Each layer has its own error enum. Every enum exposes `error_code()` so
//! failures can be labeled in metrics without allocating.

use mcshim_proto::CodecError;
use thiserror::Error;

// ============================================================================
// Handler Errors (extension callbacks)
// ============================================================================

/// Errors raised by an interception callback.
///
/// These never leave the registry: a failing callback is reported and the
/// message continues as it was before that callback ran.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A field could not be read or rewritten.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The callback refused the message for its own reasons.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The callback panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Codec(e) => e.error_code(),
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

// ============================================================================
// Transport Errors (send path)
// ============================================================================

/// Errors from handing a message to a connection's send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection's writer is gone.
    #[error("connection closed")]
    Closed,

    /// SendQ overflow: the client is not reading.
    #[error("send queue full")]
    SendQueueFull,
}

impl TransportError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::SendQueueFull => "send_queue_full",
        }
    }
}

// ============================================================================
// Install Errors
// ============================================================================

/// Errors from installing a proxy on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("a proxy is already installed on this connection")]
    AlreadyInstalled,

    /// No accessor table for the connection's version (tables not built).
    #[error("no accessor table: {0}")]
    NoTable(#[from] CodecError),
}

impl InstallError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyInstalled => "already_installed",
            Self::NoTable(e) => e.error_code(),
        }
    }
}

// ============================================================================
// Relay Errors (mcshimd sessions)
// ============================================================================

/// Reasons a relayed session ends abnormally.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// The upstream asked for encryption; it must run in offline mode.
    #[error("upstream requested encryption")]
    EncryptionRequested,

    /// The upstream enabled compression; it must run with compression off.
    #[error("upstream enabled compression (threshold {0})")]
    CompressionRequested(i32),

    #[error("malformed {0} packet")]
    Malformed(&'static str),
}

impl RelayError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Codec(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
            Self::Install(e) => e.error_code(),
            Self::EncryptionRequested => "encryption_requested",
            Self::CompressionRequested(_) => "compression_requested",
            Self::Malformed(_) => "malformed",
        }
    }
}
