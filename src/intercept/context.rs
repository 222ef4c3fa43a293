//! What a handler sees, and what it answers.

use bytes::Bytes;
use mcshim_proto::{CodecError, FieldAccessor, OutboundMessage};

use super::kind::InterceptKind;
use crate::proxy::ConnectionInfo;

/// A handler's decision about one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Send this message (the one received, or a rewritten copy).
    Allow(OutboundMessage),
    /// Send nothing.
    Suppress,
}

impl Verdict {
    pub fn is_suppress(&self) -> bool {
        matches!(self, Self::Suppress)
    }

    /// The message to send, if any.
    pub fn into_message(self) -> Option<OutboundMessage> {
        match self {
            Self::Allow(msg) => Some(msg),
            Self::Suppress => None,
        }
    }
}

/// Per-callback view of a message in flight.
///
/// The message is the one produced by the previous handler in the chain.
/// Handlers rewrite by cloning it, editing the copy through [`accessor`]
/// and returning it in [`Verdict::Allow`].
///
/// [`accessor`]: MessageContext::accessor
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    connection: &'a ConnectionInfo,
    kind: &'a InterceptKind,
    message: &'a OutboundMessage,
}

impl<'a> MessageContext<'a> {
    pub fn new(
        connection: &'a ConnectionInfo,
        kind: &'a InterceptKind,
        message: &'a OutboundMessage,
    ) -> Self {
        Self {
            connection,
            kind,
            message,
        }
    }

    /// The receiving connection.
    pub fn connection(&self) -> &'a ConnectionInfo {
        self.connection
    }

    pub fn kind(&self) -> &'a InterceptKind {
        self.kind
    }

    pub fn message(&self) -> &'a OutboundMessage {
        self.message
    }

    /// Field accessor for the message's protocol version.
    pub fn accessor(&self) -> Result<FieldAccessor<'static>, CodecError> {
        FieldAccessor::for_version(self.message.version())
    }

    /// Sub-channel data of a plugin message, without its channel name.
    pub fn subchannel_data(&self) -> Result<Bytes, CodecError> {
        self.accessor()?.read_subchannel(self.message).map(|(_, data)| data)
    }

    /// `Allow` the message unchanged.
    pub fn allow(&self) -> Verdict {
        Verdict::Allow(self.message.clone())
    }

    /// `Allow` a copy of the message after `edit` rewrote it.
    pub fn rewrite<F>(&self, edit: F) -> Result<Verdict, CodecError>
    where
        F: FnOnce(&FieldAccessor<'static>, &mut OutboundMessage) -> Result<(), CodecError>,
    {
        let accessor = self.accessor()?;
        let mut msg = self.message.clone();
        edit(&accessor, &mut msg)?;
        Ok(Verdict::Allow(msg))
    }
}
