//! # mcshim
//!
//! Per-connection interception of outbound Minecraft packets.
//!
//! A [`ConnectionProxy`] is installed in place of a connection's send path.
//! Every outbound message is classified into an [`InterceptKind`]; messages
//! of interest are offered to the handlers in the [`HandlerRegistry`], which
//! may rewrite or suppress them. Extension logic works the same on 1.8, 1.9.4
//! and 1.12.2 clients: all version-specific layout lives in `mcshim-proto`.
//!
//! ```rust
//! use std::sync::Arc;
//! use mcshim::intercept::{HandlerRegistry, KindFilter, KindTag, Verdict};
//! use mcshim::proxy::{Connection, ConnectionInfo, ConnectionProxy, ProxyDeps};
//! use mcshim::scheduler::DeferredTaskScheduler;
//! use mcshim_proto::{tables, FieldAccessor, OutboundMessage, ProtocolVersion};
//!
//! tables::init().expect("built-in tables are valid");
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("censor", KindFilter::only(KindTag::Chat), |ctx| {
//!     Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, "[redacted]"))?)
//! });
//!
//! let (scheduler, _driver) = DeferredTaskScheduler::new();
//! let (tx, mut rx) = tokio::sync::mpsc::channel::<OutboundMessage>(8);
//! let info = ConnectionInfo::new(1, ProtocolVersion::V1_12_R1, uuid::Uuid::nil(), "Steve");
//! let conn = Connection::new(info, Arc::new(tx));
//! ConnectionProxy::install(&conn, ProxyDeps::new(registry, scheduler)).unwrap();
//!
//! let acc = FieldAccessor::for_version(ProtocolVersion::V1_12_R1).unwrap();
//! conn.send(acc.chat(r#"{"text":"secret"}"#, 0)).unwrap();
//! let sent = rx.try_recv().unwrap();
//! assert_eq!(acc.read_plain_text(&sent).unwrap(), "[redacted]");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod intercept;
pub mod metrics;
pub mod network;
pub mod proxy;
pub mod scheduler;
pub mod telemetry;

pub use error::{HandlerError, InstallError, RelayError, TransportError};
pub use intercept::{
    HandlerRegistry, InterceptKind, KindFilter, MessageClassifier, MessageContext, Verdict,
};
pub use proxy::{Connection, ConnectionInfo, ConnectionProxy, ProxyDeps, Sendable};
pub use scheduler::{DeferredTaskScheduler, TaskHandle, TickDriver};
