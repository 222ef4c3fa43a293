//! Per-connection interception.
//!
//! A [`Connection`] owns its original send path. Installing a
//! [`ConnectionProxy`] swaps the path every outbound message takes: the proxy
//! classifies the message, consults the handler registry, and forwards,
//! rewrites or drops it. Everything else about the connection (identity,
//! disconnect) stays on the `Connection`.
//!
//! ```text
//! server ──send──▶ Connection ──▶ ConnectionProxy::handle
//!                                   │ classify
//!                                   │ Other ─────────────────────┐
//!                                   │ dispatch (HandlerRegistry) │
//!                                   ▼                            ▼
//!                              Suppress: drop         original send path
//! ```

pub mod directory;
pub mod profiles;

use mcshim_proto::{EntityId, FieldAccessor, OutboundMessage, ProtocolVersion, RosterEntry};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::{InstallError, TransportError};
use crate::intercept::{HandlerRegistry, InterceptKind, MessageClassifier, SpawnKind, SubChannel, Verdict};
use crate::scheduler::{DeferredSink, DeferredTaskScheduler};

pub use directory::{EntityDirectory, EntityTable};
pub use profiles::{ProfileOverride, ProfileOverrides};

/// Default ticks between a synthetic player's roster add and removal.
pub const DEFAULT_ROSTER_REMOVAL_DELAY: u64 = 5;

// ============================================================================
// Send path
// ============================================================================

/// Something outbound messages can be handed to.
pub trait Sendable: Send + Sync {
    fn send(&self, msg: OutboundMessage) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;
}

/// The writer task's queue. A full queue is SendQ overflow.
impl Sendable for mpsc::Sender<OutboundMessage> {
    fn send(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        self.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::SendQueueFull,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Identity of a connection, shared with every handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: u64,
    pub version: ProtocolVersion,
    pub player_uuid: Uuid,
    pub player_name: String,
    pub remote_addr: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(id: u64, version: ProtocolVersion, player_uuid: Uuid, player_name: impl Into<String>) -> Self {
        Self {
            id,
            version,
            player_uuid,
            player_name: player_name.into(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

/// Lifecycle of a connection's interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Uninstalled,
    Installed,
    Closed,
}

/// A live player connection.
pub struct Connection {
    info: Arc<ConnectionInfo>,
    original: Arc<dyn Sendable>,
    proxy: OnceLock<Arc<ConnectionProxy>>,
    lifetime: CancellationToken,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("info", &self.info)
            .field("state", &self.proxy_state())
            .finish()
    }
}

impl Connection {
    pub fn new(info: ConnectionInfo, send_path: Arc<dyn Sendable>) -> Self {
        Self {
            info: Arc::new(info),
            original: send_path,
            proxy: OnceLock::new(),
            lifetime: CancellationToken::new(),
        }
    }

    pub fn info(&self) -> &Arc<ConnectionInfo> {
        &self.info
    }

    /// Send an outbound message along the current send path.
    pub fn send(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        match self.proxy.get() {
            Some(proxy) => proxy.handle(msg),
            None => self.original.send(msg),
        }
    }

    /// The current send path: the proxy once installed, else the original.
    pub fn send_path(&self) -> Arc<dyn Sendable> {
        match self.proxy.get() {
            Some(proxy) => Arc::clone(proxy) as Arc<dyn Sendable>,
            None => Arc::clone(&self.original),
        }
    }

    pub fn proxy(&self) -> Option<&Arc<ConnectionProxy>> {
        self.proxy.get()
    }

    pub fn proxy_state(&self) -> ProxyState {
        match self.proxy.get() {
            None => ProxyState::Uninstalled,
            Some(proxy) if proxy.is_closed() => ProxyState::Closed,
            Some(_) => ProxyState::Installed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled() || self.original.is_closed()
    }

    /// Close the connection: the proxy closes and every pending deferred
    /// message for it is cancelled. Idempotent.
    pub fn disconnect(&self) {
        if let Some(proxy) = self.proxy.get() {
            proxy.close();
        }
        self.lifetime.cancel();
    }

    /// Resolves once [`disconnect`](Self::disconnect) was called.
    pub fn disconnected(&self) -> WaitForCancellationFuture<'_> {
        self.lifetime.cancelled()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ============================================================================
// Proxy
// ============================================================================

/// Shared collaborators of every proxy.
#[derive(Clone)]
pub struct ProxyDeps {
    pub registry: Arc<HandlerRegistry>,
    pub classifier: Arc<MessageClassifier>,
    pub scheduler: DeferredTaskScheduler,
    pub directory: Arc<dyn EntityDirectory>,
    pub profiles: Arc<ProfileOverrides>,
    /// Ticks between a synthetic player's roster add and removal.
    pub roster_removal_delay: u64,
}

impl ProxyDeps {
    /// Dependencies with an empty entity table, no profile overrides and
    /// only the trade list channel dispatched.
    pub fn new(registry: Arc<HandlerRegistry>, scheduler: DeferredTaskScheduler) -> Self {
        Self {
            registry,
            classifier: Arc::new(MessageClassifier::default()),
            scheduler,
            directory: Arc::new(EntityTable::new()),
            profiles: Arc::new(ProfileOverrides::new()),
            roster_removal_delay: DEFAULT_ROSTER_REMOVAL_DELAY,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<MessageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn EntityDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<ProfileOverrides>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_roster_removal_delay(mut self, ticks: u64) -> Self {
        self.roster_removal_delay = ticks;
        self
    }
}

/// Interception layer installed in a connection's send path.
pub struct ConnectionProxy {
    info: Arc<ConnectionInfo>,
    original: Arc<dyn Sendable>,
    accessor: FieldAccessor<'static>,
    deps: ProxyDeps,
    lifetime: CancellationToken,
    closed: AtomicBool,
    this: Weak<ConnectionProxy>,
}

impl fmt::Debug for ConnectionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProxy")
            .field("connection", &self.info.id)
            .field("version", &self.info.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionProxy {
    /// Install a proxy on `conn`. Fails if one is already installed; the
    /// installed proxy is left untouched.
    pub fn install(conn: &Connection, deps: ProxyDeps) -> Result<Arc<Self>, InstallError> {
        if conn.proxy.get().is_some() {
            return Err(InstallError::AlreadyInstalled);
        }
        let accessor = FieldAccessor::for_version(conn.info.version)?;

        let proxy = Arc::new_cyclic(|this| Self {
            info: Arc::clone(&conn.info),
            original: Arc::clone(&conn.original),
            accessor,
            deps,
            lifetime: conn.lifetime.child_token(),
            closed: AtomicBool::new(false),
            this: this.clone(),
        });
        conn.proxy
            .set(Arc::clone(&proxy))
            .map_err(|_| InstallError::AlreadyInstalled)?;

        crate::metrics::connection_opened();
        info!(
            connection = conn.info.id,
            player = %conn.info.player_name,
            version = %conn.info.version,
            "Proxy installed"
        );
        Ok(proxy)
    }

    pub fn info(&self) -> &Arc<ConnectionInfo> {
        &self.info
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.lifetime.is_cancelled()
    }

    /// Stop scheduling and cancel pending deferred messages. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.lifetime.cancel();
        crate::metrics::connection_closed();
        debug!(connection = self.info.id, "Proxy closed");
    }

    /// Route one outbound message.
    ///
    /// `Other` goes straight to the original send path. Everything else is
    /// dispatched to the registry and forwarded unless a handler suppresses
    /// it. Transport errors from forwarding are returned unchanged.
    pub fn handle(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        let kind = self.deps.classifier.classify_with(&self.accessor, &msg);
        crate::metrics::record_classified(kind.label());
        trace!(connection = self.info.id, %kind, id = msg.id(), "Outbound message");

        match &kind {
            InterceptKind::Other => self.forward(msg),
            InterceptKind::Roster => {
                let msg = self.apply_profile_overrides(msg);
                self.dispatch_and_forward(&kind, msg)
            }
            InterceptKind::EntitySpawn(spawn) => self.handle_spawn(*spawn, &kind, msg),
            InterceptKind::CustomPayload(channel) => {
                if !self.payload_readable(channel, &msg) {
                    return self.forward(msg);
                }
                self.dispatch_and_forward(&kind, msg)
            }
            _ => self.dispatch_and_forward(&kind, msg),
        }
    }

    fn dispatch_and_forward(&self, kind: &InterceptKind, msg: OutboundMessage) -> Result<(), TransportError> {
        match self.deps.registry.dispatch(&self.info, kind, msg) {
            Verdict::Allow(msg) => self.forward(msg),
            Verdict::Suppress => {
                crate::metrics::record_suppressed("handler");
                Ok(())
            }
        }
    }

    fn handle_spawn(&self, spawn: SpawnKind, kind: &InterceptKind, msg: OutboundMessage) -> Result<(), TransportError> {
        let entity_id = match self.accessor.read_entity_spawn_id(&msg) {
            Ok(id) => Some(id),
            Err(e) => {
                self.codec_error("read_entity_spawn_id", &e);
                None
            }
        };

        if let Some(id) = entity_id
            && self.deps.directory.is_hidden(self.info.player_uuid, id)
        {
            debug!(connection = self.info.id, entity = id, "Hidden entity spawn suppressed");
            crate::metrics::record_suppressed("hidden");
            return Ok(());
        }

        let Verdict::Allow(msg) = self.deps.registry.dispatch(&self.info, kind, msg) else {
            crate::metrics::record_suppressed("handler");
            return Ok(());
        };

        // Handlers may retarget the spawn.
        let spawned_id = match spawn {
            SpawnKind::Named => self.accessor.read_entity_spawn_id(&msg).ok(),
            _ => None,
        };
        let synthetic =
            spawned_id.and_then(|id| self.deps.directory.synthetic_profile(id).map(|p| (id, p)));
        match synthetic {
            Some((id, profile)) => self.announce_synthetic(id, profile, msg),
            None => self.forward(msg),
        }
    }

    /// The client only renders a player it has a roster entry for: announce
    /// the profile, spawn, then withdraw the entry once the skin is loaded.
    fn announce_synthetic(
        &self,
        entity_id: EntityId,
        profile: RosterEntry,
        spawn: OutboundMessage,
    ) -> Result<(), TransportError> {
        let uuid = profile.uuid;
        self.handle(self.accessor.roster_add(vec![profile]))?;
        self.forward(spawn)?;

        if self.is_closed() {
            return Ok(());
        }
        let Some(this) = self.this.upgrade() else {
            return Ok(());
        };
        let accessor = self.accessor;
        let task = self.deps.scheduler.schedule(this, self.deps.roster_removal_delay, move || {
            accessor.roster_remove(vec![uuid])
        });
        debug!(
            connection = self.info.id,
            entity = entity_id,
            %uuid,
            due = task.due(),
            "Synthetic player announced"
        );
        Ok(())
    }

    fn apply_profile_overrides(&self, msg: OutboundMessage) -> OutboundMessage {
        if self.deps.profiles.is_empty() {
            return msg;
        }
        let mut update = match self.accessor.read_roster(&msg) {
            Ok(update) => update,
            Err(e) => {
                self.codec_error("read_roster", &e);
                return msg;
            }
        };
        if !self.deps.profiles.apply(&mut update) {
            return msg;
        }
        let mut rewritten = msg.clone();
        match self.accessor.write_roster(&mut rewritten, &update) {
            Ok(()) => rewritten,
            Err(e) => {
                self.codec_error("write_roster", &e);
                msg
            }
        }
    }

    /// Read the plugin payload without consuming it. A payload that does not
    /// decode is forwarded untouched instead of dispatched.
    fn payload_readable(&self, channel: &SubChannel, msg: &OutboundMessage) -> bool {
        let result = match channel {
            SubChannel::TradeOfferList => self.accessor.read_trade_offers(msg).map(drop),
            SubChannel::Named(_) => self.accessor.read_subchannel(msg).map(drop),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.codec_error("read_subchannel", &e);
                false
            }
        }
    }

    fn forward(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        match self.original.send(msg) {
            Ok(()) => {
                crate::metrics::record_forwarded();
                Ok(())
            }
            Err(e) => {
                crate::metrics::record_transport_error(e.error_code());
                Err(e)
            }
        }
    }

    fn codec_error(&self, operation: &'static str, e: &mcshim_proto::CodecError) {
        debug!(connection = self.info.id, operation, error = %e, "Field not decoded; forwarding unmodified");
        crate::metrics::record_codec_error(e.error_code());
    }
}

impl Sendable for ConnectionProxy {
    fn send(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        self.handle(msg)
    }

    fn is_closed(&self) -> bool {
        ConnectionProxy::is_closed(self) || self.original.is_closed()
    }
}

impl DeferredSink for ConnectionProxy {
    fn deliver(&self, msg: OutboundMessage) -> Result<(), TransportError> {
        self.handle(msg)
    }

    fn is_closed(&self) -> bool {
        ConnectionProxy::is_closed(self) || self.original.is_closed()
    }

    fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }
}
