//! Process-wide table of interception handlers.
//!
//! Readers take a snapshot (`Arc<[entry]>`) in a short critical section and
//! walk it without holding the lock. Writers serialize on the lock and publish
//! a new snapshot, visible to the next dispatch. A dispatch already in flight
//! keeps the snapshot it started with.

use mcshim_proto::OutboundMessage;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::context::{MessageContext, Verdict};
use super::kind::{InterceptKind, KindFilter};
use crate::error::HandlerError;
use crate::proxy::ConnectionInfo;
use crate::telemetry::DispatchTimer;

/// Callback signature for interception handlers.
pub type Callback = dyn Fn(&MessageContext<'_>) -> Result<Verdict, HandlerError> + Send + Sync;

/// Identity of whoever registered a handler (usually a plugin name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(Arc<str>);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returned by [`HandlerRegistry::register`]; pass to `unregister`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    id: u64,
    owner: OwnerId,
}

impl RegistrationHandle {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }
}

struct HandlerEntry {
    id: u64,
    owner: OwnerId,
    filter: KindFilter,
    callback: Box<Callback>,
}

/// Registry of interception handlers.
///
/// Constructed once at startup and shared as `Arc<HandlerRegistry>`.
pub struct HandlerRegistry {
    entries: RwLock<Arc<[Arc<HandlerEntry>]>>,
    next_id: AtomicU64,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::from(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a handler at the end of the dispatch order.
    pub fn register<F>(
        &self,
        owner: impl Into<OwnerId>,
        filter: KindFilter,
        callback: F,
    ) -> RegistrationHandle
    where
        F: Fn(&MessageContext<'_>) -> Result<Verdict, HandlerError> + Send + Sync + 'static,
    {
        let owner = owner.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(HandlerEntry {
            id,
            owner: owner.clone(),
            filter,
            callback: Box::new(callback),
        });

        let mut entries = self.entries.write();
        let mut next: Vec<_> = entries.iter().cloned().collect();
        next.push(entry);
        *entries = Arc::from(next);
        crate::metrics::set_registered_handlers(entries.len());
        drop(entries);

        debug!(%owner, id, "Handler registered");
        RegistrationHandle { id, owner }
    }

    /// Remove one handler. Removing twice is a no-op.
    pub fn unregister(&self, handle: &RegistrationHandle) -> bool {
        self.remove_where(|entry| entry.id == handle.id) > 0
    }

    /// Remove every handler `owner` registered, returning how many.
    pub fn unregister_owner(&self, owner: &OwnerId) -> usize {
        let removed = self.remove_where(|entry| &entry.owner == owner);
        if removed > 0 {
            debug!(%owner, removed, "Owner handlers unregistered");
        }
        removed
    }

    fn remove_where(&self, pred: impl Fn(&HandlerEntry) -> bool) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        let next: Vec<_> = entries
            .iter()
            .filter(|entry| !pred(entry))
            .cloned()
            .collect();
        if next.len() == before {
            return 0;
        }
        *entries = Arc::from(next);
        crate::metrics::set_registered_handlers(entries.len());
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of handlers registered by `owner`.
    pub fn handler_count(&self, owner: &OwnerId) -> usize {
        self.snapshot().iter().filter(|e| &e.owner == owner).count()
    }

    fn snapshot(&self) -> Arc<[Arc<HandlerEntry>]> {
        Arc::clone(&self.entries.read())
    }

    /// Run the matching handlers in registration order.
    ///
    /// Each handler sees the message as left by the previous one. The first
    /// `Suppress` ends the chain. A handler that fails or panics is reported
    /// and skipped, the message continuing as it was before that handler.
    pub fn dispatch(
        &self,
        conn: &ConnectionInfo,
        kind: &InterceptKind,
        msg: OutboundMessage,
    ) -> Verdict {
        let snapshot = self.snapshot();
        let mut matching = snapshot.iter().filter(|e| e.filter.matches(kind)).peekable();
        if matching.peek().is_none() {
            return Verdict::Allow(msg);
        }

        let _timer = DispatchTimer::new(kind.label());
        let mut current = msg;
        for entry in matching {
            let ctx = MessageContext::new(conn, kind, &current);
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(&ctx)));
            match outcome {
                Ok(Ok(Verdict::Allow(next))) => current = next,
                Ok(Ok(Verdict::Suppress)) => {
                    debug!(owner = %entry.owner, %kind, "Message suppressed by handler");
                    return Verdict::Suppress;
                }
                Ok(Err(e)) => report(entry, conn, kind, &e),
                Err(payload) => {
                    let e = HandlerError::Panicked(panic_message(&*payload));
                    report(entry, conn, kind, &e);
                }
            }
        }
        Verdict::Allow(current)
    }
}

fn report(entry: &HandlerEntry, conn: &ConnectionInfo, kind: &InterceptKind, e: &HandlerError) {
    warn!(
        owner = %entry.owner,
        handler = entry.id,
        connection = conn.id,
        %kind,
        error = %e,
        "Interception handler failed; message left unchanged"
    );
    crate::metrics::record_handler_error(entry.owner.as_str(), e.error_code());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
