//! Deferred delivery of synthetic messages, counted in ticks.
//!
//! I/O tasks hand work to the tick domain over an unbounded queue. The
//! [`TickDriver`] owns that queue and a min-heap of pending tasks; it runs on
//! a single task and advances one tick per period.
//!
//! A task scheduled while the counter reads `T` with delay `d` fires on the
//! tick that advances the counter to `T + d` (a delay of zero fires on the
//! next tick). Cancellation and the target's closed state are checked when
//! the task is due, so a task never fires for a closed connection.

use mcshim_proto::OutboundMessage;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Where a deferred message is delivered.
pub trait DeferredSink: Send + Sync {
    fn deliver(&self, msg: OutboundMessage) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;

    /// Token cancelled when the sink closes; every task for this sink is
    /// tied to it.
    fn lifetime(&self) -> CancellationToken;
}

/// Builds the deferred message when the task fires.
pub type TaskFactory = Box<dyn FnOnce() -> OutboundMessage + Send>;

/// Handle to a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    due: u64,
    token: CancellationToken,
}

impl TaskHandle {
    /// Tick on which the task fires.
    pub fn due(&self) -> u64 {
        self.due
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct DeferredTask {
    id: u64,
    due: u64,
    target: Arc<dyn DeferredSink>,
    factory: TaskFactory,
    token: CancellationToken,
}

impl PartialEq for DeferredTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for DeferredTask {}

impl PartialOrd for DeferredTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeferredTask {
    // Reversed: BinaryHeap is a max-heap, the earliest task must be on top.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then_with(|| other.id.cmp(&self.id))
    }
}

/// Cloneable scheduling handle given to every connection proxy.
#[derive(Clone)]
pub struct DeferredTaskScheduler {
    tx: mpsc::UnboundedSender<DeferredTask>,
    now: Arc<AtomicU64>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for DeferredTaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTaskScheduler")
            .field("now", &self.now())
            .finish()
    }
}

impl DeferredTaskScheduler {
    /// Create a scheduler and the driver that owns its queue.
    pub fn new() -> (Self, TickDriver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = Arc::new(AtomicU64::new(0));
        let scheduler = Self {
            tx,
            now: Arc::clone(&now),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        let driver = TickDriver {
            rx,
            heap: BinaryHeap::new(),
            now,
        };
        (scheduler, driver)
    }

    /// Current tick counter.
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }

    /// Deliver `factory()` to `target` after `delay` ticks.
    ///
    /// If the driver is gone the returned handle is already cancelled.
    pub fn schedule(
        &self,
        target: Arc<dyn DeferredSink>,
        delay: u64,
        factory: impl FnOnce() -> OutboundMessage + Send + 'static,
    ) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let due = self.now().saturating_add(delay);
        let token = target.lifetime().child_token();
        let handle = TaskHandle {
            id,
            due,
            token: token.clone(),
        };

        let task = DeferredTask {
            id,
            due,
            target,
            factory: Box::new(factory),
            token,
        };
        if self.tx.send(task).is_err() {
            warn!(id, "Tick driver stopped; deferred task dropped");
            handle.token.cancel();
        }
        handle
    }

    /// Cancel a task. Cancelling a fired or cancelled task is a no-op.
    pub fn cancel(&self, handle: &TaskHandle) {
        debug!(id = handle.id, "Deferred task cancelled");
        handle.token.cancel();
    }
}

/// Owns the pending tasks and advances the tick counter.
pub struct TickDriver {
    rx: mpsc::UnboundedReceiver<DeferredTask>,
    heap: BinaryHeap<DeferredTask>,
    now: Arc<AtomicU64>,
}

impl TickDriver {
    /// Current tick counter.
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }

    /// Tasks waiting for their tick.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Advance one tick and fire every task now due. Returns how many
    /// messages were delivered.
    pub fn tick(&mut self) -> usize {
        while let Ok(task) = self.rx.try_recv() {
            self.heap.push(task);
        }
        let pruned = self.prune_cancelled();
        let now = self.now.fetch_add(1, Ordering::AcqRel) + 1;

        let mut fired = 0;
        while self.heap.peek().is_some_and(|task| task.due <= now) {
            let Some(task) = self.heap.pop() else {
                break;
            };
            if task.token.is_cancelled() {
                crate::metrics::record_deferred_skipped("cancelled");
                continue;
            }
            if task.target.is_closed() {
                crate::metrics::record_deferred_skipped("closed");
                continue;
            }
            let msg = (task.factory)();
            match task.target.deliver(msg) {
                Ok(()) => {
                    fired += 1;
                    crate::metrics::record_deferred_fired();
                }
                Err(e) => {
                    debug!(id = task.id, error = %e, "Deferred delivery failed");
                    crate::metrics::record_transport_error(e.error_code());
                }
            }
        }

        if fired > 0 || pruned > 0 {
            debug!(tick = now, fired, pruned, "Deferred tasks processed");
        }
        crate::metrics::set_deferred_pending(self.heap.len());
        fired
    }

    fn prune_cancelled(&mut self) -> usize {
        let before = self.heap.len();
        self.heap.retain(|task| !task.token.is_cancelled());
        let pruned = before - self.heap.len();
        for _ in 0..pruned {
            crate::metrics::record_deferred_skipped("cancelled");
        }
        pruned
    }

    /// Tick every `period` until `shutdown` is cancelled.
    pub async fn run(mut self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "Tick driver started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
        info!(tick = self.now(), pending = self.heap.len(), "Tick driver stopped");
    }
}

/// Spawn the tick driver on its own task.
pub fn spawn_tick_task(
    driver: TickDriver,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(driver.run(period, shutdown))
}
