//! Process-wide shutdown phases and the in-flight stream counter.
//!
//! # Design
//! - A single `watch` channel carries the phase; relays and the HTTP server observe it.
//! - Phases only move forward: `Running → Draining → Aborting`.
//! - Active streams are counted with RAII leases so every exit path releases its slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, watch};

/// Lifecycle phase of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    /// Accepting and serving requests.
    Running,
    /// No new connections; in-flight streams may still complete.
    Draining,
    /// In-flight streams must stop and release their archivers.
    Aborting,
}

impl ShutdownPhase {
    /// Stable label used in logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Aborting => "aborting",
        }
    }
}

/// Owner of the shutdown phase.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    sender: Arc<watch::Sender<ShutdownPhase>>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a controller in the `Running` phase.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(ShutdownPhase::Running);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        *self.sender.borrow()
    }

    /// Subscribe to phase changes.
    #[must_use]
    pub fn watch(&self) -> ShutdownWatch {
        ShutdownWatch {
            receiver: self.sender.subscribe(),
        }
    }

    /// Stop accepting new work; in-flight streams continue.
    pub fn begin_drain(&self) {
        self.advance(ShutdownPhase::Draining);
    }

    /// Ask every in-flight stream to stop.
    pub fn abort_streams(&self) {
        self.advance(ShutdownPhase::Aborting);
    }

    fn advance(&self, next: ShutdownPhase) {
        self.sender.send_if_modified(|phase| {
            if next > *phase {
                *phase = next;
                true
            } else {
                false
            }
        });
    }
}

/// Read side of the shutdown phase.
#[derive(Debug, Clone)]
pub struct ShutdownWatch {
    receiver: watch::Receiver<ShutdownPhase>,
}

impl ShutdownWatch {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        *self.receiver.borrow()
    }

    /// Resolves once the server stops accepting new work. Pending forever if the controller is gone.
    pub async fn draining(&mut self) {
        self.wait_until(ShutdownPhase::Draining).await;
    }

    /// Resolves once in-flight streams must stop. Pending forever if the controller is gone.
    pub async fn aborted(&mut self) {
        self.wait_until(ShutdownPhase::Aborting).await;
    }

    async fn wait_until(&mut self, target: ShutdownPhase) {
        if self
            .receiver
            .wait_for(|phase| *phase >= target)
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }
}

/// Counter of archive streams currently in `STREAMING` or `FINALIZING`.
#[derive(Debug, Clone, Default)]
pub struct ActiveStreams {
    inner: Arc<StreamsInner>,
}

#[derive(Debug, Default)]
struct StreamsInner {
    count: AtomicUsize,
    idle: Notify,
}

impl ActiveStreams {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams currently holding a lease.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Register a stream; the slot is released when the lease drops.
    #[must_use]
    pub fn acquire(&self) -> StreamLease {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        StreamLease {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Resolves once no stream holds a lease.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Slot held by one in-flight stream.
#[derive(Debug)]
pub struct StreamLease {
    inner: Arc<StreamsInner>,
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
