//! Synchronization primitives shared by the cache and its watch tasks

use std::sync::Arc;
use tokio::sync::watch;

/// One-shot latch: once set it stays set, and every waiter (including
/// ones that subscribe later) observes it.
#[derive(Debug, Clone)]
struct Latch {
    tx: Arc<watch::Sender<bool>>,
}

impl Latch {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    fn set(&self) {
        self.tx.send_replace(true);
    }

    fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Process-wide stop signal for watch tasks
///
/// Raising it terminates every watch stream and fails a cache
/// initialization that is still waiting for its sync barrier.
#[derive(Debug, Clone)]
pub struct StopSignal(Latch);

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self(Latch::new())
    }

    pub fn raise(&self) {
        self.0.set();
    }

    pub fn is_raised(&self) -> bool {
        self.0.is_set()
    }

    /// Resolves once the signal has been raised
    pub async fn raised(&self) {
        self.0.wait().await
    }
}

/// Marks that a watch stream delivered its initial listing
#[derive(Debug, Clone)]
pub struct SyncFlag(Latch);

impl Default for SyncFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncFlag {
    pub fn new() -> Self {
        Self(Latch::new())
    }

    pub fn mark(&self) {
        self.0.set();
    }

    pub fn is_synced(&self) -> bool {
        self.0.is_set()
    }

    pub async fn wait(&self) {
        self.0.wait().await
    }
}
