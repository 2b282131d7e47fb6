//! Live relay bookkeeping.
//!
//! Every accepted WebSocket relay holds a [`RelayGuard`] until both legs are
//! closed. Shutdown waits on the live count reaching zero.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

static NEXT_RELAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique relay number, shown as `relay-N` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayId(u64);

impl RelayId {
    pub fn next() -> Self {
        Self(NEXT_RELAY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// Shared count of live relays.
#[derive(Debug, Clone)]
pub struct RelayTracker {
    live: Arc<watch::Sender<u64>>,
}

impl RelayTracker {
    pub fn new() -> Self {
        let (live, _) = watch::channel(0);
        Self { live: Arc::new(live) }
    }

    pub fn track(&self) -> RelayGuard {
        self.live.send_modify(|n| *n += 1);
        RelayGuard {
            live: Arc::clone(&self.live),
            id: RelayId::next(),
        }
    }

    pub fn live(&self) -> u64 {
        *self.live.borrow()
    }

    /// Wait for the live count to reach zero, for at most `limit`.
    /// Returns how many relays are still live.
    pub async fn drained(&self, limit: Duration) -> u64 {
        let mut rx = self.live.subscribe();
        let _ = tokio::time::timeout(limit, rx.wait_for(|n| *n == 0)).await;
        self.live()
    }
}

impl Default for RelayTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one relay as live until dropped.
#[derive(Debug)]
pub struct RelayGuard {
    live: Arc<watch::Sender<u64>>,
    id: RelayId,
}

impl RelayGuard {
    pub fn id(&self) -> RelayId {
        self.id
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(relay = %self.id, "Relay released");
    }
}
