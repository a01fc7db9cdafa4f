//! Coalescing state relay for Boardlink.
//!
//! Board-state updates arrive far faster than a remote peer needs them.
//! [`CoalescingRelay`] keeps one mailbox slot per destination connection:
//!
//! - [`push`](CoalescingRelay::push) overwrites the slot. An older payload
//!   that has not been flushed yet is discarded, never queued.
//! - The first push into an idle slot arms a one-shot timer for that
//!   destination only. When it fires, the latest payload is sent and the
//!   slot is released. The next push arms a new timer.
//! - If the destination already has more than
//!   [`RelayConfig::max_buffered_bytes`] waiting in its socket buffer, the
//!   flush is skipped and the payload dropped. A later push carries
//!   whatever is current by then.
//!
//! So each destination receives at most one relayed message per flush
//! interval, a slow destination never makes memory grow, and only the
//! latest state is ever delivered. No ordering or delivery guarantee is
//! made for intermediate updates.
//!
//! ```ignore
//! let relay = CoalescingRelay::new(RelayConfig::default());
//! for dest in &targets {
//!     relay.push(dest, Arc::clone(&encoded)).await;
//! }
//! // On disconnect:
//! relay.forget(conn.id()).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use boardlink_transport::{Connection, ConnectionId};
use tokio::sync::Mutex;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Relay timing and congestion settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Coalescing window: delay between the first push into an idle slot
    /// and its flush. The default of 33 ms caps relay traffic at roughly
    /// 30 messages per second per destination.
    pub flush_interval: Duration,
    /// A flush is skipped when the destination has more than this many
    /// bytes queued but unwritten.
    pub max_buffered_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(33),
            max_buffered_bytes: 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters since the relay was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Payloads handed to [`CoalescingRelay::push`].
    pub pushed: u64,
    /// Payloads overwritten by a newer one before their flush.
    pub coalesced: u64,
    /// Payloads handed to the destination connection.
    pub delivered: u64,
    /// Payloads dropped because the destination was congested.
    pub dropped_congested: u64,
    /// Payloads the destination refused, usually because it had closed.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    coalesced: AtomicU64,
    delivered: AtomicU64,
    dropped_congested: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RelayStats {
        RelayStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_congested: self.dropped_congested.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// One destination's mailbox. Exists only while a flush is armed.
struct Slot<C> {
    conn: Arc<C>,
    payload: Arc<[u8]>,
    /// Identifies the timer that owns this slot, so a timer armed before a
    /// [`forget`](CoalescingRelay::forget) cannot flush a later slot early.
    timer: u64,
}

struct Inner<C> {
    config: RelayConfig,
    slots: Mutex<HashMap<ConnectionId, Slot<C>>>,
    next_timer: AtomicU64,
    counters: Counters,
}

/// Per-destination single-slot mailboxes with one-shot flush timers.
///
/// Cheap to clone; clones share the same mailboxes.
pub struct CoalescingRelay<C: Connection> {
    inner: Arc<Inner<C>>,
}

impl<C: Connection> Clone for CoalescingRelay<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> CoalescingRelay<C> {
    /// Creates a relay with no pending payloads.
    pub fn new(config: RelayConfig) -> Self {
        debug!(
            flush_ms = config.flush_interval.as_millis() as u64,
            max_buffered_bytes = config.max_buffered_bytes,
            "relay created"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                slots: Mutex::new(HashMap::new()),
                next_timer: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// Stores `payload` as the latest state for `dest`, replacing any
    /// payload still waiting, and arms a flush if none is pending.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn push(&self, dest: &Arc<C>, payload: Arc<[u8]>) {
        Counters::bump(&self.inner.counters.pushed);
        let id = dest.id();

        let mut slots = self.inner.slots.lock().await;
        if let Some(slot) = slots.get_mut(&id) {
            slot.payload = payload;
            Counters::bump(&self.inner.counters.coalesced);
            trace!(conn_id = %id, "pending payload superseded");
            return;
        }

        let timer = self.inner.next_timer.fetch_add(1, Ordering::Relaxed);
        slots.insert(
            id,
            Slot {
                conn: Arc::clone(dest),
                payload,
                timer,
            },
        );
        drop(slots);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.flush_interval).await;
            flush(&inner, id, timer).await;
        });
    }

    /// Drops any payload pending for `id`. Its armed timer, if any, will
    /// find nothing to send.
    pub async fn forget(&self, id: ConnectionId) {
        if self.inner.slots.lock().await.remove(&id).is_some() {
            trace!(conn_id = %id, "pending payload discarded");
        }
    }

    /// Number of destinations with a flush armed.
    pub async fn pending(&self) -> usize {
        self.inner.slots.lock().await.len()
    }

    /// Snapshot of the relay counters.
    pub fn stats(&self) -> RelayStats {
        self.inner.counters.snapshot()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }
}

async fn flush<C: Connection>(inner: &Inner<C>, id: ConnectionId, timer: u64) {
    let slot = {
        let mut slots = inner.slots.lock().await;
        match slots.get(&id) {
            Some(slot) if slot.timer == timer => slots.remove(&id),
            _ => None,
        }
    };
    let Some(Slot { conn, payload, .. }) = slot else {
        return;
    };

    let buffered = conn.buffered_amount();
    if buffered > inner.config.max_buffered_bytes {
        Counters::bump(&inner.counters.dropped_congested);
        debug!(conn_id = %id, buffered, "destination congested, update dropped");
        return;
    }

    match conn.send(&payload) {
        Ok(()) => Counters::bump(&inner.counters.delivered),
        Err(e) => {
            Counters::bump(&inner.counters.failed);
            debug!(conn_id = %id, error = %e, "relay send failed");
        }
    }
}
