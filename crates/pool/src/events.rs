//! Event broadcasting for pool observability.
//!
//! Provides [`PoolEvent`] variants emitted during borrow/return and an
//! [`EventBus`] backed by `tokio::sync::broadcast`.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::lease::LeaseId;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted by a [`Pool`](crate::Pool).
///
/// All variants carry the `pool` name. Subscribers receive cloned copies via
/// [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// An item was handed to a borrower.
    Borrowed {
        /// The pool name.
        pool: String,
        /// The new lease.
        lease: LeaseId,
        /// How long the borrower waited for a permit.
        waited: Duration,
    },
    /// An item came back to the pool.
    Returned {
        /// The pool name.
        pool: String,
        /// The lease that ended.
        lease: LeaseId,
        /// How long the item was held.
        held_for: Duration,
    },
    /// A borrower found every item checked out.
    Exhausted {
        /// The pool name.
        pool: String,
        /// Borrowers waiting, including this one.
        waiters: usize,
    },
    /// A borrower gave up at its deadline.
    TimedOut {
        /// The pool name.
        pool: String,
        /// How long it waited.
        waited: Duration,
    },
    /// A borrower's cancellation token fired while waiting.
    Cancelled {
        /// The pool name.
        pool: String,
    },
    /// A return was rejected.
    InvalidReturn {
        /// The pool name.
        pool: String,
        /// The unrecognised lease.
        lease: LeaseId,
    },
    /// The pool was closed.
    Closed {
        /// The pool name.
        pool: String,
        /// Items still on loan at the time of closing.
        outstanding: usize,
    },
}

impl PoolEvent {
    /// Name of the pool that emitted this event.
    #[must_use]
    pub fn pool(&self) -> &str {
        match self {
            Self::Borrowed { pool, .. }
            | Self::Returned { pool, .. }
            | Self::Exhausted { pool, .. }
            | Self::TimedOut { pool, .. }
            | Self::Cancelled { pool }
            | Self::InvalidReturn { pool, .. }
            | Self::Closed { pool, .. } => pool,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are silently dropped (no backpressure on the
/// emitter).
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    ///
    /// # Panics
    /// Panics if `buffer_size` is zero.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // Ignore the error — it just means there are no active receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    ///
    /// A subscriber that falls behind by more than `buffer_size` events
    /// receives a `Lagged` error and skips to the latest.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
