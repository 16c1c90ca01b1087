//! Bounded pool over a fixed set of interchangeable items.
//!
//! Every idle item is backed by exactly one semaphore permit. A borrower
//! takes a permit first and only then pops an item under the slots lock;
//! a return pushes the item under the lock and only then releases the
//! permit, so a permit holder always finds an item waiting.

pub mod config;

use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore, SemaphorePermit, TryAcquireError, broadcast};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Rejected, Result};
use crate::events::{EventBus, PoolEvent};
use crate::lease::{Lease, LeaseId};

pub use config::{PoolConfig, Strategy};

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStats {
    /// Fixed number of items owned by the pool.
    pub capacity: usize,
    /// Items idle in the pool.
    pub available: usize,
    /// Items currently on loan.
    pub outstanding: usize,
    /// Borrowers waiting for a permit.
    pub waiters: usize,
    /// Total successful borrows.
    pub total_borrows: u64,
    /// Total accepted returns.
    pub total_returns: u64,
    /// Borrows that hit their deadline.
    pub timeouts: u64,
    /// Borrows abandoned through a cancellation token.
    pub cancellations: u64,
    /// Returns rejected as not issued by this pool.
    pub invalid_returns: u64,
    /// Whether the pool has been closed.
    pub closed: bool,
}

#[derive(Debug, Default)]
struct Counters {
    total_borrows: u64,
    total_returns: u64,
    timeouts: u64,
    cancellations: u64,
    invalid_returns: u64,
}

/// Everything guarded by the pool lock.
struct Slots<T> {
    available: VecDeque<T>,
    /// Live leases by sequence number, with their borrow time.
    outstanding: HashMap<u64, Instant>,
    next_seq: u64,
    closed: bool,
    counters: Counters,
}

impl<T> Slots<T> {
    fn checkout(&mut self, strategy: Strategy) -> Option<(u64, T)> {
        let item = match strategy {
            Strategy::Fifo => self.available.pop_front(),
            Strategy::Lifo => self.available.pop_back(),
        }?;
        self.next_seq += 1;
        self.outstanding.insert(self.next_seq, Instant::now());
        self.counters.total_borrows += 1;
        Some((self.next_seq, item))
    }

    /// Put `item` back if `seq` is on loan; hand it back otherwise.
    fn checkin(&mut self, seq: u64, item: T) -> std::result::Result<Duration, T> {
        match self.outstanding.remove(&seq) {
            Some(borrowed_at) => {
                self.available.push_back(item);
                self.counters.total_returns += 1;
                Ok(borrowed_at.elapsed())
            }
            None => Err(item),
        }
    }
}

/// Inner shared state for the pool.
struct PoolInner<T> {
    id: Uuid,
    config: PoolConfig,
    capacity: usize,
    slots: Mutex<Slots<T>>,
    /// One permit per idle item.
    semaphore: Semaphore,
    waiters: AtomicUsize,
    events: EventBus,
    /// Signalled on every return after close, for `drain`.
    returned: Notify,
}

/// Counts a borrower as waiting for as long as it is alive.
struct WaiterGuard<'a>(&'a AtomicUsize);

impl<'a> WaiterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> (Self, usize) {
        let waiters = counter.fetch_add(1, Ordering::SeqCst) + 1;
        (Self(counter), waiters)
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Pool<T>
// ---------------------------------------------------------------------------

/// Fixed-capacity pool of reusable items with blocking borrow.
///
/// `Pool` is a cheap handle; clones share the same items. Construct it once
/// at the composition root and pass clones to every consumer.
///
/// A pool built from an empty item set is legal, but every borrow that
/// waits without a deadline will wait until the pool is closed.
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.config.name)
            .field("id", &self.inner.id)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool owning `items`, with the default configuration.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self::build(items, PoolConfig::default())
    }

    /// Create a pool owning `items`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` is invalid.
    pub fn with_config(items: impl IntoIterator<Item = T>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(items, config))
    }

    fn build(items: impl IntoIterator<Item = T>, config: PoolConfig) -> Self {
        let available: VecDeque<T> = items.into_iter().collect();
        let capacity = available.len();
        tracing::debug!(pool = %config.name, capacity, "pool created");
        Self {
            inner: Arc::new(PoolInner {
                id: Uuid::new_v4(),
                capacity,
                slots: Mutex::new(Slots {
                    available,
                    outstanding: HashMap::with_capacity(capacity),
                    next_seq: 0,
                    closed: false,
                    counters: Counters::default(),
                }),
                semaphore: Semaphore::new(capacity),
                waiters: AtomicUsize::new(0),
                events: EventBus::new(config.event_buffer),
                returned: Notify::new(),
                config,
            }),
        }
    }

    // -- borrow -------------------------------------------------------------

    /// Borrow an item, waiting while every item is on loan.
    ///
    /// Waits at most `acquire_timeout` from the config, or forever when
    /// none is set.
    pub async fn borrow(&self) -> Result<Lease<T>> {
        self.acquire(self.inner.config.acquire_timeout, None).await
    }

    /// Borrow an item, giving up with [`Error::Timeout`] after `timeout`.
    pub async fn borrow_timeout(&self, timeout: Duration) -> Result<Lease<T>> {
        self.acquire(Some(timeout), None).await
    }

    /// Borrow an item, giving up with [`Error::Cancelled`] when `token`
    /// fires. The configured `acquire_timeout` still applies.
    ///
    /// An abandoned wait never consumes a permit.
    pub async fn borrow_cancellable(&self, token: &CancellationToken) -> Result<Lease<T>> {
        self.acquire(self.inner.config.acquire_timeout, Some(token))
            .await
    }

    /// Borrow an item without waiting.
    ///
    /// # Errors
    /// Returns [`Error::Exhausted`] when every item is on loan.
    pub fn try_borrow(&self) -> Result<Lease<T>> {
        let inner = &*self.inner;
        match inner.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.checkout(Duration::ZERO)
            }
            Err(TryAcquireError::Closed) => Err(Error::closed(&inner.config.name)),
            Err(TryAcquireError::NoPermits) => {
                let waiters = inner.waiters.load(Ordering::SeqCst);
                inner.events.emit(PoolEvent::Exhausted {
                    pool: inner.config.name.clone(),
                    waiters,
                });
                Err(Error::Exhausted {
                    pool: inner.config.name.clone(),
                    capacity: inner.capacity,
                    waiters,
                })
            }
        }
    }

    /// Borrow an item, blocking the calling thread until one is free or the
    /// pool is closed.
    ///
    /// Meant for plain OS threads; it needs no runtime and ignores
    /// `acquire_timeout`. Do not call it from an async task.
    pub fn borrow_blocking(&self) -> Result<Lease<T>> {
        futures::executor::block_on(self.acquire(None, None))
    }

    async fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Lease<T>> {
        let inner = &*self.inner;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(self.cancelled());
        }

        let started = Instant::now();
        let permit = match inner.semaphore.try_acquire() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(Error::closed(&inner.config.name)),
            Err(TryAcquireError::NoPermits) => {
                let (_waiting, waiters) = WaiterGuard::enter(&inner.waiters);
                tracing::trace!(pool = %inner.config.name, waiters, "pool exhausted, waiting");
                inner.events.emit(PoolEvent::Exhausted {
                    pool: inner.config.name.clone(),
                    waiters,
                });
                self.wait_for_permit(timeout, cancel, started).await?
            }
        };

        // The permit travels with the item; the return path adds it back.
        permit.forget();
        self.checkout(started.elapsed())
    }

    async fn wait_for_permit(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
        started: Instant,
    ) -> Result<SemaphorePermit<'_>> {
        let inner = &*self.inner;
        let acquire = async {
            let acquired = match timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, inner.semaphore.acquire()).await {
                        Ok(acquired) => acquired,
                        Err(_) => return Err(self.timed_out(limit, started.elapsed())),
                    }
                }
                None => inner.semaphore.acquire().await,
            };
            acquired.map_err(|_| Error::closed(&inner.config.name))
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(self.cancelled()),
                acquired = acquire => acquired,
            },
            None => acquire.await,
        }
    }

    fn checkout(&self, waited: Duration) -> Result<Lease<T>> {
        let inner = &*self.inner;
        let taken = {
            let mut slots = inner.slots.lock();
            if slots.closed {
                return Err(Error::closed(&inner.config.name));
            }
            slots.checkout(inner.config.strategy)
        };
        let Some((seq, item)) = taken else {
            return Err(Error::internal(
                &inner.config.name,
                "permit acquired with no idle item",
            ));
        };

        let id = LeaseId::new(inner.id, seq);
        tracing::debug!(
            pool = %inner.config.name,
            lease = %id,
            waited_ms = waited.as_millis() as u64,
            "item borrowed"
        );
        inner.events.emit(PoolEvent::Borrowed {
            pool: inner.config.name.clone(),
            lease: id,
            waited,
        });
        Ok(Lease::new(item, id, self.clone()))
    }

    fn timed_out(&self, limit: Duration, waited: Duration) -> Error {
        let inner = &*self.inner;
        inner.slots.lock().counters.timeouts += 1;
        tracing::warn!(
            pool = %inner.config.name,
            timeout_ms = limit.as_millis() as u64,
            "borrow timed out"
        );
        inner.events.emit(PoolEvent::TimedOut {
            pool: inner.config.name.clone(),
            waited,
        });
        Error::timeout(&inner.config.name, limit)
    }

    fn cancelled(&self) -> Error {
        let inner = &*self.inner;
        inner.slots.lock().counters.cancellations += 1;
        tracing::warn!(pool = %inner.config.name, "borrow cancelled");
        inner.events.emit(PoolEvent::Cancelled {
            pool: inner.config.name.clone(),
        });
        Error::cancelled(&inner.config.name)
    }

    // -- return -------------------------------------------------------------

    /// Return a leased item explicitly.
    ///
    /// Equivalent to dropping the lease, except that a lease issued by a
    /// different pool is reported as [`Error::InvalidReturn`]. That lease is
    /// then dropped, which sends its item home to the pool that issued it.
    pub fn give_back(&self, mut lease: Lease<T>) -> Result<()> {
        let id = lease.id();
        if id.pool() != self.inner.id {
            return Err(self.invalid_return(id));
        }
        match lease.release() {
            Some(item) => self.restore(id, item).map_err(Error::from),
            None => Ok(()),
        }
    }

    /// Return a raw item detached with [`Lease::into_parts`].
    ///
    /// # Errors
    /// Rejects the return with [`Error::InvalidReturn`] when `id` was not
    /// issued by this pool or has already been returned. The item is handed
    /// back inside [`Rejected`].
    pub fn return_item(&self, id: LeaseId, item: T) -> std::result::Result<(), Rejected<T>> {
        self.restore(id, item)
    }

    pub(crate) fn restore(&self, id: LeaseId, item: T) -> std::result::Result<(), Rejected<T>> {
        let inner = &*self.inner;
        if id.pool() != inner.id {
            return Err(Rejected::new(item, self.invalid_return(id)));
        }

        let checked_in = {
            let mut slots = inner.slots.lock();
            let closed = slots.closed;
            slots.checkin(id.seq(), item).map(|held_for| (held_for, closed))
        };
        let (held_for, closed) = match checked_in {
            Ok(accepted) => accepted,
            Err(item) => return Err(Rejected::new(item, self.invalid_return(id))),
        };

        if closed {
            inner.returned.notify_waiters();
        } else {
            inner.semaphore.add_permits(1);
        }

        tracing::debug!(
            pool = %inner.config.name,
            lease = %id,
            held_ms = held_for.as_millis() as u64,
            "item returned"
        );
        inner.events.emit(PoolEvent::Returned {
            pool: inner.config.name.clone(),
            lease: id,
            held_for,
        });
        Ok(())
    }

    fn invalid_return(&self, lease: LeaseId) -> Error {
        let inner = &*self.inner;
        inner.slots.lock().counters.invalid_returns += 1;
        tracing::warn!(pool = %inner.config.name, lease = %lease, "rejected invalid return");
        inner.events.emit(PoolEvent::InvalidReturn {
            pool: inner.config.name.clone(),
            lease,
        });
        Error::invalid_return(&inner.config.name, lease)
    }

    // -- shutdown -----------------------------------------------------------

    /// Close the pool.
    ///
    /// Pending and future borrows fail with [`Error::PoolClosed`]. Items on
    /// loan may still be returned; they are kept for [`drain`](Self::drain).
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let inner = &*self.inner;
        let outstanding = {
            let mut slots = inner.slots.lock();
            if slots.closed {
                return;
            }
            slots.closed = true;
            slots.outstanding.len()
        };
        inner.semaphore.close();
        inner.returned.notify_waiters();

        tracing::info!(pool = %inner.config.name, outstanding, "pool closed");
        inner.events.emit(PoolEvent::Closed {
            pool: inner.config.name.clone(),
            outstanding,
        });
    }

    /// Close the pool, wait for every lease to come back, and take all
    /// items out.
    ///
    /// Concurrent callers all finish; the first to observe the empty loan
    /// book gets the items, the rest get an empty vec.
    pub async fn drain(&self) -> Vec<T> {
        self.close();
        let inner = &*self.inner;
        loop {
            let mut notified = pin!(inner.returned.notified());
            notified.as_mut().enable();
            {
                let mut slots = inner.slots.lock();
                if slots.outstanding.is_empty() {
                    return slots.available.drain(..).collect();
                }
            }
            notified.await;
        }
    }

    // -- introspection ------------------------------------------------------

    /// Identity of this pool. Every lease it issues carries it.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Pool name from the config.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Fixed number of items owned by the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Items idle in the pool right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.slots.lock().available.len()
    }

    /// Items on loan right now.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.slots.lock().outstanding.len()
    }

    /// Borrowers waiting for a permit right now.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.inner.waiters.load(Ordering::SeqCst)
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.slots.lock().closed
    }

    /// Snapshot of the pool state, taken under the pool lock.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = &*self.inner;
        let slots = inner.slots.lock();
        PoolStats {
            capacity: inner.capacity,
            available: slots.available.len(),
            outstanding: slots.outstanding.len(),
            waiters: inner.waiters.load(Ordering::SeqCst),
            total_borrows: slots.counters.total_borrows,
            total_returns: slots.counters.total_returns,
            timeouts: slots.counters.timeouts,
            cancellations: slots.counters.cancellations,
            invalid_returns: slots.counters.invalid_returns,
            closed: slots.closed,
        }
    }

    /// Subscribe to this pool's events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }
}
