//! RAII lease over a borrowed pool item

use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::pool::Pool;

/// Identity of one successful borrow.
///
/// Unique across pools: it pairs the issuing pool's id with a per-pool
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId {
    pool: Uuid,
    seq: u64,
}

impl LeaseId {
    pub(crate) fn new(pool: Uuid, seq: u64) -> Self {
        Self { pool, seq }
    }

    /// Id of the pool that issued this lease.
    #[must_use]
    pub fn pool(&self) -> Uuid {
        self.pool
    }

    /// Per-pool sequence number, starting at 1.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pool, self.seq)
    }
}

/// RAII guard over one borrowed item.
///
/// Dropping the lease returns the item to the pool that issued it. Use
/// [`Pool::give_back`] for an explicit, validated return, or
/// [`into_parts`](Self::into_parts) to take the raw item out.
pub struct Lease<T: Send + 'static> {
    item: Option<T>,
    id: LeaseId,
    borrowed_at: Instant,
    pool: Pool<T>,
}

impl<T: Send + 'static> Lease<T> {
    pub(crate) fn new(item: T, id: LeaseId, pool: Pool<T>) -> Self {
        Self {
            item: Some(item),
            id,
            borrowed_at: Instant::now(),
            pool,
        }
    }

    /// This lease's id.
    #[must_use]
    pub fn id(&self) -> LeaseId {
        self.id
    }

    /// How long the item has been held.
    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.borrowed_at.elapsed()
    }

    /// Detach the raw item from the lease.
    ///
    /// The item stays on loan: the caller owes the pool exactly one
    /// [`Pool::return_item`] with the returned id.
    #[must_use]
    pub fn into_parts(mut self) -> (LeaseId, T) {
        let item = self.item.take().expect("lease used after release");
        (self.id, item)
    }

    /// Take the item out for a return, leaving the guard inert.
    pub(crate) fn release(&mut self) -> Option<T> {
        self.item.take()
    }
}

impl<T: Send + 'static> std::ops::Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("lease used after release")
    }
}

impl<T: Send + 'static> std::ops::DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("lease used after release")
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(item) = self.release() {
            // The id was issued by `self.pool`, so this cannot be rejected.
            let _ = self.pool.restore(self.id, item);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}
