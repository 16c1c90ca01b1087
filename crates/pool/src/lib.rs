//! # Nebula Pool
//!
//! Bounded concurrent pool over a fixed set of interchangeable items.
//!
//! Borrowers take an item, work with it, and give it back; a borrower that
//! finds every item on loan waits until one is returned. Waits can be
//! bounded by a deadline, cut short by a [`CancellationToken`], or ended
//! for everyone by closing the pool.
//!
//! ```rust,no_run
//! use nebula_pool::{Pool, PoolConfig};
//!
//! # async fn demo() -> nebula_pool::Result<()> {
//! let pool = Pool::with_config(["conn-a", "conn-b"], PoolConfig::named("conns"))?;
//! let lease = pool.borrow().await?;
//! assert!(lease.starts_with("conn-"));
//! drop(lease); // back in the pool
//! # Ok(())
//! # }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod error;
pub mod events;
pub mod lease;
pub mod pool;

pub use error::{Error, Rejected, Result};
pub use events::{EventBus, PoolEvent};
pub use lease::{Lease, LeaseId};
pub use pool::{Pool, PoolConfig, PoolStats, Strategy};
