//! Lending desk over a pool of books.
//!
//! The desk owns the shelf and a ledger of who holds which copy. It is built
//! once by the caller and shared through `Arc`; there is no global desk.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use nebula_pool::{Lease, Pool, PoolConfig, PoolStats};
use rand::Rng;
use tokio::task::JoinSet;

use crate::book::Book;
use crate::error::Result;

#[derive(Debug, Default, Clone)]
struct Ledger {
    checkout_count: u64,
    reader: Option<String>,
}

// ---------------------------------------------------------------------------
// LendingDesk
// ---------------------------------------------------------------------------

pub struct LendingDesk {
    pool: Pool<Book>,
    ledger: Arc<DashMap<u32, Ledger>>,
    /// Stock numbers in shelf order, for reporting.
    catalogue: Vec<u32>,
}

impl LendingDesk {
    pub fn new(books: Vec<Book>, config: PoolConfig) -> Result<Self> {
        let catalogue: Vec<u32> = books.iter().map(|b| b.stock_number).collect();
        let ledger = catalogue
            .iter()
            .map(|&n| (n, Ledger::default()))
            .collect::<DashMap<_, _>>();
        let pool = Pool::with_config(books, config)?;
        tracing::debug!(copies = catalogue.len(), "lending desk opened");
        Ok(Self {
            pool,
            ledger: Arc::new(ledger),
            catalogue,
        })
    }

    /// Check a book out to `reader`, waiting for a free copy.
    pub async fn checkout(&self, reader: impl Into<String>) -> Result<Checkout> {
        let lease = self.pool.borrow().await?;
        Ok(self.record(lease, reader.into()))
    }

    /// Check a book out only if a copy is free right now.
    pub fn try_checkout(&self, reader: impl Into<String>) -> Result<Checkout> {
        let lease = self.pool.try_borrow()?;
        Ok(self.record(lease, reader.into()))
    }

    fn record(&self, lease: Lease<Book>, reader: String) -> Checkout {
        let mut entry = self.ledger.entry(lease.stock_number).or_default();
        entry.checkout_count += 1;
        entry.reader = Some(reader.clone());
        drop(entry);
        tracing::info!(reader = %reader, book = lease.stock_number, "book checked out");
        Checkout {
            lease: Some(lease),
            reader,
            ledger: Arc::clone(&self.ledger),
        }
    }

    /// Hand a book back to the shelf.
    pub fn return_book(&self, mut checkout: Checkout) -> Result<()> {
        match checkout.lease.take() {
            Some(lease) => {
                checkout.clear_reader(lease.stock_number);
                tracing::info!(reader = %checkout.reader, book = lease.stock_number, "book returned");
                self.pool.give_back(lease)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Per-copy usage, in shelf order.
    pub fn report(&self) -> Vec<BookReport> {
        self.catalogue
            .iter()
            .map(|&stock_number| {
                let ledger = self
                    .ledger
                    .get(&stock_number)
                    .map(|l| l.clone())
                    .unwrap_or_default();
                BookReport {
                    stock_number,
                    checkout_count: ledger.checkout_count,
                    reader: ledger.reader,
                }
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool(&self) -> &Pool<Book> {
        &self.pool
    }

    /// Stop lending, wait for every copy to come back, and take the shelf.
    pub async fn close(&self) -> Vec<Book> {
        self.pool.drain().await
    }
}

impl fmt::Debug for LendingDesk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LendingDesk")
            .field("pool", &self.pool)
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// A book in a reader's hands.
///
/// Dropping it returns the book, same as [`LendingDesk::return_book`].
pub struct Checkout {
    lease: Option<Lease<Book>>,
    reader: String,
    ledger: Arc<DashMap<u32, Ledger>>,
}

impl Checkout {
    pub fn reader(&self) -> &str {
        &self.reader
    }

    fn clear_reader(&self, stock_number: u32) {
        if let Some(mut entry) = self.ledger.get_mut(&stock_number) {
            // Clear before the copy goes back so the next reader's entry survives.
            entry.reader = None;
        }
    }
}

impl std::ops::Deref for Checkout {
    type Target = Book;

    fn deref(&self) -> &Book {
        self.lease.as_ref().expect("checkout used after return")
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.clear_reader(lease.stock_number);
            drop(lease);
        }
    }
}

impl fmt::Debug for Checkout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("reader", &self.reader)
            .field("book", &self.lease.as_ref().map(|l| l.stock_number))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookReport {
    pub stock_number: u32,
    pub checkout_count: u64,
    /// Current holder, `None` when on the shelf.
    pub reader: Option<String>,
}

impl fmt::Display for BookReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Book #{}: checked out {} times, ",
            self.stock_number, self.checkout_count
        )?;
        match &self.reader {
            Some(reader) => write!(f, "checked out to {reader}"),
            None => write!(f, "in stock"),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Readers that checked out and returned a book.
    pub completed: usize,
    /// Readers that never got a book (timeout, closed desk, panic).
    pub failed: usize,
    /// Most books in readers' hands at once.
    pub peak_outstanding: usize,
}

/// Spawn `readers` concurrent readers. Each checks out one book, keeps it
/// for a random time up to `max_hold`, and returns it.
pub async fn run_readers(desk: Arc<LendingDesk>, readers: usize, max_hold: Duration) -> RunSummary {
    let held = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut set = JoinSet::new();

    for i in 1..=readers {
        let desk = Arc::clone(&desk);
        let held = Arc::clone(&held);
        let peak = Arc::clone(&peak);
        let hold = random_hold(max_hold);
        set.spawn(async move {
            let checkout = desk.checkout(format!("reader:{i}")).await?;
            let now = held.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(hold).await;

            held.fetch_sub(1, Ordering::SeqCst);
            desk.return_book(checkout)
        });
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(())) => summary.completed += 1,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "reader went home empty-handed");
                summary.failed += 1;
            }
            Err(err) => {
                tracing::error!(error = %err, "reader task failed");
                summary.failed += 1;
            }
        }
    }
    summary.peak_outstanding = peak.load(Ordering::SeqCst);
    summary
}

fn random_hold(max_hold: Duration) -> Duration {
    let max_ms = max_hold.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
