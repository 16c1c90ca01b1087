//! Concurrent stress tests for the pool.
//!
//! Verifies that many tasks doing borrow/work/return cycles never hold more
//! items than the pool owns, never share an item, and never deadlock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use nebula_pool::pool::Pool;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Tracks how many items are held and by whom.
struct Tracker {
    held: AtomicUsize,
    peak: AtomicUsize,
    in_use: Vec<AtomicBool>,
}

impl Tracker {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            held: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            in_use: (0..capacity).map(|_| AtomicBool::new(false)).collect(),
        })
    }

    fn enter(&self, item: usize) {
        let now = self.held.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        assert!(
            !self.in_use[item].swap(true, Ordering::SeqCst),
            "item {item} issued to two borrowers at once"
        );
    }

    fn leave(&self, item: usize) {
        self.in_use[item].store(false, Ordering::SeqCst);
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn join_all_within(set: &mut JoinSet<()>, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while let Some(result) = tokio::time::timeout_at(deadline, set.join_next())
        .await
        .expect("stress test should not deadlock")
    {
        result.expect("task should not panic");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn twenty_borrowers_share_two_items() {
    let pool = Pool::new([0usize, 1]);
    let tracker = Tracker::new(2);
    let mut set = JoinSet::new();

    for i in 0..20u64 {
        let pool = pool.clone();
        let tracker = Arc::clone(&tracker);
        set.spawn(async move {
            let lease = pool.borrow().await.expect("borrow should succeed");
            tracker.enter(*lease);
            tokio::time::sleep(Duration::from_millis(i % 4)).await;
            tracker.leave(*lease);
            drop(lease);
        });
    }

    join_all_within(&mut set, Duration::from_secs(30)).await;

    assert!(tracker.peak.load(Ordering::SeqCst) <= 2);
    let stats = pool.stats();
    assert_eq!(stats.total_borrows, 20);
    assert_eq!(stats.total_returns, 20);
    assert_eq!(stats.available, 2);
    assert_eq!(stats.outstanding, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_50_tasks_random_borrow_return() {
    const CAPACITY: usize = 10;
    let pool = Pool::new(0..CAPACITY);
    let tracker = Tracker::new(CAPACITY);
    let success_count = Arc::new(AtomicU64::new(0));
    let mut set = JoinSet::new();

    for task in 0..50u64 {
        let pool = pool.clone();
        let tracker = Arc::clone(&tracker);
        let success_count = Arc::clone(&success_count);
        set.spawn(async move {
            for cycle in 0..20u64 {
                let lease = pool.borrow().await.expect("task should borrow");
                tracker.enter(*lease);
                if (task + cycle) % 3 == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                } else {
                    tokio::task::yield_now().await;
                }
                tracker.leave(*lease);
                if cycle % 2 == 0 {
                    pool.give_back(lease).expect("own lease is accepted");
                } else {
                    drop(lease);
                }
            }
            success_count.fetch_add(1, Ordering::SeqCst);
        });
    }

    join_all_within(&mut set, Duration::from_secs(30)).await;

    assert_eq!(success_count.load(Ordering::SeqCst), 50);
    assert!(tracker.peak.load(Ordering::SeqCst) <= CAPACITY);

    let stats = pool.stats();
    assert_eq!(stats.outstanding, 0);
    assert_eq!(stats.available, CAPACITY);
    // 50 tasks * 20 cycles = 1000 borrows
    assert_eq!(stats.total_borrows, 1000);
    assert_eq!(stats.total_returns, stats.total_borrows);
}
