//! `borrow_blocking` from plain OS threads, no runtime involved.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nebula_pool::error::Error;
use nebula_pool::pool::Pool;

#[test]
fn os_threads_share_two_items() {
    let pool = Pool::new([0usize, 1]);
    let held = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..10 {
                    let lease = pool.borrow_blocking().expect("borrow should succeed");
                    let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    held.fetch_sub(1, Ordering::SeqCst);
                    drop(lease);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread should not panic");
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
    let stats = pool.stats();
    assert_eq!(stats.total_borrows, 80);
    assert_eq!(stats.available, 2);
}

#[test]
fn close_releases_blocked_thread() {
    let pool = Pool::new([1]);
    let held = pool.try_borrow().unwrap();

    let p = pool.clone();
    let blocked = thread::spawn(move || p.borrow_blocking().map(|g| *g));

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.waiters() == 0 {
        assert!(Instant::now() < deadline, "thread never blocked");
        thread::sleep(Duration::from_millis(1));
    }

    pool.close();
    let result = blocked.join().unwrap();
    assert!(matches!(result, Err(Error::PoolClosed { .. })));
    drop(held);
}

#[test]
fn return_from_another_thread_unblocks() {
    let pool = Pool::new(["book"]);
    let held = pool.try_borrow().unwrap();

    let returner = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        drop(held);
    });

    let lease = pool.borrow_blocking().unwrap();
    assert_eq!(*lease, "book");
    returner.join().unwrap();
}
