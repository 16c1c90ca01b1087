//! End-to-end borrow/return scenarios on small pools.

use std::time::Duration;

use nebula_pool::error::Error;
use nebula_pool::pool::{Pool, PoolConfig};
use tokio::sync::Barrier;

async fn wait_for_waiters<T: Send + 'static>(pool: &Pool<T>, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while pool.waiters() < n {
        assert!(tokio::time::Instant::now() < deadline, "waiter never parked");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Two items A and B: both go out, a third borrower waits, and returning A
/// hands A to the waiter.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn third_borrower_receives_returned_item() {
    let pool = Pool::new(["A", "B"]);

    let a = pool.borrow().await.unwrap();
    let b = pool.borrow().await.unwrap();
    assert_eq!((*a, *b), ("A", "B"));

    let p = pool.clone();
    let third = tokio::spawn(async move { p.borrow().await });
    wait_for_waiters(&pool, 1).await;
    assert!(!third.is_finished());

    pool.give_back(a).unwrap();
    let c = third.await.unwrap().unwrap();
    assert_eq!(*c, "A");

    drop(b);
    let stats = pool.stats();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.outstanding, 1);
    assert_eq!(*pool.try_borrow().unwrap(), "B");
}

/// Taking two items from two pools in opposite orders deadlocks; a borrow
/// deadline breaks the cycle and both pools recover.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn opposite_order_multi_borrow_recovers_with_timeout() {
    let config = PoolConfig::named("left").with_acquire_timeout(Duration::from_millis(100));
    let left = Pool::with_config(["L"], config).unwrap();
    let config = PoolConfig::named("right").with_acquire_timeout(Duration::from_millis(100));
    let right = Pool::with_config(["R"], config).unwrap();
    let barrier = std::sync::Arc::new(Barrier::new(2));

    let task = |first: Pool<&'static str>, second: Pool<&'static str>, barrier: std::sync::Arc<Barrier>| async move {
        let _held = first.borrow().await.unwrap();
        barrier.wait().await;
        second.borrow().await.map(|lease| *lease)
    };

    let one = tokio::spawn(task(left.clone(), right.clone(), barrier.clone()));
    let two = tokio::spawn(task(right.clone(), left.clone(), barrier));

    let one = one.await.unwrap();
    let two = two.await.unwrap();
    assert!(
        matches!(one, Err(Error::Timeout { .. })) || matches!(two, Err(Error::Timeout { .. })),
        "at least one side must hit its deadline: {one:?} / {two:?}"
    );

    assert_eq!(left.available(), 1);
    assert_eq!(right.available(), 1);
}

#[tokio::test]
async fn zero_capacity_pool_waits_until_closed() {
    let pool: Pool<u8> = Pool::new(Vec::new());

    let err = pool
        .borrow_timeout(Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    let p = pool.clone();
    let waiting = tokio::spawn(async move { p.borrow().await.map(|g| *g) });
    wait_for_waiters(&pool, 1).await;
    pool.close();
    assert!(matches!(waiting.await.unwrap(), Err(Error::PoolClosed { .. })));
}
