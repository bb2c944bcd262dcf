//! Concurrency, queueing, and cancellation behavior of the pool.

use callguard_pool::{
    CancellationToken, ExecuteOptions, HostEnvironment, PoolConfig, PoolError, Priority,
};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type PoolResult = Result<(), PoolError<io::Error>>;

fn submit(
    pool: &callguard_pool::ConnectionPool,
    options: ExecuteOptions,
) -> (oneshot::Sender<()>, JoinHandle<PoolResult>) {
    let (trigger, gate) = oneshot::channel::<()>();
    let pool = pool.clone();
    let handle = tokio::spawn(async move {
        pool.execute_with(options, move || async move {
            gate.await.ok();
            Ok(())
        })
        .await
    });
    (trigger, handle)
}

// Lets spawned submissions reach their await points under a paused
// clock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Ten externally-gated submissions against four slots: exactly four in
/// flight and six queued; each completion starts exactly one more.
#[tokio::test(start_paused = true)]
async fn four_slots_ten_submissions() {
    let pool = PoolConfig::builder().max_concurrent(4).build();

    let mut triggers = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..10 {
        let (trigger, handle) = submit(&pool, ExecuteOptions::new());
        triggers.push(trigger);
        handles.push(handle);
    }
    settle().await;

    assert_eq!(pool.stats().in_flight, 4);
    assert_eq!(pool.stats().queued, 6);
    assert_eq!(pool.available_slots(), 0);

    // The first four submissions are the ones in flight; completing each
    // starts exactly one queued request.
    for expected_queued in [5, 4, 3, 2] {
        triggers.remove(0).send(()).unwrap();
        settle().await;
        assert_eq!(pool.stats().in_flight, 4);
        assert_eq!(pool.stats().queued, expected_queued);
    }

    for trigger in triggers {
        let _ = trigger.send(());
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }
    assert_eq!(pool.stats().processed, 10);
    assert_eq!(pool.stats().in_flight, 0);
}

/// A high-priority submission against a saturated pool dispatches before
/// normal and low work queued earlier.
#[tokio::test(start_paused = true)]
async fn high_priority_overtakes_the_queue() {
    let pool = PoolConfig::builder().max_concurrent(1).build();
    let (gate_trigger, gate_handle) = submit(&pool, ExecuteOptions::new());
    settle().await;

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for (label, priority) in [
        ("normal-1", Priority::Normal),
        ("low-1", Priority::Low),
        ("normal-2", Priority::Normal),
        ("high-1", Priority::High),
    ] {
        let order = Arc::clone(&order);
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.execute_with(
                ExecuteOptions::new().priority(priority),
                move || async move {
                    order.lock().unwrap().push(label);
                    Ok::<_, io::Error>(())
                },
            )
            .await
        }));
        // Queue one at a time so insertion order is fixed.
        settle().await;
    }

    gate_trigger.send(()).unwrap();
    gate_handle.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let order = order.lock().unwrap();
    assert_eq!(order[0], "high-1");
    assert!(order.iter().position(|l| *l == "low-1").unwrap() > 0);
}

/// Cancelling a queued request rejects only that request; everything
/// else dispatches normally.
#[tokio::test(start_paused = true)]
async fn queued_cancellation_is_surgical() {
    let pool = PoolConfig::builder().max_concurrent(1).build();
    let (gate_trigger, gate_handle) = submit(&pool, ExecuteOptions::new());
    settle().await;

    let token = CancellationToken::new();
    let (_doomed_trigger, doomed) = submit(&pool, ExecuteOptions::new().cancel(token.clone()));
    let (survivor_trigger, survivor) = submit(&pool, ExecuteOptions::new());
    settle().await;
    assert_eq!(pool.stats().queued, 2);

    token.cancel();
    settle().await;
    assert!(matches!(doomed.await.unwrap(), Err(PoolError::Aborted)));
    assert_eq!(pool.stats().queued, 1);

    gate_trigger.send(()).unwrap();
    gate_handle.await.unwrap().unwrap();
    survivor_trigger.send(()).unwrap();
    survivor.await.unwrap().unwrap();
    assert_eq!(pool.stats().cancelled, 1);
    assert_eq!(pool.stats().processed, 2);
}

/// The per-call timeout rejects the caller and frees the slot while the
/// operation runs on detached.
#[tokio::test(start_paused = true)]
async fn timeout_is_caller_side_only() {
    let pool = PoolConfig::builder()
        .max_concurrent(1)
        .default_timeout(Duration::from_secs(30))
        .build();

    let slow_done = Arc::new(Mutex::new(false));
    let probe = Arc::clone(&slow_done);
    let slow = {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.execute_with(
                ExecuteOptions::new().timeout(Duration::from_secs(2)),
                move || async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    *probe.lock().unwrap() = true;
                    Ok::<_, io::Error>(())
                },
            )
            .await
        })
    };
    settle().await;

    tokio::time::advance(Duration::from_secs(2)).await;
    let result = slow.await.unwrap();
    assert!(matches!(
        result,
        Err(PoolError::Timeout { timeout }) if timeout == Duration::from_secs(2)
    ));
    assert_eq!(pool.stats().timed_out, 1);
    assert_eq!(pool.available_slots(), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert!(*slow_done.lock().unwrap());
}

/// `clear_queue` rejects every waiter with a distinct error and reports
/// the count; in-flight work is untouched.
#[tokio::test(start_paused = true)]
async fn clearing_the_queue_is_not_an_operation_failure() {
    let pool = PoolConfig::builder().max_concurrent(1).build();
    let (gate_trigger, gate_handle) = submit(&pool, ExecuteOptions::new());
    settle().await;

    let mut queued = Vec::new();
    for _ in 0..3 {
        let (_t, handle) = submit(&pool, ExecuteOptions::new());
        queued.push(handle);
    }
    settle().await;

    assert_eq!(pool.clear_queue(), 3);
    assert_eq!(pool.clear_queue(), 0);
    for handle in queued {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PoolError::QueueCleared));
        // Distinguishable from a ran-and-failed error.
        assert!(err.is_pool_level());
    }

    gate_trigger.send(()).unwrap();
    gate_handle.await.unwrap().unwrap();
}

/// `wait_for_all` settles once in-flight work settles, whatever the
/// outcomes were.
#[tokio::test(start_paused = true)]
async fn wait_for_all_covers_mixed_outcomes() {
    let pool = PoolConfig::builder()
        .max_concurrent(3)
        .default_timeout(Duration::from_secs(5))
        .build();

    let ok = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.execute(|| async { Ok::<_, io::Error>(()) }).await })
    };
    let failing = {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.execute(|| async {
                Err::<(), _>(io::Error::new(io::ErrorKind::Other, "boom"))
            })
            .await
        })
    };
    let timing_out = {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, io::Error>(())
            })
            .await
        })
    };
    settle().await;

    tokio::time::advance(Duration::from_secs(5)).await;
    pool.wait_for_all().await;

    ok.await.unwrap().unwrap();
    assert!(failing.await.unwrap().is_err());
    assert!(matches!(
        timing_out.await.unwrap(),
        Err(PoolError::Timeout { .. })
    ));

    let stats = pool.stats();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.timed_out, 1);
}

/// Connectivity loss logs and pauses nothing by itself; a regain drains
/// immediately. Visibility loss pauses queued dispatch.
#[tokio::test(start_paused = true)]
async fn environment_signal_gates_the_queue() {
    let (env_tx, env_rx) = HostEnvironment::channel();
    let pool = PoolConfig::builder()
        .max_concurrent(1)
        .environment(env_rx)
        .build();

    let (gate_trigger, gate_handle) = submit(&pool, ExecuteOptions::new());
    settle().await;
    let (queued_trigger, queued_handle) = submit(&pool, ExecuteOptions::new());
    settle().await;

    env_tx
        .send(HostEnvironment {
            visible: false,
            online: true,
        })
        .unwrap();
    settle().await;

    gate_trigger.send(()).unwrap();
    gate_handle.await.unwrap().unwrap();
    settle().await;
    // Hidden: the free slot stays free, the queue stays put.
    assert_eq!(pool.stats().in_flight, 0);
    assert_eq!(pool.stats().queued, 1);

    env_tx
        .send(HostEnvironment {
            visible: true,
            online: true,
        })
        .unwrap();
    settle().await;
    assert_eq!(pool.stats().in_flight, 1);

    queued_trigger.send(()).unwrap();
    queued_handle.await.unwrap().unwrap();
    pool.shutdown();
}
