//! Full lifecycle of the circuit breaker across its three states.

use callguard_circuitbreaker::{
    BreakerConfig, BreakerError, CircuitBreaker, CircuitState, ClassifyError, ErrorClass,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, PartialEq)]
struct UpstreamError;

impl ClassifyError for UpstreamError {
    fn error_class(&self) -> ErrorClass {
        ErrorClass::Server
    }
}

fn breaker(threshold: u32, open_timeout: Duration) -> CircuitBreaker {
    BreakerConfig::builder()
        .failure_threshold(threshold)
        .open_timeout(open_timeout)
        .monitor_interval(None)
        .name("lifecycle")
        .build()
}

async fn fail(breaker: &CircuitBreaker) {
    let _ = breaker
        .execute(|| async { Err::<(), _>(UpstreamError) })
        .await;
}

/// Closed -> Open at exactly the threshold, not a call earlier.
#[tokio::test(start_paused = true)]
async fn opens_at_exactly_the_threshold() {
    let breaker = breaker(3, Duration::from_secs(30));

    fail(&breaker).await;
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Closed);

    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

/// A success before the threshold resets the streak; the breaker stays
/// closed through an alternating workload.
#[tokio::test(start_paused = true)]
async fn intervening_success_resets_the_streak() {
    let breaker = breaker(3, Duration::from_secs(30));

    for _ in 0..5 {
        fail(&breaker).await;
        fail(&breaker).await;
        breaker
            .execute(|| async { Ok::<_, UpstreamError>(()) })
            .await
            .unwrap();
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().consecutive_failures, 0);
}

/// While open every call is rejected without running; the first call
/// after the cooldown is the half-open trial and runs.
#[tokio::test(start_paused = true)]
async fn open_rejects_until_the_cooldown_elapses() {
    let breaker = breaker(1, Duration::from_secs(30));
    fail(&breaker).await;

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let probe = Arc::clone(&ran);
        let result = breaker
            .execute(move || {
                probe.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, UpstreamError>(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        tokio::time::advance(Duration::from_secs(5)).await;
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    // 15s elapsed; wait out the remainder.
    tokio::time::advance(Duration::from_secs(15)).await;
    let probe = Arc::clone(&ran);
    breaker
        .execute(move || {
            probe.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, UpstreamError>(()) }
        })
        .await
        .unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// A failed trial reopens the circuit and restarts the full cooldown.
#[tokio::test(start_paused = true)]
async fn failed_trial_restarts_the_cooldown() {
    let breaker = breaker(1, Duration::from_secs(20));
    fail(&breaker).await;

    tokio::time::advance(Duration::from_secs(20)).await;
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.time_until_close(), Some(Duration::from_secs(20)));

    // Half the new cooldown is not enough.
    tokio::time::advance(Duration::from_secs(10)).await;
    let result = breaker
        .execute(|| async { Ok::<_, UpstreamError>(()) })
        .await;
    assert!(matches!(result, Err(BreakerError::Open { .. })));
}

/// Repeated open/close cycles keep working; the breaker carries no
/// stale state from one incident to the next.
#[tokio::test(start_paused = true)]
async fn survives_repeated_incident_cycles() {
    let breaker = breaker(2, Duration::from_secs(10));

    for _ in 0..3 {
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        breaker
            .execute(|| async { Ok::<_, UpstreamError>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().failures, 0);
    }
}

/// The background monitor half-opens an idle breaker with no call
/// traffic at all.
#[tokio::test]
async fn monitor_drives_recovery_without_traffic() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let breaker = BreakerConfig::builder()
        .failure_threshold(1)
        .open_timeout(Duration::from_millis(50))
        .monitor_interval(Some(Duration::from_millis(10)))
        .name("monitored")
        .build();

    fail(&breaker).await;
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    breaker.shutdown();
}

/// Classification shortcut: one resource-exhaustion failure opens the
/// circuit regardless of the threshold.
#[tokio::test(start_paused = true)]
async fn exhaustion_collapses_the_threshold() {
    #[derive(Debug)]
    struct OutOfQuota;
    impl ClassifyError for OutOfQuota {
        fn error_class(&self) -> ErrorClass {
            ErrorClass::ResourceExhaustion
        }
    }

    let breaker = BreakerConfig::builder()
        .failure_threshold(10)
        .monitor_interval(None)
        .build();
    let _ = breaker
        .execute(|| async { Err::<(), _>(OutOfQuota) })
        .await;
    assert!(breaker.is_open());
}

/// `io::Error` classification is built in: a refused connection counts
/// as resource exhaustion.
#[tokio::test(start_paused = true)]
async fn io_errors_classify_out_of_the_box() {
    let breaker = BreakerConfig::builder()
        .failure_threshold(10)
        .monitor_interval(None)
        .build();
    let _ = breaker
        .execute(|| async {
            Err::<(), _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))
        })
        .await;
    assert!(breaker.is_open());
}
