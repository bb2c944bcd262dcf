//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - The circuit opens after exactly `threshold` consecutive failures
//! - Interleaved successes keep the circuit closed indefinitely
//! - Totals are monotone regardless of state churn

use super::paused_runtime;
use callguard_circuitbreaker::{BreakerConfig, CircuitState, ClassifyError};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug)]
struct Flaky;
impl ClassifyError for Flaky {}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: exactly `threshold` consecutive failures open the
    /// circuit, one fewer does not.
    #[test]
    fn opens_at_exactly_the_threshold(threshold in 1u32..=20) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = BreakerConfig::builder()
                .failure_threshold(threshold)
                .monitor_interval(None)
                .build();

            for i in 0..threshold {
                prop_assert_eq!(breaker.state(), CircuitState::Closed, "failed at {}", i);
                let _ = breaker.execute(|| async { Err::<(), _>(Flaky) }).await;
            }
            prop_assert_eq!(breaker.state(), CircuitState::Open);
            Ok(())
        })?;
    }

    /// Property: any workload where failure runs stay strictly below the
    /// threshold never opens the circuit.
    #[test]
    fn sub_threshold_runs_never_open(
        threshold in 2u32..=10,
        rounds in 1usize..=20,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = BreakerConfig::builder()
                .failure_threshold(threshold)
                .monitor_interval(None)
                .build();

            for _ in 0..rounds {
                for _ in 0..threshold - 1 {
                    let _ = breaker.execute(|| async { Err::<(), _>(Flaky) }).await;
                }
                breaker
                    .execute(|| async { Ok::<_, Flaky>(()) })
                    .await
                    .expect("closed breaker admits");
            }
            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            Ok(())
        })?;
    }

    /// Property: total counters equal the submitted workload no matter
    /// how the state churned along the way.
    #[test]
    fn totals_are_an_exact_ledger(
        failures in 1u32..=5,
        successes in 1u32..=5,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            // Threshold high enough that the circuit never opens, so
            // every submitted call is recorded.
            let breaker = BreakerConfig::builder()
                .failure_threshold(100)
                .open_timeout(Duration::from_secs(1))
                .monitor_interval(None)
                .build();

            for _ in 0..failures {
                let _ = breaker.execute(|| async { Err::<(), _>(Flaky) }).await;
            }
            for _ in 0..successes {
                let _ = breaker.execute(|| async { Ok::<_, Flaky>(()) }).await;
            }

            let stats = breaker.stats();
            prop_assert_eq!(stats.total_failures, failures as u64);
            prop_assert_eq!(stats.total_successes, successes as u64);
            prop_assert_eq!(stats.total_requests, (failures + successes) as u64);
            Ok(())
        })?;
    }
}
