//! Property tests for the connection pool.
//!
//! Invariants tested:
//! - In-flight never exceeds the configured cap
//! - Every submission settles exactly once
//! - Queue accounting drains to zero

use super::paused_runtime;
use callguard_pool::PoolConfig;
use proptest::prelude::*;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: concurrent in-flight work never exceeds the cap, and
    /// every submission completes.
    #[test]
    fn cap_holds_under_arbitrary_load(
        max_concurrent in 1usize..=8,
        submissions in 1usize..=40,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let pool = PoolConfig::builder()
                .max_concurrent(max_concurrent)
                .build();

            let live = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..submissions {
                let live = Arc::clone(&live);
                let peak = Arc::clone(&peak);
                let pool = pool.clone();
                handles.push(tokio::spawn(async move {
                    pool.execute(move || async move {
                        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        live.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, io::Error>(())
                    })
                    .await
                }));
            }
            for handle in handles {
                handle.await.expect("join").expect("pooled call");
            }

            prop_assert!(peak.load(Ordering::SeqCst) <= max_concurrent);
            let stats = pool.stats();
            prop_assert_eq!(stats.processed, submissions as u64);
            prop_assert_eq!(stats.in_flight, 0);
            prop_assert_eq!(stats.queued, 0);
            Ok(())
        })?;
    }
}
