// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! parallel.rs
//!
//! Bounded-concurrency execution of independent lookups.
//!
//! Every unit runs in isolation under its own timeout. A unit that fails, times out, or is
//! cancelled produces an error for that unit only; the batch always yields exactly one result
//! per unit, in completion order.

use std::{fmt, future::Future, time::Duration};

use {
    futures::stream::{self, StreamExt},
    tokio_util::sync::CancellationToken,
};

use crate::{config::WatcherConfig, error::WatchError};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum number of units in flight at once.
    pub parallelism: usize,
    /// Time limit for each unit.
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&WatcherConfig::default())
    }
}

impl BatchOptions {
    pub fn from_config(conf: &WatcherConfig) -> Self {
        BatchOptions {
            parallelism: conf.parallelism,
            timeout: conf.lookup_timeout(),
        }
    }
}

/// Run `work` once for each of `units`, at most `options.parallelism` at a time.
///
/// Cancelling `cancel` makes every unfinished unit fail with `WatchError::Cancelled`.
pub async fn run_batch<K, T, F, Fut>(
    units: Vec<K>,
    options: &BatchOptions,
    cancel: &CancellationToken,
    work: F,
) -> Vec<(K, Result<T, WatchError>)>
where
    K: Clone + fmt::Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, WatchError>>,
{
    let work = &work;
    stream::iter(units)
        .map(|unit| async move {
            let name = unit.to_string();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WatchError::Cancelled(name)),
                outcome = tokio::time::timeout(options.timeout, work(unit.clone())) => {
                    outcome.unwrap_or_else(|_| Err(WatchError::Timeout(name, options.timeout)))
                }
            };
            (unit, result)
        })
        .buffer_unordered(options.parallelism.max(1))
        .collect()
        .await
}

/// Whether any unit of a finished batch failed.
pub fn any_failed<K, T>(results: &[(K, Result<T, WatchError>)]) -> bool {
    results.iter().any(|(_, result)| result.is_err())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::runtime::Runtime;

    use super::*;

    #[test]
    fn never_exceeds_parallelism() {
        let options = BatchOptions {
            parallelism: 3,
            timeout: Duration::from_secs(5),
        };
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let rt = Runtime::new().unwrap();
        let results = rt.block_on(run_batch(
            (0..20).collect(),
            &options,
            &CancellationToken::new(),
            |unit: u32| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(unit * 2)
                }
            },
        ));

        assert_eq!(results.len(), 20);
        assert!(!any_failed(&results));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn timeout_is_per_unit() {
        let options = BatchOptions {
            parallelism: 4,
            timeout: Duration::from_millis(50),
        };

        let rt = Runtime::new().unwrap();
        let mut results = rt.block_on(run_batch(
            vec!["fast", "slow"],
            &options,
            &CancellationToken::new(),
            |unit: &'static str| async move {
                if unit == "slow" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(())
            },
        ));
        results.sort_by_key(|(unit, _)| *unit);

        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(WatchError::Timeout(ref name, _)) if name == "slow"));
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let rt = Runtime::new().unwrap();
        let results = rt.block_on(run_batch(
            vec![1, 2, 3],
            &BatchOptions::default(),
            &cancel,
            |_unit: i32| async { Ok(()) },
        ));

        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|(_, result)| matches!(result, Err(WatchError::Cancelled(_)))));
    }
}
