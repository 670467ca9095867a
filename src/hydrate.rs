//! Adaptive detail hydration.
//!
//! Detail endpoints are the rate-limit hot spot: a board happily serves one
//! listing page but throttles a burst of per-job detail requests. The hydrator
//! fetches details in parallel batches, shrinking the batch and stretching the
//! inter-batch delay whenever a batch sees a failure, and cautiously growing
//! again after clean batches. Partial progress is always preserved: a failed
//! item never aborts the loop.

use futures::future::join_all;
use std::future::Future;
use tokio::time::sleep;

use crate::config::HydratorConfig;

/// Outcome of one hydration run. `results` holds every non-null fetcher
/// return in completion order; `failures` counts null returns.
#[derive(Debug, Clone)]
pub struct Hydrated<T> {
    pub results: Vec<T>,
    pub failures: usize,
}

impl<T> Hydrated<T> {
    pub fn is_complete(&self) -> bool {
        self.failures == 0
    }
}

/// Run `fetcher` over `items` with adaptive bounded concurrency.
///
/// A fetcher returning `None` counts as a failure; fetchers are expected to
/// catch their own errors and map them to `None`. After a batch with any
/// failure the batch size shrinks by one and the delay grows by
/// `delay_increment`; after a clean batch the batch size grows by one and the
/// delay shrinks by `delay_decrement`, all clamped to the configured bounds.
pub async fn hydrate<I, T, F, Fut>(items: Vec<I>, config: &HydratorConfig, fetcher: F) -> Hydrated<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut batch_size = config.initial_batch.clamp(config.min_batch, config.max_batch);
    let mut delay = config
        .initial_delay
        .clamp(config.min_delay, config.max_delay);

    let mut results = Vec::with_capacity(items.len());
    let mut failures = 0usize;

    let mut remaining = items.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<I> = remaining.by_ref().take(batch_size.max(1)).collect();
        let outputs = join_all(batch.into_iter().map(&fetcher)).await;

        let mut batch_failed = false;
        for output in outputs {
            match output {
                Some(value) => results.push(value),
                None => {
                    failures += 1;
                    batch_failed = true;
                }
            }
        }

        if batch_failed {
            batch_size = batch_size.saturating_sub(1).max(config.min_batch);
            delay = (delay + config.delay_increment).min(config.max_delay);
        } else {
            batch_size = (batch_size + 1).min(config.max_batch);
            delay = delay.saturating_sub(config.delay_decrement).max(config.min_delay);
        }

        if remaining.peek().is_some() {
            sleep(delay).await;
        }
    }

    Hydrated { results, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn quick_config() -> HydratorConfig {
        HydratorConfig {
            initial_batch: 4,
            min_batch: 1,
            max_batch: 4,
            initial_delay: Duration::from_millis(1),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            delay_increment: Duration::from_millis(1),
            delay_decrement: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn all_items_fetched() {
        let config = quick_config();
        let hydrated = hydrate((0..10).collect(), &config, |i: i32| async move { Some(i * 2) }).await;
        assert_eq!(hydrated.results.len(), 10);
        assert_eq!(hydrated.failures, 0);
        assert!(hydrated.is_complete());
    }

    #[tokio::test]
    async fn failures_counted_but_never_abort() {
        let config = quick_config();
        let hydrated = hydrate(
            (0..10).collect(),
            &config,
            |i: i32| async move { if i % 3 == 0 { None } else { Some(i) } },
        )
        .await;
        assert_eq!(hydrated.failures, 4); // 0, 3, 6, 9
        assert_eq!(hydrated.results.len(), 6);
        assert!(!hydrated.is_complete());
    }

    #[tokio::test]
    async fn batch_size_shrinks_on_failure() {
        let config = quick_config();
        // Track the max number of concurrently running fetchers after the
        // first (failing) batch: the second batch must be smaller.
        let in_flight = std::sync::Arc::new(AtomicUsize::new(0));
        let batch_peaks = std::sync::Arc::new(Mutex::new(Vec::new()));
        let calls = std::sync::Arc::new(AtomicUsize::new(0));

        let hydrated = hydrate(
            (0..8).collect::<Vec<i32>>(),
            &config,
            |i: i32| {
                let in_flight = in_flight.clone();
                let batch_peaks = batch_peaks.clone();
                let calls = calls.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    batch_peaks.lock().unwrap().push(now);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    // Fail everything in the first batch
                    if n < 4 { None } else { Some(i) }
                }
            },
        )
        .await;

        assert_eq!(hydrated.failures, 4);
        let peaks = batch_peaks.lock().unwrap();
        let max_peak = peaks.iter().copied().max().unwrap();
        assert!(max_peak <= 4);
        // After the failing first batch of 4, the next batch is at most 3 wide
        let later_peak = peaks[4..].iter().copied().max().unwrap();
        assert!(later_peak <= 3, "later peak was {later_peak}");
    }

    #[tokio::test]
    async fn empty_input_is_a_noop() {
        let config = quick_config();
        let hydrated: Hydrated<i32> =
            hydrate(Vec::<i32>::new(), &config, |i: i32| async move { Some(i) }).await;
        assert!(hydrated.results.is_empty());
        assert_eq!(hydrated.failures, 0);
    }
}
