pub mod aggregate_maintainer;
pub mod change_listener;
pub mod interaction_service;
pub mod vote_service;

use rand::Rng;
use std::time::Duration;

/// Linear backoff with jitter between optimistic-concurrency attempts.
pub(crate) async fn retry_backoff(base: Duration, attempt: u32) {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        tokio::task::yield_now().await;
        return;
    }

    let jitter = rand::rng().random_range(0..=base_ms);
    tokio::time::sleep(Duration::from_millis(base_ms * attempt as u64 + jitter)).await;
}
