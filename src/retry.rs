//! Busy-retry combinator for the implicit locking paths.
//!
//! `get`, `load` and `get_or_load` retry lock contention transparently with
//! a jittered backoff; the explicit lock APIs surface
//! [`CacheError::LockBusy`] to the caller instead.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::error::CacheError;

/// Runs `op` until it returns anything other than `LockBusy`, sleeping a
/// jittered delay between attempts. Gives up and surfaces `LockBusy` once
/// `budget` has elapsed. The attempt index is passed through so the caller
/// can re-check the cache before contending the lock again.
pub(crate) async fn retry_on_busy<T, F, Fut>(budget: Duration, mut op: F) -> Result<T, CacheError>
where
  F: FnMut(u64) -> Fut,
  Fut: Future<Output = Result<T, CacheError>>,
{
  let started = Instant::now();
  let mut attempt: u64 = 0;
  loop {
    match op(attempt).await {
      Err(CacheError::LockBusy { key }) if started.elapsed() < budget => {
        debug!(key = %key, attempt, "lock busy; backing off");
        tokio::time::sleep(backoff_delay(attempt)).await;
        attempt += 1;
      }
      other => return other,
    }
  }
}

/// Jittered delay drawn from a window that starts at 3 time-units and grows
/// by one unit per attempt.
fn backoff_delay(attempt: u64) -> Duration {
  let units = 3 + attempt;
  let ms = rand::rng().random_range(1..=units);
  Duration::from_millis(ms)
}
