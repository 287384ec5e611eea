use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

/// What the cache does with values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
  /// Full read-through/write-through behavior.
  Normal,
  /// The cache never stores values and only propagates eviction signals.
  /// Reads always miss, `get_or_load` fetches uncached, and `load` performs
  /// an eviction instead of a write.
  EvictionOnly,
}

impl CacheMode {
  fn as_u8(self) -> u8 {
    match self {
      CacheMode::Normal => 0,
      CacheMode::EvictionOnly => 1,
    }
  }

  fn from_u8(raw: u8) -> Self {
    match raw {
      1 => CacheMode::EvictionOnly,
      _ => CacheMode::Normal,
    }
  }
}

/// What the engine does when the backing store or mutex fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Rethrow the failure to the caller. Timeouts propagate unchanged;
  /// other failures are wrapped in [`CacheError::Backend`](crate::CacheError::Backend).
  ThrowException,
  /// Swallow the failure, log it, count a miss, and answer from the origin
  /// (or absent, for bare reads). The cache may be inconsistent with the
  /// origin until a later successful write or a manual flush.
  FallbackToOrigin,
}

impl FailurePolicy {
  fn as_u8(self) -> u8 {
    match self {
      FailurePolicy::ThrowException => 0,
      FailurePolicy::FallbackToOrigin => 1,
    }
  }

  fn from_u8(raw: u8) -> Self {
    match raw {
      1 => FailurePolicy::FallbackToOrigin,
      _ => FailurePolicy::ThrowException,
    }
  }
}

/// The live configuration cell shared by every handle of one logical cache.
///
/// Every scalar field is stored atomically so the mode (or any other knob)
/// can be flipped while traffic is in flight. Mutation is *not* synchronized
/// with in-flight operations: an operation that already read the old mode
/// finishes under it. The `version` string is fixed at build time; changing
/// the version means building a new cache handle, which silently addresses a
/// disjoint namespace under the same physical keys.
#[derive(Debug)]
pub struct CacheOptions {
  version: String,
  cache_mode: AtomicU8,
  ttl_ms: AtomicU64,
  apply_ttl_if_hit: AtomicBool,
  // Negative disables the cold window.
  cold_time_ms: AtomicI64,
  lock_timeout_ms: AtomicU64,
  enable_optimistic_lock: AtomicBool,
  enable_pessimistic_lock: AtomicBool,
  operation_timeout_ms: AtomicU64,
  multi_parallelism: AtomicUsize,
  failure_policy: AtomicU8,
}

pub(crate) const DEFAULT_VERSION: &str = "0001";

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      version: DEFAULT_VERSION.to_string(),
      cache_mode: AtomicU8::new(CacheMode::Normal.as_u8()),
      ttl_ms: AtomicU64::new(10 * 60 * 1000),
      apply_ttl_if_hit: AtomicBool::new(false),
      cold_time_ms: AtomicI64::new(-1),
      lock_timeout_ms: AtomicU64::new(30_000),
      enable_optimistic_lock: AtomicBool::new(true),
      enable_pessimistic_lock: AtomicBool::new(true),
      operation_timeout_ms: AtomicU64::new(5_000),
      multi_parallelism: AtomicUsize::new(num_cpus::get().max(1)),
      failure_policy: AtomicU8::new(FailurePolicy::ThrowException.as_u8()),
    }
  }
}

impl CacheOptions {
  pub(crate) fn set_version(&mut self, version: String) {
    self.version = version;
  }

  /// The namespace version embedded in every field name.
  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn cache_mode(&self) -> CacheMode {
    CacheMode::from_u8(self.cache_mode.load(Ordering::Relaxed))
  }

  /// Flips the cache mode live. In-flight operations finish under the mode
  /// they started with.
  pub fn set_cache_mode(&self, mode: CacheMode) {
    self.cache_mode.store(mode.as_u8(), Ordering::Relaxed);
  }

  pub fn ttl(&self) -> Duration {
    Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
  }

  pub fn set_ttl(&self, ttl: Duration) {
    self.ttl_ms.store(ttl.as_millis() as u64, Ordering::Relaxed);
  }

  pub fn apply_ttl_if_hit(&self) -> bool {
    self.apply_ttl_if_hit.load(Ordering::Relaxed)
  }

  pub fn set_apply_ttl_if_hit(&self, apply: bool) {
    self.apply_ttl_if_hit.store(apply, Ordering::Relaxed);
  }

  /// The post-eviction window during which population is suppressed, or
  /// `None` when disabled.
  pub fn cold_time(&self) -> Option<Duration> {
    let ms = self.cold_time_ms.load(Ordering::Relaxed);
    if ms < 0 {
      None
    } else {
      Some(Duration::from_millis(ms as u64))
    }
  }

  pub fn set_cold_time(&self, cold_time: Option<Duration>) {
    let ms = cold_time.map_or(-1, |d| d.as_millis() as i64);
    self.cold_time_ms.store(ms, Ordering::Relaxed);
  }

  /// How long a pessimistic mutex hold lives, and the TTL of the optimistic
  /// fencing counter. Also bounds the transparent busy-retry loop.
  pub fn lock_timeout(&self) -> Duration {
    Duration::from_millis(self.lock_timeout_ms.load(Ordering::Relaxed))
  }

  pub fn set_lock_timeout(&self, timeout: Duration) {
    self
      .lock_timeout_ms
      .store(timeout.as_millis() as u64, Ordering::Relaxed);
  }

  pub fn optimistic_lock_enabled(&self) -> bool {
    self.enable_optimistic_lock.load(Ordering::Relaxed)
  }

  pub fn set_optimistic_lock_enabled(&self, enabled: bool) {
    self.enable_optimistic_lock.store(enabled, Ordering::Relaxed);
  }

  pub fn pessimistic_lock_enabled(&self) -> bool {
    self.enable_pessimistic_lock.load(Ordering::Relaxed)
  }

  pub fn set_pessimistic_lock_enabled(&self, enabled: bool) {
    self.enable_pessimistic_lock.store(enabled, Ordering::Relaxed);
  }

  /// Bounds each internal store/mutex call. Never applied to a
  /// caller-supplied fetch future, so a slow origin cannot be mistaken for
  /// a cache failure.
  pub fn operation_timeout(&self) -> Duration {
    Duration::from_millis(self.operation_timeout_ms.load(Ordering::Relaxed))
  }

  pub fn set_operation_timeout(&self, timeout: Duration) {
    self
      .operation_timeout_ms
      .store(timeout.as_millis() as u64, Ordering::Relaxed);
  }

  /// Fan-out width for the batch operations. Always at least 1.
  pub fn multi_parallelism(&self) -> usize {
    self.multi_parallelism.load(Ordering::Relaxed).max(1)
  }

  pub fn set_multi_parallelism(&self, parallelism: usize) {
    self
      .multi_parallelism
      .store(parallelism.max(1), Ordering::Relaxed);
  }

  pub fn failure_policy(&self) -> FailurePolicy {
    FailurePolicy::from_u8(self.failure_policy.load(Ordering::Relaxed))
  }

  pub fn set_failure_policy(&self, policy: FailurePolicy) {
    self.failure_policy.store(policy.as_u8(), Ordering::Relaxed);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mode_flips_live() {
    let options = CacheOptions::default();
    assert_eq!(options.cache_mode(), CacheMode::Normal);
    options.set_cache_mode(CacheMode::EvictionOnly);
    assert_eq!(options.cache_mode(), CacheMode::EvictionOnly);
  }

  #[test]
  fn negative_cold_time_disables_the_window() {
    let options = CacheOptions::default();
    assert_eq!(options.cold_time(), None);
    options.set_cold_time(Some(Duration::from_millis(100)));
    assert_eq!(options.cold_time(), Some(Duration::from_millis(100)));
    options.set_cold_time(None);
    assert_eq!(options.cold_time(), None);
  }

  #[test]
  fn parallelism_is_clamped_to_one() {
    let options = CacheOptions::default();
    options.set_multi_parallelism(0);
    assert_eq!(options.multi_parallelism(), 1);
  }
}
