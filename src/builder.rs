use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::MultiFieldCache;
use crate::codec::Codec;
use crate::error::BuildError;
use crate::keyspace::TypeFingerprinter;
use crate::memory::{MemoryMutex, MemoryStore};
use crate::metrics::Metrics;
use crate::options::{CacheMode, CacheOptions, FailurePolicy};
use crate::shared::{CacheShared, KeyFn};
use crate::single::SingleFieldCache;
use crate::store::{DistributedMutex, FieldStore};

/// A builder for [`MultiFieldCache`] and [`SingleFieldCache`] instances.
///
/// The store and mutex default to the in-process
/// [`MemoryStore`]/[`MemoryMutex`]; a deployment against a remote
/// hash-store supplies its own implementations. A codec is always required.
pub struct CacheBuilder<K, V> {
  name: String,
  store: Option<Arc<dyn FieldStore>>,
  mutex: Option<Arc<dyn DistributedMutex>>,
  codec: Option<Arc<dyn Codec<V>>>,
  key_fn: KeyFn<K>,
  options: CacheOptions,
  multi_parallelism: Option<usize>,
  type_isolation: Option<(Arc<dyn TypeFingerprinter>, String)>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("version", &self.options.version())
      .field("has_store", &self.store.is_some())
      .field("has_codec", &self.codec.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V> CacheBuilder<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  /// Creates a builder whose store key is `"{name}:{key}"` via the key's
  /// `Display`.
  pub fn new(name: impl Into<String>) -> Self
  where
    K: fmt::Display,
  {
    Self::with_key_fn(name, |name: &str, key: &K| format!("{name}:{key}"))
  }

  /// Creates a builder with a custom store-key function. Two logical keys
  /// the function maps to the same string are indistinguishable to the
  /// engine; keeping them apart is the caller's contract.
  pub fn with_key_fn(
    name: impl Into<String>,
    key_fn: impl Fn(&str, &K) -> String + Send + Sync + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      store: None,
      mutex: None,
      codec: None,
      key_fn: Arc::new(key_fn),
      options: CacheOptions::default(),
      multi_parallelism: None,
      type_isolation: None,
    }
  }

  pub fn store(mut self, store: Arc<dyn FieldStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn mutex(mut self, mutex: Arc<dyn DistributedMutex>) -> Self {
    self.mutex = Some(mutex);
    self
  }

  pub fn codec(mut self, codec: Arc<dyn Codec<V>>) -> Self {
    self.codec = Some(codec);
    self
  }

  /// Sets the namespace version embedded in every field name. Changing it
  /// silently creates a disjoint cache namespace sharing the same physical
  /// keys; an eviction still removes all versions together.
  pub fn version(mut self, version: impl Into<String>) -> Self {
    self.options.set_version(version.into());
    self
  }

  pub fn cache_mode(self, mode: CacheMode) -> Self {
    self.options.set_cache_mode(mode);
    self
  }

  pub fn ttl(self, ttl: Duration) -> Self {
    self.options.set_ttl(ttl);
    self
  }

  /// Whether a hit refreshes the key's TTL (the TTL is per store key,
  /// shared by all fields).
  pub fn apply_ttl_if_hit(self, apply: bool) -> Self {
    self.options.set_apply_ttl_if_hit(apply);
    self
  }

  /// Enables the post-eviction cold window: for this long after an
  /// eviction the cache deliberately does not repopulate.
  pub fn cold_time(self, cold_time: Duration) -> Self {
    self.options.set_cold_time(Some(cold_time));
    self
  }

  /// Hold duration of a pessimistic mutex, TTL of the fencing counter, and
  /// the budget of the transparent busy-retry loop.
  pub fn lock_timeout(self, timeout: Duration) -> Self {
    self.options.set_lock_timeout(timeout);
    self
  }

  pub fn optimistic_lock(self, enabled: bool) -> Self {
    self.options.set_optimistic_lock_enabled(enabled);
    self
  }

  pub fn pessimistic_lock(self, enabled: bool) -> Self {
    self.options.set_pessimistic_lock_enabled(enabled);
    self
  }

  /// Bounds each internal store/mutex call. Never applied to
  /// caller-supplied fetch futures.
  pub fn operation_timeout(self, timeout: Duration) -> Self {
    self.options.set_operation_timeout(timeout);
    self
  }

  pub fn multi_parallelism(mut self, parallelism: usize) -> Self {
    self.multi_parallelism = Some(parallelism);
    self
  }

  pub fn failure_policy(self, policy: FailurePolicy) -> Self {
    self.options.set_failure_policy(policy);
    self
  }

  /// Isolates this cache's field names by an opaque type fingerprint, so
  /// incompatible layouts of the same logical cache cannot observe each
  /// other. The engine never inspects the descriptor; it only forwards it
  /// to the fingerprinter once, at build time.
  pub fn type_isolation(
    mut self,
    fingerprinter: Arc<dyn TypeFingerprinter>,
    descriptor: impl Into<String>,
  ) -> Self {
    self.type_isolation = Some((fingerprinter, descriptor.into()));
    self
  }

  pub fn build(self) -> Result<MultiFieldCache<K, V>, BuildError> {
    let codec = self.codec.ok_or(BuildError::MissingCodec)?;
    if self.multi_parallelism == Some(0) {
      return Err(BuildError::ZeroParallelism);
    }
    if let Some(parallelism) = self.multi_parallelism {
      self.options.set_multi_parallelism(parallelism);
    }

    let field_suffix = self
      .type_isolation
      .as_ref()
      .map(|(fingerprinter, descriptor)| fingerprinter.fingerprint(descriptor));
    Ok(MultiFieldCache {
      shared: Arc::new(CacheShared {
        name: self.name,
        store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
        mutex: self.mutex.unwrap_or_else(|| Arc::new(MemoryMutex::new())),
        codec,
        key_fn: self.key_fn,
        field_suffix,
        options: self.options,
        metrics: Metrics::new(),
      }),
    })
  }

  pub fn build_single(self) -> Result<SingleFieldCache<K, V>, BuildError> {
    Ok(SingleFieldCache::new(self.build()?))
  }
}
