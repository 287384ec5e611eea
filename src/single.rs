use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use crate::cache::MultiFieldCache;
use crate::error::CacheError;
use crate::loader::{ValueLoader, ValueOrLoader};
use crate::metrics::MetricsSnapshot;
use crate::options::CacheOptions;

/// The field name a [`SingleFieldCache`] stores everything under.
pub const SINGLE_FIELD: &str = "value";

/// A thin specialization of [`MultiFieldCache`] for callers with no notion
/// of fields: every operation forwards to the engine under one fixed field
/// name. All coherence guarantees are the engine's.
pub struct SingleFieldCache<K, V> {
  inner: MultiFieldCache<K, V>,
}

impl<K, V> Clone for SingleFieldCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<K, V> fmt::Debug for SingleFieldCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SingleFieldCache")
      .field("inner", &self.inner)
      .finish()
  }
}

impl<K, V> SingleFieldCache<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  pub(crate) fn new(inner: MultiFieldCache<K, V>) -> Self {
    Self { inner }
  }

  /// The underlying engine, for callers that outgrow the single-field view.
  pub fn as_multi_field(&self) -> &MultiFieldCache<K, V> {
    &self.inner
  }

  pub fn name(&self) -> &str {
    self.inner.name()
  }

  pub fn options(&self) -> &CacheOptions {
    self.inner.options()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.inner.metrics()
  }

  pub async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
    self.inner.get(key, SINGLE_FIELD).await
  }

  pub async fn load<F, Fut>(&self, key: &K, force: bool, fetch: F) -> Result<Option<V>, CacheError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>>,
  {
    self.inner.load(key, SINGLE_FIELD, force, fetch).await
  }

  pub async fn get_or_load<F, Fut>(&self, key: &K, fetch: F) -> Result<Option<V>, CacheError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>>,
  {
    self.inner.get_or_load(key, SINGLE_FIELD, fetch).await
  }

  pub async fn evict(&self, key: &K) -> Result<(), CacheError> {
    self.inner.evict(key).await
  }

  pub async fn lock_for_load(&self, key: &K) -> Result<ValueLoader<K, V>, CacheError> {
    self.inner.lock_for_load(key, SINGLE_FIELD).await
  }

  pub async fn pessimistic_lock_for_load(&self, key: &K) -> Result<ValueLoader<K, V>, CacheError> {
    self.inner.pessimistic_lock_for_load(key, SINGLE_FIELD).await
  }

  pub async fn optimistic_lock_for_load(&self, key: &K) -> Result<ValueLoader<K, V>, CacheError> {
    self.inner.optimistic_lock_for_load(key, SINGLE_FIELD).await
  }

  pub async fn get_or_lock_for_load(&self, key: &K) -> Result<ValueOrLoader<K, V>, CacheError> {
    self.inner.get_or_lock_for_load(key, SINGLE_FIELD).await
  }
}

impl<K, V> SingleFieldCache<K, V>
where
  K: Clone + Eq + Hash + Send + Sync,
  V: Send + Sync,
{
  pub async fn multi_get(&self, keys: &[K]) -> Result<HashMap<K, V>, CacheError> {
    self.inner.multi_get(keys, SINGLE_FIELD).await
  }

  pub async fn multi_load(&self, entries: Vec<(K, V)>, force: bool) -> Result<(), CacheError> {
    self.inner.multi_load(entries, SINGLE_FIELD, force).await
  }

  pub async fn multi_get_or_load<F, Fut>(
    &self,
    keys: &[K],
    batch_fetch: F,
  ) -> Result<HashMap<K, V>, CacheError>
  where
    F: Fn(Vec<K>) -> Fut + Sync,
    Fut: Future<Output = HashMap<K, V>>,
  {
    self
      .inner
      .multi_get_or_load(keys, SINGLE_FIELD, batch_fetch)
      .await
  }
}
