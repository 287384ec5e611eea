use std::future::Future;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{CacheError, StoreError};
use crate::keyspace;
use crate::loader::{self, ValueLoader};
use crate::metrics::Metrics;
use crate::options::{CacheMode, CacheOptions, FailurePolicy};
use crate::store::{DistributedMutex, FieldStore};

/// Maps (cache name, logical key) to the concrete store key. The mapping is
/// the caller's contract: two logical keys that collide here are
/// indistinguishable to the engine.
pub(crate) type KeyFn<K> = Arc<dyn Fn(&str, &K) -> String + Send + Sync>;

/// The internal, thread-safe core shared by every handle of one cache.
pub(crate) struct CacheShared<K, V> {
  pub(crate) name: String,
  pub(crate) store: Arc<dyn FieldStore>,
  pub(crate) mutex: Arc<dyn DistributedMutex>,
  pub(crate) codec: Arc<dyn Codec<V>>,
  pub(crate) key_fn: KeyFn<K>,
  pub(crate) field_suffix: Option<String>,
  pub(crate) options: CacheOptions,
  pub(crate) metrics: Metrics,
}

/// Outcome of one step of the transparent lock-retry loop.
pub(crate) enum Acquired<K, V> {
  /// The winning loader committed while we were backing off.
  Cached(V),
  Loader(ValueLoader<K, V>),
}

impl<K, V> CacheShared<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  pub(crate) fn store_key(&self, key: &K) -> String {
    (self.key_fn)(&self.name, key)
  }

  pub(crate) fn field_name(&self, field: &str) -> String {
    keyspace::field_name(field, self.options.version(), self.field_suffix.as_deref())
  }

  /// Bounds one store or mutex call by the operation timeout. Never applied
  /// to caller-supplied fetch futures.
  pub(crate) async fn bounded<T>(
    &self,
    fut: impl Future<Output = Result<T, StoreError>>,
  ) -> Result<T, CacheError> {
    let limit = self.options.operation_timeout();
    match timeout(limit, fut).await {
      Ok(res) => res.map_err(CacheError::from),
      Err(_) => Err(CacheError::Timeout(limit)),
    }
  }

  pub(crate) fn fallback_allowed(&self, err: &CacheError) -> bool {
    !err.is_contract_violation()
      && self.options.failure_policy() == FailurePolicy::FallbackToOrigin
  }

  pub(crate) fn note_fallback(&self, err: &CacheError) {
    warn!(
      cache = %self.name,
      error = %err,
      "cache failure absorbed; answering from origin"
    );
    self.metrics.record_miss();
  }

  pub(crate) fn absorb<T>(&self, res: Result<T, CacheError>, fallback: T) -> Result<T, CacheError> {
    match res {
      Ok(value) => Ok(value),
      Err(err) if self.fallback_allowed(&err) => {
        self.note_fallback(&err);
        Ok(fallback)
      }
      Err(err) => Err(err),
    }
  }

  /// Reads one field, counting hit/miss and refreshing the key's TTL on hit
  /// when configured. An undecodable value counts as a miss and the field is
  /// purged best-effort.
  pub(crate) async fn read_field(
    &self,
    store_key: &str,
    field_name: &str,
  ) -> Result<Option<V>, CacheError> {
    let Some(bytes) = self.bounded(self.store.get(store_key, field_name)).await? else {
      self.metrics.record_miss();
      return Ok(None);
    };
    match self.codec.decode(&bytes) {
      Ok(value) => {
        self.metrics.record_hit();
        if self.options.apply_ttl_if_hit() {
          self
            .bounded(self.store.expire(store_key, self.options.ttl()))
            .await?;
        }
        Ok(Some(value))
      }
      Err(err) => {
        debug!(
          cache = %self.name,
          key = store_key,
          field = field_name,
          error = %err,
          "undecodable value treated as a miss"
        );
        let _ = self
          .bounded(self.store.delete_field(store_key, field_name))
          .await;
        self.metrics.record_miss();
        Ok(None)
      }
    }
  }

  pub(crate) async fn in_cold_window(&self, store_key: &str) -> Result<bool, CacheError> {
    if self.options.cold_time().is_none() {
      return Ok(false);
    }
    self
      .bounded(self.mutex.is_acquired(&keyspace::cold_key(store_key)))
      .await
  }

  /// Advances the fencing counter and takes the new value as this
  /// reservation's token, or the sentinel when optimistic locking is off.
  pub(crate) async fn reserve(&self, store_key: &str, field_name: &str) -> Result<i64, CacheError> {
    if !self.options.optimistic_lock_enabled() {
      return Ok(loader::NO_VERSION);
    }
    self
      .bounded(self.store.incr_by(
        &keyspace::counter_key(store_key),
        field_name,
        1,
        self.options.lock_timeout(),
      ))
      .await
  }

  pub(crate) async fn basic_loader(
    shared: &Arc<Self>,
    store_key: &str,
    field_name: &str,
  ) -> Result<ValueLoader<K, V>, CacheError> {
    let version = shared.reserve(store_key, field_name).await?;
    Ok(ValueLoader::basic(
      Arc::clone(shared),
      store_key.to_string(),
      field_name.to_string(),
      version,
    ))
  }

  pub(crate) async fn pessimistic_loader(
    shared: &Arc<Self>,
    store_key: &str,
    field_name: &str,
  ) -> Result<ValueLoader<K, V>, CacheError> {
    let mutex_key = keyspace::mutex_key(store_key, field_name);
    let acquired = shared
      .bounded(shared.mutex.acquire(&mutex_key, shared.options.lock_timeout()))
      .await?;
    if !acquired {
      return Err(CacheError::LockBusy { key: mutex_key });
    }
    match shared.reserve(store_key, field_name).await {
      Ok(version) => Ok(ValueLoader::pessimistic(
        Arc::clone(shared),
        store_key.to_string(),
        field_name.to_string(),
        version,
        mutex_key,
      )),
      Err(err) => {
        shared.release_mutex_hold(&mutex_key).await;
        Err(err)
      }
    }
  }

  /// Pessimistic when enabled, basic otherwise. With both locks disabled the
  /// basic loader still succeeds and offers no coordination guarantee.
  pub(crate) async fn acquire_loader(
    shared: &Arc<Self>,
    store_key: &str,
    field_name: &str,
  ) -> Result<ValueLoader<K, V>, CacheError> {
    if shared.options.pessimistic_lock_enabled() {
      Self::pessimistic_loader(shared, store_key, field_name).await
    } else {
      Self::basic_loader(shared, store_key, field_name).await
    }
  }

  /// One step of the transparent busy-retry loop. After the first attempt a
  /// re-read runs before contending the lock again, so a loser returns the
  /// winner's committed value without refetching.
  pub(crate) async fn acquire_or_read(
    shared: &Arc<Self>,
    attempt: u64,
    store_key: &str,
    field_name: &str,
  ) -> Result<Acquired<K, V>, CacheError> {
    if attempt > 0 {
      if let Some(value) = shared.read_field(store_key, field_name).await? {
        return Ok(Acquired::Cached(value));
      }
    }
    let loader = Self::acquire_loader(shared, store_key, field_name).await?;
    if attempt > 0 {
      // The winner may commit between our re-read and the acquire.
      if let Some(value) = shared.read_field(store_key, field_name).await? {
        let _ = loader.release().await;
        return Ok(Acquired::Cached(value));
      }
    }
    Ok(Acquired::Loader(loader))
  }

  /// The fenced commit shared by both loader kinds. Returns
  /// `(success, optimistic_lock_failure)`.
  ///
  /// The counter is advanced again at commit time; anything other than
  /// `reserved + 1` means another reservation or commit interleaved. The
  /// engine cannot tell which racing writer is newer, so it purges the entry
  /// instead of guessing.
  pub(crate) async fn compare_and_load(
    &self,
    store_key: &str,
    field_name: &str,
    reserved: i64,
    value: &V,
  ) -> Result<(bool, bool), CacheError> {
    if self.options.cache_mode() == CacheMode::EvictionOnly {
      return Ok((false, false));
    }
    if reserved != loader::NO_VERSION {
      let current = self
        .bounded(self.store.incr_by(
          &keyspace::counter_key(store_key),
          field_name,
          1,
          self.options.lock_timeout(),
        ))
        .await?;
      if current != reserved + 1 {
        debug!(
          cache = %self.name,
          key = store_key,
          field = field_name,
          reserved,
          current,
          "fenced commit lost; purging the entry"
        );
        let _ = self
          .bounded(self.store.delete_field(store_key, field_name))
          .await;
        return Ok((false, true));
      }
    }
    let bytes = self.codec.encode(value)?;
    self
      .bounded(self.store.set(store_key, field_name, bytes, self.options.ttl()))
      .await?;
    self.metrics.record_put();
    Ok((true, false))
  }

  /// Eviction order matters: the cold marker is armed first so a concurrent
  /// populate cannot slip in, then the counter marker is deleted so any
  /// outstanding reservation on any field loses its fence, then the store
  /// key itself goes, taking every field and every co-resident version.
  pub(crate) async fn evict_inner(&self, store_key: &str) -> Result<(), CacheError> {
    if let Some(cold_time) = self.options.cold_time() {
      let _ = self
        .bounded(self.mutex.acquire(&keyspace::cold_key(store_key), cold_time))
        .await?;
    }
    self
      .bounded(self.store.delete(&keyspace::counter_key(store_key)))
      .await?;
    self.bounded(self.store.delete(store_key)).await?;
    Ok(())
  }

  pub(crate) async fn release_mutex_hold(&self, mutex_key: &str) {
    if let Err(err) = self.bounded(self.mutex.release(mutex_key)).await {
      warn!(
        cache = %self.name,
        key = %mutex_key,
        error = %err,
        "mutex release failed; the hold expires with its TTL"
      );
    }
  }
}
