use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::future;

use crate::error::CacheError;
use crate::loader::{ValueLoader, ValueOrLoader};
use crate::metrics::MetricsSnapshot;
use crate::options::{CacheMode, CacheOptions};
use crate::retry;
use crate::shared::{Acquired, CacheShared};

/// The multi-field cache engine.
///
/// One logical key owns a set of independently cached named fields; all
/// fields (and all versions) share one store key, so one eviction removes
/// them together. Population is coordinated by a distributed mutex
/// (collapsed forwarding) and/or a monotonic fencing counter (optimistic
/// versioning), both togglable per cache.
///
/// Handles are cheap to clone and share one live configuration cell,
/// metrics, and collaborators.
pub struct MultiFieldCache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
}

impl<K, V> Clone for MultiFieldCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V> fmt::Debug for MultiFieldCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MultiFieldCache")
      .field("name", &self.shared.name)
      .field("version", &self.shared.options.version())
      .finish_non_exhaustive()
  }
}

impl<K, V> MultiFieldCache<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  /// The live configuration cell. Mutations take effect for operations that
  /// start afterwards; in-flight operations finish under the settings they
  /// already read.
  pub fn options(&self) -> &CacheOptions {
    &self.shared.options
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Reads one field.
  ///
  /// Always absent in eviction-only mode. A hit refreshes the key's TTL
  /// when `apply_ttl_if_hit` is set; the TTL is per store key, shared by
  /// all fields. Backend failures are routed through the failure policy.
  pub async fn get(&self, key: &K, field: &str) -> Result<Option<V>, CacheError> {
    if self.shared.options.cache_mode() == CacheMode::EvictionOnly {
      self.shared.metrics.record_miss();
      return Ok(None);
    }
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);
    let res = self.shared.read_field(&store_key, &field_name).await;
    self.shared.absorb(res, None)
  }

  /// Fetches and writes one field unconditionally, without consulting the
  /// cached value first.
  ///
  /// In eviction-only mode this performs an eviction instead and never
  /// invokes `fetch`. Inside the post-eviction cold window (and without
  /// `force`) nothing happens at all. A fetch that yields `None` abandons
  /// the reservation without writing. Errors from `fetch` itself cannot
  /// occur here by construction; only lock/store failures are subject to
  /// the failure policy.
  pub async fn load<F, Fut>(
    &self,
    key: &K,
    field: &str,
    force: bool,
    fetch: F,
  ) -> Result<Option<V>, CacheError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>>,
  {
    if self.shared.options.cache_mode() == CacheMode::EvictionOnly {
      self.evict(key).await?;
      return Ok(None);
    }
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);

    if !force {
      let cold = self
        .shared
        .absorb(self.shared.in_cold_window(&store_key).await, false)?;
      if cold {
        return Ok(None);
      }
    }

    let acquired = retry::retry_on_busy(self.shared.options.lock_timeout(), |_| {
      CacheShared::acquire_loader(&self.shared, &store_key, &field_name)
    })
    .await;
    let loader = match acquired {
      Ok(loader) => loader,
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        return Ok(fetch().await);
      }
      Err(err) => return Err(err),
    };

    let Some(value) = fetch().await else {
      let _ = loader.release().await;
      return Ok(None);
    };
    match loader.commit_ref(&value).await {
      Ok(_) => Ok(Some(value)),
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        Ok(Some(value))
      }
      Err(err) => Err(err),
    }
  }

  /// Returns the cached value, populating it from `fetch` on a miss.
  ///
  /// This is where collapsed forwarding happens: with pessimistic locking
  /// enabled, concurrent callers for the same (key, field) serialize on the
  /// mutex, and a loser re-reads the winner's committed value instead of
  /// refetching. A miss inside the cold window returns the fetched value
  /// uncached. In eviction-only mode every call counts a miss and fetches
  /// uncached. A losing fenced commit purges the entry but still returns
  /// the fetched value.
  pub async fn get_or_load<F, Fut>(
    &self,
    key: &K,
    field: &str,
    fetch: F,
  ) -> Result<Option<V>, CacheError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>>,
  {
    if self.shared.options.cache_mode() == CacheMode::EvictionOnly {
      self.shared.metrics.record_miss();
      return Ok(fetch().await);
    }
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);

    match self.shared.read_field(&store_key, &field_name).await {
      Ok(Some(value)) => return Ok(Some(value)),
      Ok(None) => {}
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        return Ok(fetch().await);
      }
      Err(err) => return Err(err),
    }

    match self.shared.in_cold_window(&store_key).await {
      Ok(true) => return Ok(fetch().await),
      Ok(false) => {}
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        return Ok(fetch().await);
      }
      Err(err) => return Err(err),
    }

    let acquired = retry::retry_on_busy(self.shared.options.lock_timeout(), |attempt| {
      CacheShared::acquire_or_read(&self.shared, attempt, &store_key, &field_name)
    })
    .await;
    let loader = match acquired {
      Ok(Acquired::Cached(value)) => return Ok(Some(value)),
      Ok(Acquired::Loader(loader)) => loader,
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        return Ok(fetch().await);
      }
      Err(err) => return Err(err),
    };

    let Some(value) = fetch().await else {
      let _ = loader.release().await;
      return Ok(None);
    };
    match loader.commit_ref(&value).await {
      Ok(_) => Ok(Some(value)),
      Err(err) if self.shared.fallback_allowed(&err) => {
        self.shared.note_fallback(&err);
        Ok(Some(value))
      }
      Err(err) => Err(err),
    }
  }

  /// Evicts a logical key: arms the cold window, resets every field's
  /// fencing counter (so any outstanding reservation under this key loses),
  /// and deletes the store key with every field and every co-resident
  /// version. The eviction counter increments even in eviction-only mode
  /// and even when the backend fails under `FallbackToOrigin`.
  pub async fn evict(&self, key: &K) -> Result<(), CacheError> {
    let store_key = self.shared.store_key(key);
    let res = self.shared.evict_inner(&store_key).await;
    self.shared.metrics.record_eviction();
    self.shared.absorb(res, ())
  }

  /// Hands out a loader directly, for callers whose fetch is external to
  /// the call: pessimistic if enabled, otherwise basic. With both locks
  /// disabled the returned loader offers no coordination guarantee at all;
  /// that is an explicit opt-out, not a failure. Lock contention surfaces as
  /// [`CacheError::LockBusy`]; there is no transparent retry here.
  pub async fn lock_for_load(&self, key: &K, field: &str) -> Result<ValueLoader<K, V>, CacheError> {
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);
    CacheShared::acquire_loader(&self.shared, &store_key, &field_name).await
  }

  /// Like [`lock_for_load`](Self::lock_for_load) but insists on the mutex;
  /// fails when pessimistic locking is disabled.
  pub async fn pessimistic_lock_for_load(
    &self,
    key: &K,
    field: &str,
  ) -> Result<ValueLoader<K, V>, CacheError> {
    if !self.shared.options.pessimistic_lock_enabled() {
      return Err(CacheError::PessimisticLockDisabled);
    }
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);
    CacheShared::pessimistic_loader(&self.shared, &store_key, &field_name).await
  }

  /// A lock-free loader carrying only the fencing token; fails when
  /// optimistic locking is disabled.
  pub async fn optimistic_lock_for_load(
    &self,
    key: &K,
    field: &str,
  ) -> Result<ValueLoader<K, V>, CacheError> {
    if !self.shared.options.optimistic_lock_enabled() {
      return Err(CacheError::OptimisticLockDisabled);
    }
    let store_key = self.shared.store_key(key);
    let field_name = self.shared.field_name(field);
    CacheShared::basic_loader(&self.shared, &store_key, &field_name).await
  }

  /// Single-round-trip cache-or-populate: the value when present, otherwise
  /// a loader reserved for this (key, field).
  pub async fn get_or_lock_for_load(
    &self,
    key: &K,
    field: &str,
  ) -> Result<ValueOrLoader<K, V>, CacheError> {
    match self.get(key, field).await? {
      Some(value) => Ok(ValueOrLoader::Value(value)),
      None => Ok(ValueOrLoader::Loader(self.lock_for_load(key, field).await?)),
    }
  }
}

// --- Batch operations ---
//
// All of them fan the key collection out into chunks of ceil(N / parallelism)
// and join the chunks, bounding concurrency without bounding batch size.
impl<K, V> MultiFieldCache<K, V>
where
  K: Clone + Eq + Hash + Send + Sync,
  V: Send + Sync,
{
  pub async fn multi_get(&self, keys: &[K], field: &str) -> Result<HashMap<K, V>, CacheError> {
    let mut found = HashMap::new();
    let chunks = split_chunks(keys.to_vec(), self.shared.options.multi_parallelism());
    let tasks = chunks.into_iter().map(|chunk| async move {
      let mut out = Vec::with_capacity(chunk.len());
      for key in chunk {
        if let Some(value) = self.get(&key, field).await? {
          out.push((key, value));
        }
      }
      Ok::<_, CacheError>(out)
    });
    for res in future::join_all(tasks).await {
      found.extend(res?);
    }
    Ok(found)
  }

  /// Loads every entry, each through the same path as
  /// [`load`](Self::load): eviction-only and cold-window semantics apply
  /// per key.
  pub async fn multi_load(
    &self,
    entries: Vec<(K, V)>,
    field: &str,
    force: bool,
  ) -> Result<(), CacheError> {
    let chunks = split_chunks(entries, self.shared.options.multi_parallelism());
    let tasks = chunks.into_iter().map(|chunk| async move {
      for (key, value) in chunk {
        self
          .load(&key, field, force, move || async move { Some(value) })
          .await?;
      }
      Ok::<_, CacheError>(())
    });
    for res in future::join_all(tasks).await {
      res?;
    }
    Ok(())
  }

  /// Batch read-through. `batch_fetch` receives the keys it must resolve
  /// and returns whatever subset the origin knows; absent keys stay
  /// uncached and absent from the result.
  ///
  /// With either lock enabled every missing key goes through an individual
  /// [`get_or_load`](Self::get_or_load) (one `batch_fetch` call per key),
  /// preserving the per-key fencing and collapsed-forwarding guarantees.
  /// With both locks disabled one `batch_fetch` call resolves all missing
  /// keys and the results are bulk-written unfenced.
  pub async fn multi_get_or_load<F, Fut>(
    &self,
    keys: &[K],
    field: &str,
    batch_fetch: F,
  ) -> Result<HashMap<K, V>, CacheError>
  where
    F: Fn(Vec<K>) -> Fut + Sync,
    Fut: Future<Output = HashMap<K, V>>,
  {
    if keys.is_empty() {
      return Ok(HashMap::new());
    }
    let mut found = self.multi_get(keys, field).await?;
    let missing: Vec<K> = keys
      .iter()
      .filter(|key| !found.contains_key(key))
      .cloned()
      .collect();
    if missing.is_empty() {
      return Ok(found);
    }

    let options = &self.shared.options;
    if options.pessimistic_lock_enabled() || options.optimistic_lock_enabled() {
      let batch_fetch = &batch_fetch;
      let chunks = split_chunks(missing, options.multi_parallelism());
      let tasks = chunks.into_iter().map(|chunk| async move {
        let mut out = Vec::with_capacity(chunk.len());
        for key in chunk {
          let fetch_one = {
            let key = key.clone();
            move || async move { batch_fetch(vec![key.clone()]).await.remove(&key) }
          };
          if let Some(value) = self.get_or_load(&key, field, fetch_one).await? {
            out.push((key, value));
          }
        }
        Ok::<_, CacheError>(out)
      });
      for res in future::join_all(tasks).await {
        found.extend(res?);
      }
    } else {
      let fetched: Vec<(K, V)> = batch_fetch(missing).await.into_iter().collect();
      found.extend(self.bulk_load(fetched, field).await?);
    }
    Ok(found)
  }

  /// The unfenced bulk-write path. A single fetch covering many keys cannot
  /// be fenced per key, so this refuses to run while either lock is
  /// enabled.
  async fn bulk_load(
    &self,
    entries: Vec<(K, V)>,
    field: &str,
  ) -> Result<Vec<(K, V)>, CacheError> {
    let options = &self.shared.options;
    if options.pessimistic_lock_enabled() || options.optimistic_lock_enabled() {
      return Err(CacheError::BulkFetchUnsupported);
    }
    if options.cache_mode() == CacheMode::EvictionOnly {
      return Ok(entries);
    }
    let field_name = self.shared.field_name(field);
    let field_name = field_name.as_str();
    let chunks = split_chunks(entries, options.multi_parallelism());
    let tasks = chunks.into_iter().map(|chunk| async move {
      let mut out = Vec::with_capacity(chunk.len());
      for (key, value) in chunk {
        let store_key = self.shared.store_key(&key);
        let written = async {
          let loader = CacheShared::basic_loader(&self.shared, &store_key, field_name).await?;
          loader.commit_ref(&value).await?;
          Ok::<_, CacheError>(())
        }
        .await;
        self.shared.absorb(written, ())?;
        out.push((key, value));
      }
      Ok::<_, CacheError>(out)
    });
    let mut written = Vec::new();
    for res in future::join_all(tasks).await {
      written.extend(res?);
    }
    Ok(written)
  }
}

/// Splits `items` into at most `parallelism` chunks of equal size
/// (`ceil(N / parallelism)`, minimum 1).
fn split_chunks<T>(items: Vec<T>, parallelism: usize) -> Vec<Vec<T>> {
  if items.is_empty() {
    return Vec::new();
  }
  let size = items.len().div_ceil(parallelism).max(1);
  let mut chunks = Vec::with_capacity(parallelism);
  let mut iter = items.into_iter();
  loop {
    let chunk: Vec<T> = iter.by_ref().take(size).collect();
    if chunk.is_empty() {
      return chunks;
    }
    chunks.push(chunk);
  }
}
