use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CacheError;
use crate::shared::CacheShared;

/// Fencing sentinel carried by loaders of caches with optimistic locking
/// disabled; the commit skips the counter check entirely.
pub(crate) const NO_VERSION: i64 = -1;

/// Result of a commit attempt.
///
/// `success == false` with `optimistic_lock_failure == true` means the
/// reservation was fenced out by a competing reservation or commit and the
/// entry was purged rather than left in an unknowable state. This is a
/// normal outcome, not an error.
#[derive(Debug)]
pub struct LoadResult<V> {
  pub value: V,
  pub success: bool,
  pub optimistic_lock_failure: bool,
}

/// Either a cached value or a reservation to populate the missing entry.
/// Returned by [`get_or_lock_for_load`](crate::MultiFieldCache::get_or_lock_for_load).
pub enum ValueOrLoader<K, V> {
  Value(V),
  Loader(ValueLoader<K, V>),
}

enum LoaderKind {
  Basic,
  Pessimistic { mutex_key: String },
}

/// A single-use reservation to populate one (key, field).
///
/// The state machine is Active → Committed ([`load`](Self::load)) or
/// Released ([`release`](Self::release)); the transition is guarded by one
/// atomic flag and any second transition fails with
/// [`CacheError::AlreadyLoaded`]. A pessimistic loader additionally holds a
/// distributed mutex, released on every path out of `load` (including
/// commit failure) and by `release`. Dropping an Active pessimistic loader
/// leaves the hold to expire with the lock TTL; that is the fail-safe, not
/// a leak.
pub struct ValueLoader<K, V> {
  shared: Arc<CacheShared<K, V>>,
  store_key: String,
  field_name: String,
  version: i64,
  kind: LoaderKind,
  done: AtomicBool,
}

impl<K, V> ValueLoader<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  pub(crate) fn basic(
    shared: Arc<CacheShared<K, V>>,
    store_key: String,
    field_name: String,
    version: i64,
  ) -> Self {
    Self {
      shared,
      store_key,
      field_name,
      version,
      kind: LoaderKind::Basic,
      done: AtomicBool::new(false),
    }
  }

  pub(crate) fn pessimistic(
    shared: Arc<CacheShared<K, V>>,
    store_key: String,
    field_name: String,
    version: i64,
    mutex_key: String,
  ) -> Self {
    Self {
      shared,
      store_key,
      field_name,
      version,
      kind: LoaderKind::Pessimistic { mutex_key },
      done: AtomicBool::new(false),
    }
  }

  /// The fencing token taken at reservation time, or −1 when optimistic
  /// locking is disabled.
  pub fn version(&self) -> i64 {
    self.version
  }

  pub fn is_pessimistic(&self) -> bool {
    matches!(self.kind, LoaderKind::Pessimistic { .. })
  }

  fn begin_terminal(&self) -> Result<(), CacheError> {
    if self.done.swap(true, Ordering::AcqRel) {
      return Err(CacheError::AlreadyLoaded);
    }
    Ok(())
  }

  async fn release_mutex(&self) {
    if let LoaderKind::Pessimistic { mutex_key } = &self.kind {
      self.shared.release_mutex_hold(mutex_key).await;
    }
  }

  /// Attempts the fenced commit of `value`.
  ///
  /// A pessimistic loader's mutex is released unconditionally, even when
  /// the commit fails or errors.
  pub async fn load(&self, value: V) -> Result<LoadResult<V>, CacheError> {
    let (success, optimistic_lock_failure) = self.commit_ref(&value).await?;
    Ok(LoadResult {
      value,
      success,
      optimistic_lock_failure,
    })
  }

  pub(crate) async fn commit_ref(&self, value: &V) -> Result<(bool, bool), CacheError> {
    self.begin_terminal()?;
    let committed = self
      .shared
      .compare_and_load(&self.store_key, &self.field_name, self.version, value)
      .await;
    self.release_mutex().await;
    committed
  }

  /// Abandons the reservation without writing. For a basic loader there is
  /// nothing to release beyond the state transition.
  pub async fn release(&self) -> Result<(), CacheError> {
    self.begin_terminal()?;
    self.release_mutex().await;
    Ok(())
  }
}
