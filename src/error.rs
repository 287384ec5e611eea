use std::time::Duration;

use thiserror::Error;

/// An error reported by a [`FieldStore`](crate::store::FieldStore) or
/// [`DistributedMutex`](crate::store::DistributedMutex) implementation.
///
/// The engine does not interpret the message; it only decides whether to
/// rethrow it or fall back to the origin, per the configured
/// [`FailurePolicy`](crate::options::FailurePolicy).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
  pub fn new(msg: impl Into<String>) -> Self {
    Self(msg.into())
  }
}

/// An error produced while encoding or decoding a cached value.
///
/// Decode errors on the read path are treated as a cache miss, never as a
/// hard failure: a value the codec cannot read is as good as absent.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
  pub fn new(msg: impl Into<String>) -> Self {
    Self(msg.into())
  }
}

/// Errors surfaced by the cache engine.
///
/// Two families live here. Caller-contract violations (`AlreadyLoaded`,
/// the `*LockDisabled` pair, `BulkFetchUnsupported`) are always returned
/// directly to the caller and are never absorbed by the failure policy.
/// Backend failures (`Timeout`, `Backend`) and lock contention (`LockBusy`)
/// are routed through the policy on the implicit paths (`get`, `load`,
/// `get_or_load`, batch operations) and returned as-is from the explicit
/// lock APIs.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The loader already reached a terminal state; a reservation commits or
  /// releases exactly once.
  #[error("value loader was already loaded or released")]
  AlreadyLoaded,

  /// `pessimistic_lock_for_load` was called on a cache built with
  /// pessimistic locking disabled.
  #[error("pessimistic locking is disabled for this cache")]
  PessimisticLockDisabled,

  /// `optimistic_lock_for_load` was called on a cache built with
  /// optimistic locking disabled.
  #[error("optimistic locking is disabled for this cache")]
  OptimisticLockDisabled,

  /// The single-round-trip bulk fetch path cannot be fenced per key, so it
  /// refuses to run while either lock is enabled.
  #[error("bulk fetch is not supported while locking is enabled")]
  BulkFetchUnsupported,

  /// The distributed mutex for this (key, field) is held by another loader.
  #[error("failed to acquire lock for {key}")]
  LockBusy { key: String },

  /// A store or mutex call exceeded the configured operation timeout.
  #[error("cache operation timed out after {0:?}")]
  Timeout(Duration),

  /// The backing store or mutex reported a failure.
  #[error("cache backend failure: {0}")]
  Backend(#[from] StoreError),

  /// A value could not be encoded for storage.
  #[error("codec failure: {0}")]
  Codec(#[from] CodecError),
}

impl CacheError {
  /// Whether this error is a caller-contract violation that must bypass the
  /// failure policy.
  pub(crate) fn is_contract_violation(&self) -> bool {
    matches!(
      self,
      CacheError::AlreadyLoaded
        | CacheError::PessimisticLockDisabled
        | CacheError::OptimisticLockDisabled
        | CacheError::BulkFetchUnsupported
    )
  }
}

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// No codec was configured; the engine cannot move values to or from the
  /// store without one.
  #[error("a codec is required to build a cache")]
  MissingCodec,

  /// `multi_parallelism` must be at least 1.
  #[error("multi_parallelism cannot be zero")]
  ZeroParallelism,
}
