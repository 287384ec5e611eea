//! Contracts of the external collaborators the engine consumes.
//!
//! The engine depends only on these narrow interfaces; the wire-level
//! implementations (a Redis-cluster client, the in-process
//! [`MemoryStore`](crate::memory::MemoryStore)) live behind them and carry
//! no coherence logic of their own.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// A key/field byte-value store.
///
/// TTL is per store key, shared by all fields under it: `set` and `incr_by`
/// refresh the key's expiry, and `expire` resets it explicitly.
#[async_trait]
pub trait FieldStore: Send + Sync {
  /// Reads one field. Absent fields and absent keys are both `None`.
  async fn get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError>;

  /// Writes one field and refreshes the key's TTL.
  async fn set(
    &self,
    key: &str,
    field: &str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> Result<(), StoreError>;

  /// Atomically adds `amount` to an integer field (created at zero when
  /// absent), refreshing the key's TTL. Returns the new value.
  async fn incr_by(
    &self,
    key: &str,
    field: &str,
    amount: i64,
    ttl: Duration,
  ) -> Result<i64, StoreError>;

  /// Resets the key's TTL. Returns whether the key existed.
  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

  /// Deletes a key and every field under it. Returns whether it existed.
  async fn delete(&self, key: &str) -> Result<bool, StoreError>;

  /// Deletes one field. Returns whether it existed.
  async fn delete_field(&self, key: &str, field: &str) -> Result<bool, StoreError>;
}

/// A distributed, TTL-bounded mutex.
///
/// An abandoned hold is reclaimed by its TTL; the engine relies on that as
/// the fail-safe for loaders that never reach a terminal state.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
  /// Tries to acquire the mutex for `ttl`. Returns `false` when it is
  /// already held. Never blocks waiting for the holder.
  async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

  /// Releases the mutex. Returns whether it was held.
  async fn release(&self, key: &str) -> Result<bool, StoreError>;

  /// Whether the mutex is currently held by anyone.
  async fn is_acquired(&self, key: &str) -> Result<bool, StoreError>;
}
