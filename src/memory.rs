//! In-process reference implementations of the collaborator contracts.
//!
//! These mirror the semantics the engine expects from a remote hash-store
//! (per-key TTL shared by all fields, integer sub-counters, expiring mutex
//! holds) and are what the test suite runs against.

use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::{DistributedMutex, FieldStore};

enum FieldValue {
  Bytes(Vec<u8>),
  Counter(i64),
}

struct KeyEntry {
  fields: HashMap<String, FieldValue>,
  expires_at: Option<Instant>,
}

impl KeyEntry {
  fn new() -> Self {
    Self {
      fields: HashMap::new(),
      expires_at: None,
    }
  }

  fn is_expired(&self, now: Instant) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// An in-memory [`FieldStore`] with lazy, per-key expiry.
#[derive(Default)]
pub struct MemoryStore {
  keys: Mutex<HashMap<String, KeyEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drops every key. Test convenience.
  pub fn clear(&self) {
    self.keys.lock().clear();
  }

  fn with_live_entry<R>(
    &self,
    key: &str,
    f: impl FnOnce(Option<&mut KeyEntry>) -> R,
  ) -> R {
    let now = Instant::now();
    let mut keys = self.keys.lock();
    if keys.get(key).is_some_and(|entry| entry.is_expired(now)) {
      keys.remove(key);
    }
    f(keys.get_mut(key))
  }
}

#[async_trait]
impl FieldStore for MemoryStore {
  async fn get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(self.with_live_entry(key, |entry| {
      entry.and_then(|e| match e.fields.get(field) {
        Some(FieldValue::Bytes(bytes)) => Some(bytes.clone()),
        Some(FieldValue::Counter(n)) => Some(n.to_string().into_bytes()),
        None => None,
      })
    }))
  }

  async fn set(
    &self,
    key: &str,
    field: &str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> Result<(), StoreError> {
    let now = Instant::now();
    let mut keys = self.keys.lock();
    if keys.get(key).is_some_and(|entry| entry.is_expired(now)) {
      keys.remove(key);
    }
    let entry = keys.entry(key.to_string()).or_insert_with(KeyEntry::new);
    entry.fields.insert(field.to_string(), FieldValue::Bytes(value));
    entry.expires_at = Some(now + ttl);
    Ok(())
  }

  async fn incr_by(
    &self,
    key: &str,
    field: &str,
    amount: i64,
    ttl: Duration,
  ) -> Result<i64, StoreError> {
    let now = Instant::now();
    let mut keys = self.keys.lock();
    if keys.get(key).is_some_and(|entry| entry.is_expired(now)) {
      keys.remove(key);
    }
    let entry = keys.entry(key.to_string()).or_insert_with(KeyEntry::new);
    let value = entry
      .fields
      .entry(field.to_string())
      .or_insert(FieldValue::Counter(0));
    let next = match value {
      FieldValue::Counter(n) => {
        *n += amount;
        *n
      }
      FieldValue::Bytes(_) => {
        return Err(StoreError::new(format!(
          "field {field} of {key} does not hold an integer"
        )))
      }
    };
    entry.expires_at = Some(now + ttl);
    Ok(next)
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
    Ok(self.with_live_entry(key, |entry| match entry {
      Some(e) => {
        e.expires_at = Some(Instant::now() + ttl);
        true
      }
      None => false,
    }))
  }

  async fn delete(&self, key: &str) -> Result<bool, StoreError> {
    let now = Instant::now();
    let mut keys = self.keys.lock();
    Ok(match keys.remove(key) {
      Some(entry) => !entry.is_expired(now),
      None => false,
    })
  }

  async fn delete_field(&self, key: &str, field: &str) -> Result<bool, StoreError> {
    Ok(self.with_live_entry(key, |entry| {
      entry.is_some_and(|e| e.fields.remove(field).is_some())
    }))
  }
}

/// An in-memory [`DistributedMutex`] of expiring holds.
#[derive(Default)]
pub struct MemoryMutex {
  holds: Mutex<HashMap<String, Instant>>,
}

impl MemoryMutex {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl DistributedMutex for MemoryMutex {
  async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
    let now = Instant::now();
    let mut holds = self.holds.lock();
    if holds.get(key).is_some_and(|expires| *expires > now) {
      return Ok(false);
    }
    holds.insert(key.to_string(), now + ttl);
    Ok(true)
  }

  async fn release(&self, key: &str) -> Result<bool, StoreError> {
    let now = Instant::now();
    let mut holds = self.holds.lock();
    Ok(match holds.remove(key) {
      Some(expires) => expires > now,
      None => false,
    })
  }

  async fn is_acquired(&self, key: &str) -> Result<bool, StoreError> {
    let now = Instant::now();
    let holds = self.holds.lock();
    Ok(holds.get(key).is_some_and(|expires| *expires > now))
  }
}
