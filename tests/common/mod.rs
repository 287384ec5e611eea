#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fenced_cache::memory::{MemoryMutex, MemoryStore};
use fenced_cache::{CacheBuilder, Codec, CodecError, FieldStore, StoreError};

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_test_writer()
    .with_env_filter("debug")
    .try_init();
}

/// Test values are plain strings stored as UTF-8, so a decode failure can
/// be provoked with any non-UTF-8 byte sequence.
pub struct StringCodec;

impl Codec<String> for StringCodec {
  fn encode(&self, value: &String) -> Result<Vec<u8>, CodecError> {
    Ok(value.as_bytes().to_vec())
  }

  fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::new(e.to_string()))
  }
}

/// One store and one mutex shared by however many cache handles a test
/// builds, so handles with different versions or names still hit the same
/// backend.
pub struct Rig {
  pub store: Arc<MemoryStore>,
  pub mutex: Arc<MemoryMutex>,
}

impl Rig {
  pub fn builder(&self, name: &str) -> CacheBuilder<String, String> {
    CacheBuilder::new(name)
      .store(self.store.clone())
      .mutex(self.mutex.clone())
      .codec(Arc::new(StringCodec))
  }
}

pub fn rig() -> Rig {
  Rig {
    store: Arc::new(MemoryStore::new()),
    mutex: Arc::new(MemoryMutex::new()),
  }
}

/// A store that fails every call while the switch is flipped on.
pub struct FlakyStore {
  inner: MemoryStore,
  failing: AtomicBool,
}

impl FlakyStore {
  pub fn new() -> Self {
    Self {
      inner: MemoryStore::new(),
      failing: AtomicBool::new(false),
    }
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  fn check(&self) -> Result<(), StoreError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(StoreError::new("injected backend failure"));
    }
    Ok(())
  }
}

#[async_trait]
impl FieldStore for FlakyStore {
  async fn get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
    self.check()?;
    self.inner.get(key, field).await
  }

  async fn set(
    &self,
    key: &str,
    field: &str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> Result<(), StoreError> {
    self.check()?;
    self.inner.set(key, field, value, ttl).await
  }

  async fn incr_by(
    &self,
    key: &str,
    field: &str,
    amount: i64,
    ttl: Duration,
  ) -> Result<i64, StoreError> {
    self.check()?;
    self.inner.incr_by(key, field, amount, ttl).await
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
    self.check()?;
    self.inner.expire(key, ttl).await
  }

  async fn delete(&self, key: &str) -> Result<bool, StoreError> {
    self.check()?;
    self.inner.delete(key).await
  }

  async fn delete_field(&self, key: &str, field: &str) -> Result<bool, StoreError> {
    self.check()?;
    self.inner.delete_field(key, field).await
  }
}

/// A store whose every call stalls for a fixed delay before answering.
pub struct SlowStore {
  inner: MemoryStore,
  delay: Duration,
}

impl SlowStore {
  pub fn new(delay: Duration) -> Self {
    Self {
      inner: MemoryStore::new(),
      delay,
    }
  }
}

#[async_trait]
impl FieldStore for SlowStore {
  async fn get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.get(key, field).await
  }

  async fn set(
    &self,
    key: &str,
    field: &str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> Result<(), StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.set(key, field, value, ttl).await
  }

  async fn incr_by(
    &self,
    key: &str,
    field: &str,
    amount: i64,
    ttl: Duration,
  ) -> Result<i64, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.incr_by(key, field, amount, ttl).await
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.expire(key, ttl).await
  }

  async fn delete(&self, key: &str) -> Result<bool, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.delete(key).await
  }

  async fn delete_field(&self, key: &str, field: &str) -> Result<bool, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.delete_field(key, field).await
  }
}
