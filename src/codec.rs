use crate::error::CodecError;

/// Moves values across the byte boundary of the backing store.
///
/// A decode failure on the read path is treated as a cache miss, so a codec
/// change that cannot read old bytes degrades to refetching, not to errors.
/// Prefer pairing a codec change with a new
/// [`version`](crate::builder::CacheBuilder::version) anyway: version
/// isolation keeps the layouts from ever meeting.
pub trait Codec<V>: Send + Sync {
  fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError>;
  fn decode(&self, bytes: &[u8]) -> Result<V, CodecError>;
}

#[cfg(feature = "serde")]
pub use self::bincode_codec::BincodeCodec;

#[cfg(feature = "serde")]
mod bincode_codec {
  use std::marker::PhantomData;

  use serde::de::DeserializeOwned;
  use serde::Serialize;

  use super::Codec;
  use crate::error::CodecError;

  /// A [`Codec`] backed by `bincode` for any serde-serializable value.
  pub struct BincodeCodec<V> {
    _marker: PhantomData<fn() -> V>,
  }

  impl<V> BincodeCodec<V> {
    pub fn new() -> Self {
      Self {
        _marker: PhantomData,
      }
    }
  }

  impl<V> Default for BincodeCodec<V> {
    fn default() -> Self {
      Self::new()
    }
  }

  impl<V> Codec<V> for BincodeCodec<V>
  where
    V: Serialize + DeserializeOwned + Send + Sync,
  {
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError> {
      bincode::serialize(value).map_err(|e| CodecError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError> {
      bincode::deserialize(bytes).map_err(|e| CodecError::new(e.to_string()))
    }
  }

}
