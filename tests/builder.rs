mod common;

use std::sync::Arc;

use fenced_cache::{BuildError, CacheBuilder, FieldStore};

#[test]
fn a_codec_is_required() {
  let err = CacheBuilder::<String, String>::new("users")
    .build()
    .unwrap_err();
  assert_eq!(err, BuildError::MissingCodec);
}

#[test]
fn zero_parallelism_is_rejected() {
  let rig = common::rig();
  let err = rig
    .builder("users")
    .multi_parallelism(0)
    .build()
    .unwrap_err();
  assert_eq!(err, BuildError::ZeroParallelism);
}

#[tokio::test]
async fn the_defaults_are_self_contained() {
  // No store or mutex supplied: the in-process implementations serve.
  let cache = CacheBuilder::<String, String>::new("standalone")
    .codec(Arc::new(common::StringCodec))
    .build()
    .unwrap();
  let key = "42".to_string();

  cache
    .get_or_load(&key, "profile", || async { Some("alice".to_string()) })
    .await
    .unwrap();
  assert_eq!(
    cache.get(&key, "profile").await.unwrap().as_deref(),
    Some("alice")
  );
}

#[tokio::test]
async fn custom_key_functions_shape_the_store_key() {
  let rig = common::rig();
  let cache = CacheBuilder::<String, String>::with_key_fn("users", |name: &str, key: &String| {
    format!("{name}/{key}/v2")
  })
  .store(rig.store.clone())
  .mutex(rig.mutex.clone())
  .codec(Arc::new(common::StringCodec))
  .build()
  .unwrap();
  let key = "42".to_string();

  cache
    .get_or_load(&key, "profile", || async { Some("alice".to_string()) })
    .await
    .unwrap();

  // The value lives exactly where the key function said it would.
  let raw = rig
    .store
    .get("users/42/v2", "profile|0001")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(raw, b"alice");
}

#[test]
fn handles_share_one_configuration_cell() {
  let rig = common::rig();
  let cache = rig.builder("users").build().unwrap();
  let clone = cache.clone();

  cache.options().set_apply_ttl_if_hit(true);
  assert!(clone.options().apply_ttl_if_hit());
  assert_eq!(cache.name(), "users");
}
