mod common;

use std::collections::HashMap;

use fenced_cache::SINGLE_FIELD;

#[tokio::test]
async fn the_single_field_view_round_trips() {
  let rig = common::rig();
  let cache = rig.builder("greetings").build_single().unwrap();
  let key = "en".to_string();

  assert!(cache.get(&key).await.unwrap().is_none());

  let fetched = cache
    .get_or_load(&key, || async { Some("hello".to_string()) })
    .await
    .unwrap();
  assert_eq!(fetched.as_deref(), Some("hello"));
  assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("hello"));

  cache.evict(&key).await.unwrap();
  assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn the_single_view_shares_the_engine() {
  let rig = common::rig();
  let cache = rig.builder("greetings").build_single().unwrap();
  let key = "en".to_string();

  cache
    .load(&key, false, || async { Some("hello".to_string()) })
    .await
    .unwrap();

  // The multi-field engine underneath sees the same entry under the fixed
  // field name.
  assert_eq!(
    cache
      .as_multi_field()
      .get(&key, SINGLE_FIELD)
      .await
      .unwrap()
      .as_deref(),
    Some("hello")
  );
  assert_eq!(cache.metrics().puts, 1);
}

#[tokio::test]
async fn single_field_batches_work() {
  let rig = common::rig();
  let cache = rig.builder("greetings").build_single().unwrap();
  let keys: Vec<String> = ["en", "fr", "de"].map(String::from).to_vec();

  let result = cache
    .multi_get_or_load(&keys, |missing: Vec<String>| async move {
      missing
        .into_iter()
        .map(|k| {
          let v = format!("hello-{k}");
          (k, v)
        })
        .collect::<HashMap<_, _>>()
    })
    .await
    .unwrap();

  assert_eq!(result.len(), 3);
  assert_eq!(result["fr"], "hello-fr");

  let cached = cache.multi_get(&keys).await.unwrap();
  assert_eq!(cached, result);
}

#[tokio::test]
async fn single_field_loaders_are_the_engine_loaders() {
  let rig = common::rig();
  let cache = rig.builder("greetings").build_single().unwrap();
  let key = "en".to_string();

  let loader = cache.lock_for_load(&key).await.unwrap();
  assert!(loader.is_pessimistic());
  assert!(loader.load("hello".to_string()).await.unwrap().success);
  assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("hello"));
}
