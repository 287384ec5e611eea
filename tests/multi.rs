mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn keys(n: usize) -> Vec<String> {
  (0..n).map(|i| format!("k{i}")).collect()
}

#[tokio::test]
async fn multi_get_or_load_resolves_every_key() {
  let rig = common::rig();
  let cache = rig.builder("products").multi_parallelism(3).build().unwrap();
  let keys = keys(10);

  let result = cache
    .multi_get_or_load(&keys, "price", |missing: Vec<String>| async move {
      missing
        .into_iter()
        .map(|k| {
          let v = format!("price-of-{k}");
          (k, v)
        })
        .collect::<HashMap<_, _>>()
    })
    .await
    .unwrap();

  assert_eq!(result.len(), 10);
  for key in &keys {
    assert_eq!(result[key], format!("price-of-{key}"));
  }

  // Everything was persisted along the way.
  let cached = cache.multi_get(&keys, "price").await.unwrap();
  assert_eq!(cached, result);
}

#[tokio::test]
async fn locked_caches_fetch_missing_keys_one_at_a_time() {
  let rig = common::rig();
  let cache = rig.builder("products").build().unwrap();
  let keys = keys(6);
  let calls = AtomicUsize::new(0);

  cache
    .multi_load(
      vec![
        ("k0".to_string(), "seeded-0".to_string()),
        ("k1".to_string(), "seeded-1".to_string()),
      ],
      "price",
      false,
    )
    .await
    .unwrap();

  let result = cache
    .multi_get_or_load(&keys, "price", |missing: Vec<String>| {
      assert_eq!(missing.len(), 1);
      calls.fetch_add(1, Ordering::SeqCst);
      async move {
        missing
          .into_iter()
          .map(|k| {
            let v = format!("fetched-{k}");
            (k, v)
          })
          .collect::<HashMap<_, _>>()
      }
    })
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 4);
  assert_eq!(result.len(), 6);
  assert_eq!(result["k0"], "seeded-0");
  assert_eq!(result["k2"], "fetched-k2");
}

#[tokio::test]
async fn unlocked_caches_use_a_single_bulk_fetch() {
  let rig = common::rig();
  let cache = rig
    .builder("products")
    .pessimistic_lock(false)
    .optimistic_lock(false)
    .build()
    .unwrap();
  let keys = keys(10);
  let calls = AtomicUsize::new(0);
  let seen = Mutex::new(Vec::new());

  cache
    .multi_load(
      vec![
        ("k0".to_string(), "seeded-0".to_string()),
        ("k1".to_string(), "seeded-1".to_string()),
        ("k2".to_string(), "seeded-2".to_string()),
      ],
      "price",
      false,
    )
    .await
    .unwrap();

  let result = cache
    .multi_get_or_load(&keys, "price", |missing: Vec<String>| {
      calls.fetch_add(1, Ordering::SeqCst);
      seen.lock().unwrap().extend(missing.iter().cloned());
      async move {
        missing
          .into_iter()
          .map(|k| {
            let v = format!("fetched-{k}");
            (k, v)
          })
          .collect::<HashMap<_, _>>()
      }
    })
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 1);
  let mut seen = seen.into_inner().unwrap();
  seen.sort();
  assert_eq!(seen, ["k3", "k4", "k5", "k6", "k7", "k8", "k9"]);
  assert_eq!(result.len(), 10);

  // The bulk-fetched values were written through.
  let cached = cache.multi_get(&keys, "price").await.unwrap();
  assert_eq!(cached.len(), 10);
}

#[tokio::test]
async fn origin_misses_stay_absent() {
  let rig = common::rig();
  let cache = rig.builder("products").build().unwrap();
  let keys = keys(6);

  let result = cache
    .multi_get_or_load(&keys, "price", |missing: Vec<String>| async move {
      missing
        .into_iter()
        .filter(|k| k.trim_start_matches('k').parse::<usize>().unwrap() % 2 == 0)
        .map(|k| {
          let v = format!("price-of-{k}");
          (k, v)
        })
        .collect::<HashMap<_, _>>()
    })
    .await
    .unwrap();

  assert_eq!(result.len(), 3);
  assert!(result.contains_key("k0"));
  assert!(!result.contains_key("k1"));

  let cached = cache.multi_get(&keys, "price").await.unwrap();
  assert_eq!(cached.len(), 3);
}

#[tokio::test]
async fn parallelism_does_not_change_the_outcome() {
  for parallelism in [1, 4, 32] {
    let rig = common::rig();
    let cache = rig
      .builder("products")
      .multi_parallelism(parallelism)
      .build()
      .unwrap();
    let keys = keys(13);

    let result = cache
      .multi_get_or_load(&keys, "price", |missing: Vec<String>| async move {
        missing
          .into_iter()
          .map(|k| {
            let v = format!("price-of-{k}");
            (k, v)
          })
          .collect::<HashMap<_, _>>()
      })
      .await
      .unwrap();

    assert_eq!(result.len(), 13, "parallelism {parallelism}");
    for key in &keys {
      assert_eq!(result[key], format!("price-of-{key}"));
    }
  }
}

#[tokio::test]
async fn multi_load_persists_all_entries() {
  let rig = common::rig();
  let cache = rig.builder("products").build().unwrap();
  let keys = keys(5);

  let entries: Vec<(String, String)> = keys
    .iter()
    .map(|k| (k.clone(), format!("seed-{k}")))
    .collect();
  cache.multi_load(entries, "price", false).await.unwrap();

  let cached = cache.multi_get(&keys, "price").await.unwrap();
  assert_eq!(cached.len(), 5);
  assert_eq!(cached["k3"], "seed-k3");
}

#[tokio::test]
async fn empty_batches_are_a_no_op() {
  let rig = common::rig();
  let cache = rig.builder("products").build().unwrap();
  let calls = AtomicUsize::new(0);

  let result = cache
    .multi_get_or_load(&[], "price", |_missing: Vec<String>| {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { HashMap::new() }
    })
    .await
    .unwrap();

  assert!(result.is_empty());
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}
