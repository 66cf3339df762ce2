mod common;

use common::{manual_manager, secs, RunCounter};

#[test]
fn test_entry_expires_on_the_next_put() {
  let (manager, clock) = manual_manager();
  let runs = RunCounter::new();
  let counter = runs.clone();
  let memo = manager
    .memoize(move |n: u32| {
      counter.bump();
      n * 10
    })
    .ttl_secs(1.0)
    .build()
    .unwrap();

  memo.call(1).unwrap();

  clock.set(secs(0.5));
  assert!(memo.is_cached(&1).unwrap());
  memo.call(1).unwrap();
  assert_eq!(runs.get(), 1);

  // At exactly the TTL the entry is stale but still served until a put.
  clock.set(secs(1.0));
  memo.call(1).unwrap();
  assert_eq!(runs.get(), 1);

  memo.call(2).unwrap();
  assert!(!memo.is_cached(&1).unwrap());
  assert_eq!(memo.metrics().evicted_by_ttl, 1);

  memo.call(1).unwrap();
  assert_eq!(runs.get(), 3);
}

#[test]
fn test_hits_do_not_extend_the_lifetime() {
  let (manager, clock) = manual_manager();
  let memo = manager.memoize(|n: u32| n).ttl(secs(2.0)).build().unwrap();

  memo.call(1).unwrap();
  for step in 1..=3 {
    clock.set(secs(0.5 * step as f64));
    memo.call(1).unwrap();
  }
  clock.set(secs(2.0));
  memo.call(2).unwrap();
  assert!(!memo.is_cached(&1).unwrap());
  assert!(memo.is_cached(&2).unwrap());
}

#[test]
fn test_no_ttl_never_expires() {
  let (manager, clock) = manual_manager();
  let memo = manager.memoize(|n: u32| n).build().unwrap();
  memo.call(1).unwrap();
  clock.set(secs(1.0e6));
  memo.call(2).unwrap();
  assert!(memo.is_cached(&1).unwrap());
}
