mod common;

use common::RunCounter;
use fibre_memo::{CacheManager, CallError};

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 16;

#[test]
fn test_single_flight_computes_once_under_a_herd() {
  let manager = CacheManager::new();
  let runs = RunCounter::new();
  let counter = runs.clone();
  let slow_square = manager
    .memoize(move |n: u64| {
      counter.bump();
      thread::sleep(Duration::from_millis(50));
      n * n
    })
    .single_flight(true)
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(THREADS));
  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let memo = slow_square.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        *memo.call(12).unwrap()
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(handle.join().unwrap(), 144);
  }
  assert_eq!(runs.get(), 1);
  assert_eq!(slow_square.metrics().computations, 1);
}

#[test]
fn test_single_flight_recovers_from_a_failed_leader() {
  let manager = CacheManager::new();
  let runs = RunCounter::new();
  let counter = runs.clone();
  let flaky = manager
    .try_memoize(move |n: u64| {
      let attempt = counter.bump();
      thread::sleep(Duration::from_millis(30));
      if attempt == 0 {
        Err("first attempt fails")
      } else {
        Ok(n + 1)
      }
    })
    .single_flight(true)
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(THREADS));
  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let memo = flaky.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        memo.try_call(1).map(|v| *v)
      })
    })
    .collect();

  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  let failures = results.iter().filter(|r| matches!(r, Err(CallError::Call(_)))).count();
  let successes = results.iter().filter(|r| matches!(r, Ok(2))).count();
  assert_eq!(failures, 1);
  assert_eq!(successes, THREADS - 1);
  assert_eq!(runs.get(), 2);
}

#[test]
fn test_single_flight_recovers_from_a_panicking_leader() {
  let manager = CacheManager::new();
  let runs = RunCounter::new();
  let counter = runs.clone();
  let entered = Arc::new(Barrier::new(2));
  let leader_inside = entered.clone();
  let fragile = manager
    .memoize(move |n: u64| {
      if counter.bump() == 0 {
        leader_inside.wait();
        thread::sleep(Duration::from_millis(30));
        panic!("leader gives up");
      }
      n * 3
    })
    .single_flight(true)
    .build()
    .unwrap();

  let leader = {
    let memo = fragile.clone();
    thread::spawn(move || memo.call(5).map(|v| *v))
  };
  // The leader now owns the computation, so the follower has to wait on it.
  entered.wait();
  let follower = {
    let memo = fragile.clone();
    thread::spawn(move || memo.call(5).map(|v| *v))
  };

  assert!(leader.join().is_err());
  assert_eq!(follower.join().unwrap().unwrap(), 15);
  assert_eq!(runs.get(), 2);
}

#[test]
fn test_default_mode_lets_concurrent_misses_both_run() {
  let manager = CacheManager::new();
  let runs = RunCounter::new();
  let counter = runs.clone();
  let rendezvous = Arc::new(Barrier::new(2));
  let memo = manager
    .memoize(move |n: u64| {
      let attempt = counter.bump();
      // Both callers must be inside the function before either finishes.
      rendezvous.wait();
      n * 10 + attempt as u64
    })
    .build()
    .unwrap();

  let handles: Vec<_> = (0..2)
    .map(|_| {
      let memo = memo.clone();
      thread::spawn(move || *memo.call(1).unwrap())
    })
    .collect();
  let mut results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  results.sort_unstable();

  assert_eq!(results, vec![10, 11]);
  assert_eq!(runs.get(), 2);
  assert_eq!(memo.cached_len(), 1);

  // Whichever write landed last is what later calls see.
  let cached = *memo.call(1).unwrap();
  assert!(cached == 10 || cached == 11);
  assert_eq!(runs.get(), 2);
}

#[test]
fn test_stores_are_independent_across_threads() {
  let manager = CacheManager::new();
  let handles: Vec<_> = (0..8u64)
    .map(|t| {
      let manager = manager.clone();
      thread::spawn(move || {
        let memo = manager
          .memoize(|n: u64| n * 2)
          .name(format!("worker-{t}"))
          .max_items(4)
          .build()
          .unwrap();
        for n in 0..100 {
          assert_eq!(*memo.call(n % 6).unwrap(), (n % 6) * 2);
        }
        memo.cached_len()
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(handle.join().unwrap(), 4);
  }
  assert_eq!(manager.stats().stores, 8);
}
