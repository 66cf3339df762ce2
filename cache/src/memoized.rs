use crate::callable::CallableId;
use crate::digest::Digest;
use crate::error::{CallError, HashError};
use crate::hash::{HashOverrides, StructuralHash};
use crate::kwargs::Kwargs;
use crate::manager::{CacheManager, StoreSettings};
use crate::metrics::MetricsSnapshot;
use crate::store::{CacheStore, Lookup};

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// A receiver whose observable state decides the result of its memoized
/// methods.
///
/// A memoized method is keyed on its arguments plus whatever the receiver
/// returns here, so a call with no arguments still sees state changes.
pub trait Dependent {
  fn dependencies(&self) -> Kwargs;
}

/// Everything a memoized function needs besides the function itself.
pub(crate) struct MemoCore {
  pub(crate) manager: CacheManager,
  pub(crate) id: CallableId,
  pub(crate) overrides: HashOverrides,
  pub(crate) settings: StoreSettings,
  pub(crate) single_flight: bool,
}

impl MemoCore {
  fn key_for<A>(&self, args: &A, kwargs: &Kwargs) -> Result<Digest, HashError>
  where
    A: StructuralHash + ?Sized,
  {
    self
      .manager
      .compute_hash_with(&self.id, args, kwargs, &self.overrides)
  }

  fn store<V: Send + Sync + 'static>(&self) -> Arc<CacheStore<V>> {
    self.manager.store_for(&self.id, &self.settings)
  }

  /// Returns the cached value for `key` or runs `compute` and caches its
  /// result. `compute` always runs without any lock held.
  fn get_or_compute<V, E>(&self, key: Digest, compute: impl FnOnce() -> Result<V, E>) -> Result<Arc<V>, E>
  where
    V: Send + Sync + 'static,
  {
    let store = self.store::<V>();

    if !self.single_flight {
      if let Some(value) = store.get(&key, self.manager.now()) {
        tracing::trace!(callable = %self.id, %key, "cache hit");
        return Ok(value);
      }
      tracing::trace!(callable = %self.id, %key, "cache miss");
      let value = Self::run(&store, compute)?;
      store.put(key, value.clone(), self.manager.now());
      return Ok(value);
    }

    let flight = loop {
      match store.lookup_or_lead(key, self.manager.now()) {
        Lookup::Hit(value) => return Ok(value),
        Lookup::Wait(flight) => {
          tracing::trace!(callable = %self.id, %key, "waiting for in-flight computation");
          if let Some(value) = flight.wait() {
            return Ok(value);
          }
        }
        Lookup::Lead(flight) => break flight,
      }
    };
    // An error or panic drops `flight`, which lets a waiter take over.
    let value = Self::run(&store, compute)?;
    flight.complete(value.clone(), self.manager.now());
    Ok(value)
  }

  fn run<V, E>(store: &CacheStore<V>, compute: impl FnOnce() -> Result<V, E>) -> Result<Arc<V>, E> {
    let mut guard = RunGuard { store, finished: false };
    let result = compute();
    guard.finished = true;
    store.record_computation(result.is_ok());
    result.map(Arc::new)
  }

  fn metrics<V: Send + Sync + 'static>(&self) -> MetricsSnapshot {
    self
      .manager
      .existing_store::<V>(&self.id)
      .map(|store| store.metrics())
      .unwrap_or_default()
  }
}

/// Counts a run that unwinds as a failed computation.
struct RunGuard<'a, V> {
  store: &'a CacheStore<V>,
  finished: bool,
}

impl<V> Drop for RunGuard<'_, V> {
  fn drop(&mut self) {
    if !self.finished {
      self.store.record_computation(false);
    }
  }
}

/// A function whose results are cached by argument.
///
/// Results are handed out as `Arc<V>`. Cloning a `Memoized` is cheap and the
/// clones share one cache.
pub struct Memoized<A, V, E = Infallible> {
  core: Arc<MemoCore>,
  func: Arc<dyn Fn(A) -> Result<V, E> + Send + Sync>,
}

impl<A, V, E> Clone for Memoized<A, V, E> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      func: self.func.clone(),
    }
  }
}

impl<A, V, E> fmt::Debug for Memoized<A, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Memoized")
      .field("callable", &self.core.id)
      .field("settings", &self.core.settings)
      .field("single_flight", &self.core.single_flight)
      .finish_non_exhaustive()
  }
}

impl<A, V, E> Memoized<A, V, E>
where
  A: StructuralHash + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(core: Arc<MemoCore>, func: Arc<dyn Fn(A) -> Result<V, E> + Send + Sync>) -> Self {
    Self { core, func }
  }

  /// Calls the function, or returns the cached result of an earlier call
  /// with structurally equal arguments.
  ///
  /// Errors returned by the function are passed through and not cached.
  pub fn try_call(&self, args: A) -> Result<Arc<V>, CallError<E>> {
    let key = self.core.key_for(&args, &Kwargs::new())?;
    self
      .core
      .get_or_compute(key, || (self.func)(args))
      .map_err(CallError::Call)
  }

  /// The cache key a call with `args` would use.
  pub fn key_for(&self, args: &A) -> Result<Digest, HashError> {
    self.core.key_for(args, &Kwargs::new())
  }

  /// Whether a result for `args` is cached, without counting a lookup.
  pub fn is_cached(&self, args: &A) -> Result<bool, HashError> {
    let key = self.key_for(args)?;
    Ok(
      self
        .core
        .manager
        .existing_store::<V>(&self.core.id)
        .is_some_and(|store| store.contains(&key)),
    )
  }

  /// Number of cached results.
  pub fn cached_len(&self) -> usize {
    self
      .core
      .manager
      .existing_store::<V>(&self.core.id)
      .map_or(0, |store| store.len())
  }

  /// Metrics of the function's store. A store that was cleared or never used
  /// reports all zeros.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.core.metrics::<V>()
  }

  /// Drops this function's cached results only.
  pub fn clear(&self) {
    self.core.manager.remove_store(&self.core.id);
  }

  pub fn id(&self) -> &CallableId {
    &self.core.id
  }

  #[cfg(test)]
  pub(crate) fn store(&self) -> Arc<CacheStore<V>> {
    self.core.store::<V>()
  }
}

impl<A, V> Memoized<A, V, Infallible>
where
  A: StructuralHash + 'static,
  V: Send + Sync + 'static,
{
  /// Calls the function, or returns the cached result of an earlier call
  /// with structurally equal arguments.
  ///
  /// Fails only if the arguments cannot be hashed, in which case the
  /// function is not called.
  pub fn call(&self, args: A) -> Result<Arc<V>, HashError> {
    self.try_call(args).map_err(|err| match err {
      CallError::Hash(err) => err,
      CallError::Call(never) => match never {},
    })
  }
}

/// A memoized method, keyed on its arguments and the receiver's
/// [`Dependent::dependencies`].
pub struct MemoizedMethod<O, A, V, E = Infallible> {
  core: Arc<MemoCore>,
  func: Arc<dyn Fn(&O, A) -> Result<V, E> + Send + Sync>,
}

impl<O, A, V, E> Clone for MemoizedMethod<O, A, V, E> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      func: self.func.clone(),
    }
  }
}

impl<O, A, V, E> fmt::Debug for MemoizedMethod<O, A, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoizedMethod")
      .field("callable", &self.core.id)
      .field("settings", &self.core.settings)
      .finish_non_exhaustive()
  }
}

impl<O, A, V, E> MemoizedMethod<O, A, V, E>
where
  O: Dependent + 'static,
  A: StructuralHash + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(core: Arc<MemoCore>, func: Arc<dyn Fn(&O, A) -> Result<V, E> + Send + Sync>) -> Self {
    Self { core, func }
  }

  pub fn try_call(&self, receiver: &O, args: A) -> Result<Arc<V>, CallError<E>> {
    let key = self.key_for(receiver, &args)?;
    self
      .core
      .get_or_compute(key, || (self.func)(receiver, args))
      .map_err(CallError::Call)
  }

  pub fn key_for(&self, receiver: &O, args: &A) -> Result<Digest, HashError> {
    self.core.key_for(args, &receiver.dependencies())
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.core.metrics::<V>()
  }

  pub fn id(&self) -> &CallableId {
    &self.core.id
  }
}

impl<O, A, V> MemoizedMethod<O, A, V, Infallible>
where
  O: Dependent + 'static,
  A: StructuralHash + 'static,
  V: Send + Sync + 'static,
{
  pub fn call(&self, receiver: &O, args: A) -> Result<Arc<V>, HashError> {
    self.try_call(receiver, args).map_err(|err| match err {
      CallError::Hash(err) => err,
      CallError::Call(never) => match never {},
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn test_second_call_is_served_from_cache() {
    let manager = CacheManager::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let memo = manager
      .memoize(move |(a, b): (i64, i64)| {
        counter.fetch_add(1, Ordering::SeqCst);
        a + b
      })
      .build()
      .unwrap();

    assert_eq!(*memo.call((2, 3)).unwrap(), 5);
    assert_eq!(*memo.call((2, 3)).unwrap(), 5);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(memo.is_cached(&(2, 3)).unwrap());
    assert!(!memo.is_cached(&(3, 2)).unwrap());

    let metrics = memo.metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.computations, 1);
  }

  #[test]
  fn test_clear_drops_only_this_function() {
    let manager = CacheManager::new();
    let a = manager.memoize(|n: u8| n).name("a").build().unwrap();
    let b = manager.memoize(|n: u8| n).name("b").build().unwrap();
    a.call(1).unwrap();
    b.call(1).unwrap();

    a.clear();
    assert_eq!(a.cached_len(), 0);
    assert_eq!(b.cached_len(), 1);
  }

  #[test]
  fn test_errors_are_not_cached() {
    let manager = CacheManager::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let parse = manager
      .try_memoize(move |text: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        text.parse::<i32>()
      })
      .build()
      .unwrap();

    assert!(matches!(parse.try_call("x".to_string()), Err(CallError::Call(_))));
    assert!(matches!(parse.try_call("x".to_string()), Err(CallError::Call(_))));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(parse.cached_len(), 0);
    assert_eq!(parse.metrics().failed_computations, 2);

    assert_eq!(*parse.try_call("7".to_string()).unwrap(), 7);
  }

  #[test]
  fn test_metrics_do_not_create_a_store() {
    let manager = CacheManager::new();
    let memo = manager.memoize(|n: u8| n).build().unwrap();
    assert_eq!(memo.metrics(), MetricsSnapshot::default());
    assert_eq!(manager.stats().stores, 0);

    memo.call(1).unwrap();
    assert_eq!(memo.metrics().inserts, 1);
    assert_eq!(manager.stats().stores, 1);
  }
}
