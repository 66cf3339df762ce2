use crate::builder::{Fallible, MemoizeBuilder, Plain};
use crate::callable::CallableId;
use crate::digest::Digest;
use crate::error::HashError;
use crate::hash::{Combiner, HashContext, HashOverrides, NativeKey, StructuralHash};
use crate::kwargs::Kwargs;
use crate::policy::CachePolicy;
use crate::store::CacheStore;
use crate::time::{Clock, MonotonicClock};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

type MemoKey = (CallableId, NativeKey, NativeKey);
type AnyStore = Arc<dyn Any + Send + Sync>;

static NO_OVERRIDES: Lazy<HashOverrides> = Lazy::new(HashOverrides::new);
static GLOBAL: Lazy<CacheManager> = Lazy::new(CacheManager::new);

/// The process-wide manager used by the free functions of this crate.
pub fn global() -> &'static CacheManager {
  &GLOBAL
}

/// How a store is created the first time its function is called.
#[derive(Debug, Clone)]
pub(crate) struct StoreSettings {
  pub(crate) max_items: Option<usize>,
  pub(crate) policy: Arc<dyn CachePolicy>,
  pub(crate) ttl: Option<Duration>,
}

struct ManagerInner {
  stores: RwLock<HashMap<CallableId, AnyStore>>,
  hash_memo: Mutex<HashMap<MemoKey, Digest>>,
  clock: Arc<dyn Clock>,
}

/// Owns the cache stores of a set of memoized functions and the memo of
/// already computed argument digests.
///
/// Cloning is cheap and yields a handle to the same manager. Most programs use
/// the one returned by [`global`]; tests and embedders that want isolation
/// create their own.
#[derive(Clone)]
pub struct CacheManager {
  inner: Arc<ManagerInner>,
}

/// Counts reported by [`CacheManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
  /// Stores currently alive, one per memoized function that has been called.
  pub stores: usize,
  /// Entries in the argument-digest memo.
  pub memoized_hashes: usize,
}

impl fmt::Debug for CacheManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheManager")
      .field("stats", &self.stats())
      .field("clock", &self.inner.clock)
      .finish()
  }
}

impl Default for CacheManager {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheManager {
  pub fn new() -> Self {
    Self::with_clock(Arc::new(MonotonicClock))
  }

  /// A manager whose stores take their timestamps from `clock`.
  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self {
      inner: Arc::new(ManagerInner {
        stores: RwLock::new(HashMap::new()),
        hash_memo: Mutex::new(HashMap::new()),
        clock,
      }),
    }
  }

  pub(crate) fn now(&self) -> Duration {
    self.inner.clock.now()
  }

  /// Starts configuring a memoized version of `func`.
  ///
  /// `func` takes its arguments as a single value, usually a tuple.
  ///
  /// ```
  /// use fibre_memo::CacheManager;
  ///
  /// let manager = CacheManager::new();
  /// let square = manager
  ///   .memoize(|n: u64| n * n)
  ///   .max_items(128)
  ///   .policy("lfu")
  ///   .build()
  ///   .unwrap();
  /// assert_eq!(*square.call(12).unwrap(), 144);
  /// ```
  pub fn memoize<F: 'static>(&self, func: F) -> MemoizeBuilder<F, Plain> {
    MemoizeBuilder::new(self.clone(), func)
  }

  /// Same as [`memoize`](Self::memoize) for functions returning `Result`.
  /// Errors are passed through and never cached.
  pub fn try_memoize<F: 'static>(&self, func: F) -> MemoizeBuilder<F, Fallible> {
    MemoizeBuilder::new(self.clone(), func)
  }

  /// Computes the cache key of a call to `callable` with `args` and
  /// `kwargs`.
  ///
  /// The key is `md5(H(callable) ++ H(args) ++ H(kwargs))`, where `args` of
  /// `()` and empty `kwargs` are left out. When both parts
  /// have native keys the result is remembered, and the next call with equal
  /// arguments skips the structural hash.
  pub fn compute_hash<A>(&self, callable: &CallableId, args: &A, kwargs: &Kwargs) -> Result<Digest, HashError>
  where
    A: StructuralHash + ?Sized,
  {
    self.compute_hash_with(callable, args, kwargs, &NO_OVERRIDES)
  }

  pub(crate) fn compute_hash_with<A>(
    &self,
    callable: &CallableId,
    args: &A,
    kwargs: &Kwargs,
    overrides: &HashOverrides,
  ) -> Result<Digest, HashError>
  where
    A: StructuralHash + ?Sized,
  {
    let args_key = args.native_key();
    let args_empty = matches!(&args_key, Some(NativeKey::Tuple(items)) if items.is_empty());

    // A digest shaped by overrides must not be served to a caller without
    // them, so only override-free hashes are remembered.
    let memo_key = if overrides.is_empty() {
      args_key
        .zip(kwargs.native_key())
        .map(|(a, k)| (callable.clone(), a, k))
    } else {
      None
    };

    if let Some(memo_key) = &memo_key {
      if let Some(digest) = self.inner.hash_memo.lock().get(memo_key) {
        return Ok(*digest);
      }
    }

    let mut ctx = HashContext::new(overrides);
    let mut parts = Combiner::untagged();
    parts.push(ctx.hash(callable)?);
    if !args_empty {
      parts.push(ctx.hash(args)?);
    }
    if !kwargs.is_empty() {
      parts.push(ctx.hash(kwargs)?);
    }
    let digest = parts.finish_digest();

    if let Some(memo_key) = memo_key {
      self.inner.hash_memo.lock().insert(memo_key, digest);
    }
    Ok(digest)
  }

  /// Returns the store for `id`, creating it from `settings` if needed.
  pub(crate) fn store_for<V>(&self, id: &CallableId, settings: &StoreSettings) -> Arc<CacheStore<V>>
  where
    V: Send + Sync + 'static,
  {
    if let Some(store) = self.inner.stores.read().get(id) {
      if let Ok(store) = store.clone().downcast::<CacheStore<V>>() {
        return store;
      }
    }

    let mut stores = self.inner.stores.write();
    if let Some(existing) = stores.get(id) {
      match existing.clone().downcast::<CacheStore<V>>() {
        Ok(store) => return store,
        Err(_) => tracing::warn!(
          callable = %id,
          "replacing cache store holding a different value type"
        ),
      }
    }

    let store = Arc::new(
      CacheStore::new(settings.max_items, settings.policy.clone(), settings.ttl).named(id.name().to_string()),
    );
    tracing::debug!(
      callable = %id,
      max_items = ?settings.max_items,
      ttl = ?settings.ttl,
      policy = settings.policy.name(),
      "created cache store"
    );
    stores.insert(id.clone(), store.clone());
    store
  }

  /// Looks up the store for `id` without creating it.
  pub(crate) fn existing_store<V>(&self, id: &CallableId) -> Option<Arc<CacheStore<V>>>
  where
    V: Send + Sync + 'static,
  {
    let store = self.inner.stores.read().get(id)?.clone();
    store.downcast::<CacheStore<V>>().ok()
  }

  /// Drops the store of a single function.
  pub(crate) fn remove_store(&self, id: &CallableId) -> bool {
    self.inner.stores.write().remove(id).is_some()
  }

  /// Drops every store. Each memoized function starts over with an empty
  /// store on its next call. The argument-digest memo is kept; see
  /// [`clear_hash_memo`](Self::clear_hash_memo).
  pub fn clear_cache(&self) {
    let dropped = {
      let mut stores = self.inner.stores.write();
      let dropped = stores.len();
      stores.clear();
      dropped
    };
    tracing::debug!(stores = dropped, "cleared all cache stores");
  }

  /// Forgets every remembered argument digest.
  ///
  /// The memo grows with the number of distinct native argument sets seen
  /// and is never trimmed on its own; long-running processes with many
  /// distinct arguments should call this periodically.
  pub fn clear_hash_memo(&self) {
    self.inner.hash_memo.lock().clear();
  }

  pub fn stats(&self) -> ManagerStats {
    ManagerStats {
      stores: self.inner.stores.read().len(),
      memoized_hashes: self.inner.hash_memo.lock().len(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hash::ByIdentity;
  use crate::policy::EvictionPolicy;

  fn id() -> CallableId {
    CallableId::named::<fn(u32) -> u32>("square")
  }

  #[test]
  fn test_equal_arguments_give_equal_keys() {
    let manager = CacheManager::new();
    let kwargs = Kwargs::new().with("scale", 2);
    let a = manager.compute_hash(&id(), &(1, "x"), &kwargs).unwrap();
    let b = manager.compute_hash(&id(), &(1, "x"), &kwargs).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_hex().len(), 32);
    assert_ne!(a, manager.compute_hash(&id(), &(2, "x"), &kwargs).unwrap());
    assert_ne!(a, manager.compute_hash(&id(), &(1, "x"), &Kwargs::new()).unwrap());
  }

  #[test]
  fn test_callable_is_part_of_the_key() {
    let manager = CacheManager::new();
    let other = id().with_name("cube");
    assert_ne!(
      manager.compute_hash(&id(), &3, &Kwargs::new()).unwrap(),
      manager.compute_hash(&other, &3, &Kwargs::new()).unwrap()
    );
  }

  #[test]
  fn test_memo_holds_native_arguments_only() {
    let manager = CacheManager::new();
    manager.compute_hash(&id(), &(1, 2.5, "s"), &Kwargs::new()).unwrap();
    assert_eq!(manager.stats().memoized_hashes, 1);

    manager
      .compute_hash(&id(), &ByIdentity::new(vec![1]), &Kwargs::new())
      .unwrap();
    assert_eq!(manager.stats().memoized_hashes, 1);

    manager.clear_hash_memo();
    assert_eq!(manager.stats().memoized_hashes, 0);
  }

  #[test]
  fn test_unit_arguments_are_left_out_of_the_key() {
    let manager = CacheManager::new();
    let mut parts = Combiner::untagged();
    parts.push(HashContext::new(&NO_OVERRIDES).hash(&id()).unwrap());
    let callable_only = parts.finish_digest();

    assert_eq!(manager.compute_hash(&id(), &(), &Kwargs::new()).unwrap(), callable_only);
    assert_ne!(
      manager.compute_hash(&id(), &None::<u8>, &Kwargs::new()).unwrap(),
      callable_only
    );
  }

  #[test]
  fn test_memoized_and_fresh_digests_agree() {
    let manager = CacheManager::new();
    let first = manager.compute_hash(&id(), &vec![1, 2, 3], &Kwargs::new()).unwrap();
    let remembered = manager.compute_hash(&id(), &vec![1, 2, 3], &Kwargs::new()).unwrap();
    manager.clear_hash_memo();
    let fresh = manager.compute_hash(&id(), &vec![1, 2, 3], &Kwargs::new()).unwrap();
    assert_eq!(first, remembered);
    assert_eq!(first, fresh);
  }

  #[test]
  fn test_stores_are_created_once_and_cleared() {
    let manager = CacheManager::new();
    let settings = StoreSettings {
      max_items: Some(4),
      policy: EvictionPolicy::Fifo.into_policy(),
      ttl: None,
    };
    let a = manager.store_for::<u32>(&id(), &settings);
    let b = manager.store_for::<u32>(&id(), &settings);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.policy_name(), "FIFO");
    assert_eq!(manager.stats().stores, 1);

    manager.clear_cache();
    manager.clear_cache();
    assert_eq!(manager.stats().stores, 0);
    assert!(manager.existing_store::<u32>(&id()).is_none());
  }
}
