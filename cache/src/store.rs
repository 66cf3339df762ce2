use crate::digest::Digest;
use crate::entry::CacheEntry;
use crate::inflight::InFlight;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{CachePolicy, EvictionPolicy};

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

struct StoreInner<V> {
  entries: HashMap<Digest, CacheEntry<V>>,
  /// Keys currently being computed by a single-flight leader.
  pending: HashMap<Digest, Arc<InFlight<V>>>,
  next_seq: u64,
}

/// A bounded map from call digests to cached values, owned by one memoized
/// function.
///
/// Every operation takes the store's lock for its whole duration, so reads,
/// writes and evictions on one store are linearized. Timestamps are passed in
/// by the caller, which keeps the store independent of any particular clock.
///
/// Expiry is lazy: `get` will still return an entry past its time-to-live;
/// such entries are removed by the sweep at the start of the next `put`.
pub struct CacheStore<V> {
  inner: Mutex<StoreInner<V>>,
  name: Cow<'static, str>,
  max_items: Option<usize>,
  ttl: Option<Duration>,
  policy: Arc<dyn CachePolicy>,
  metrics: Metrics,
}

impl<V> fmt::Debug for CacheStore<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStore")
      .field("name", &self.name)
      .field("len", &self.len())
      .field("max_items", &self.max_items)
      .field("ttl", &self.ttl)
      .field("policy", &self.policy.name())
      .finish()
  }
}

impl<V> CacheStore<V> {
  /// Creates an empty store. `None` for `max_items` or `ttl` turns the
  /// respective limit off.
  pub fn new(max_items: Option<usize>, policy: Arc<dyn CachePolicy>, ttl: Option<Duration>) -> Self {
    Self {
      inner: Mutex::new(StoreInner {
        entries: HashMap::new(),
        pending: HashMap::new(),
        next_seq: 0,
      }),
      name: Cow::Borrowed("anonymous"),
      max_items,
      ttl,
      policy,
      metrics: Metrics::new(),
    }
  }

  /// Shorthand for a store running one of the built-in policies.
  pub fn with_policy(max_items: Option<usize>, policy: EvictionPolicy, ttl: Option<Duration>) -> Self {
    Self::new(max_items, policy.into_policy(), ttl)
  }

  /// Sets the name the store logs under.
  pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
    self.name = name.into();
    self
  }

  /// Looks up `key`, recording a hit at `now` if present.
  pub fn get(&self, key: &Digest, now: Duration) -> Option<Arc<V>> {
    let mut inner = self.inner.lock();
    self.get_locked(&mut inner, key, now)
  }

  fn get_locked(&self, inner: &mut StoreInner<V>, key: &Digest, now: Duration) -> Option<Arc<V>> {
    match inner.entries.get_mut(key) {
      Some(entry) => {
        Metrics::record(&self.metrics.hits, 1);
        Some(entry.touch(now))
      }
      None => {
        Metrics::record(&self.metrics.misses, 1);
        None
      }
    }
  }

  /// Stores `value` under `key`.
  ///
  /// Expired entries are swept first. A new key arriving at a full store
  /// evicts exactly one entry chosen by the policy. Overwriting an existing
  /// key keeps its place in insertion order and resets its bookkeeping.
  pub fn put(&self, key: Digest, value: Arc<V>, now: Duration) {
    let mut inner = self.inner.lock();
    self.put_locked(&mut inner, key, value, now);
  }

  fn put_locked(&self, inner: &mut StoreInner<V>, key: Digest, value: Arc<V>, now: Duration) {
    self.sweep_locked(inner, now);

    if let Some(entry) = inner.entries.get_mut(&key) {
      entry.reset(value, now);
      Metrics::record(&self.metrics.updates, 1);
      return;
    }

    self.evict_locked(inner, now);
    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.entries.insert(key, CacheEntry::new(value, seq, now));
    Metrics::record(&self.metrics.inserts, 1);
  }

  /// Evicts one entry if the store is at or above `max_items`. Returns the
  /// evicted key.
  pub fn evict_if_needed(&self, now: Duration) -> Option<Digest> {
    let mut inner = self.inner.lock();
    self.evict_locked(&mut inner, now)
  }

  fn evict_locked(&self, inner: &mut StoreInner<V>, now: Duration) -> Option<Digest> {
    let max_items = self.max_items?;
    if inner.entries.len() < max_items {
      return None;
    }

    let victim = {
      let mut metas = inner.entries.iter().map(|(key, entry)| entry.meta(key));
      self.policy.select_victim(&mut metas, now)
    }?;

    inner.entries.remove(&victim)?;
    Metrics::record(&self.metrics.evicted_by_capacity, 1);
    tracing::trace!(
      store = %self.name,
      key = %victim,
      policy = self.policy.name(),
      "evicted entry at capacity"
    );
    Some(victim)
  }

  /// Removes every entry that has outlived the time-to-live. Returns how
  /// many were removed.
  pub fn sweep_expired(&self, now: Duration) -> usize {
    let mut inner = self.inner.lock();
    self.sweep_locked(&mut inner, now)
  }

  fn sweep_locked(&self, inner: &mut StoreInner<V>, now: Duration) -> usize {
    if self.ttl.is_none() {
      return 0;
    }
    let before = inner.entries.len();
    inner.entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
    let removed = before - inner.entries.len();
    if removed > 0 {
      Metrics::record(&self.metrics.evicted_by_ttl, removed as u64);
      tracing::debug!(store = %self.name, removed, "swept expired entries");
    }
    removed
  }

  pub fn len(&self) -> usize {
    self.inner.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Checks for `key` without counting a hit or a miss.
  pub fn contains(&self, key: &Digest) -> bool {
    self.inner.lock().entries.contains_key(key)
  }

  /// All keys, in insertion order.
  pub fn keys(&self) -> Vec<Digest> {
    let inner = self.inner.lock();
    let mut keyed: Vec<(u64, Digest)> = inner.entries.iter().map(|(k, e)| (e.seq, *k)).collect();
    keyed.sort_unstable_by_key(|(seq, _)| *seq);
    keyed.into_iter().map(|(_, k)| k).collect()
  }

  /// Drops every entry. Computations already in flight are unaffected.
  pub fn clear(&self) {
    let mut inner = self.inner.lock();
    let dropped = inner.entries.len();
    inner.entries.clear();
    Metrics::record(&self.metrics.invalidations, dropped as u64);
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot(self.len())
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn max_items(&self) -> Option<usize> {
    self.max_items
  }

  pub fn ttl(&self) -> Option<Duration> {
    self.ttl
  }

  pub fn policy_name(&self) -> &'static str {
    self.policy.name()
  }

  pub(crate) fn record_computation(&self, ok: bool) {
    Metrics::record(&self.metrics.computations, 1);
    if !ok {
      Metrics::record(&self.metrics.failed_computations, 1);
    }
  }

  /// Looks up `key` and, on a miss, either joins the computation another
  /// thread already runs for it or registers the caller as its leader.
  pub(crate) fn lookup_or_lead(&self, key: Digest, now: Duration) -> Lookup<'_, V> {
    let mut inner = self.inner.lock();
    if let Some(value) = self.get_locked(&mut inner, &key, now) {
      return Lookup::Hit(value);
    }
    if let Some(flight) = inner.pending.get(&key) {
      return Lookup::Wait(flight.clone());
    }
    let flight = Arc::new(InFlight::new());
    inner.pending.insert(key, flight.clone());
    Lookup::Lead(Flight {
      store: self,
      key,
      flight,
      settled: false,
    })
  }

  /// Removes the pending marker for `key` if it still belongs to `flight`.
  fn land(&self, inner: &mut StoreInner<V>, key: &Digest, flight: &Arc<InFlight<V>>) {
    if inner.pending.get(key).is_some_and(|p| Arc::ptr_eq(p, flight)) {
      inner.pending.remove(key);
    }
  }
}

pub(crate) enum Lookup<'a, V> {
  Hit(Arc<V>),
  Wait(Arc<InFlight<V>>),
  Lead(Flight<'a, V>),
}

/// Leadership of one key's computation.
///
/// Dropping the guard without calling [`complete`](Flight::complete), for
/// example because the function failed or panicked, abandons the flight and
/// wakes the waiters so one of them can take over.
pub(crate) struct Flight<'a, V> {
  store: &'a CacheStore<V>,
  key: Digest,
  flight: Arc<InFlight<V>>,
  settled: bool,
}

impl<V> Flight<'_, V> {
  /// Stores the value and hands it to every waiter.
  pub(crate) fn complete(mut self, value: Arc<V>, now: Duration) {
    {
      let mut inner = self.store.inner.lock();
      self.store.put_locked(&mut inner, self.key, value.clone(), now);
      self.store.land(&mut inner, &self.key, &self.flight);
    }
    self.flight.complete(value);
    self.settled = true;
  }
}

impl<V> Drop for Flight<'_, V> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    {
      let mut inner = self.store.inner.lock();
      self.store.land(&mut inner, &self.key, &self.flight);
    }
    self.flight.abandon();
    tracing::debug!(store = %self.store.name, key = %self.key, "abandoned in-flight computation");
  }
}
