use crate::callable::CallableId;
use crate::config::{check_capacity, ttl_from_secs, CacheConfig};
use crate::error::{BoxError, BuildError};
use crate::hash::{HashOverrides, StructuralHash};
use crate::manager::{CacheManager, StoreSettings};
use crate::memoized::{Dependent, MemoCore, Memoized, MemoizedMethod};
use crate::policy::{CachePolicy, EvictionPolicy};

use std::any::Any;
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Marks a builder for a function returning its value directly.
#[derive(Debug)]
pub struct Plain;

/// Marks a builder for a function returning `Result`.
#[derive(Debug)]
pub struct Fallible;

enum PolicyChoice {
  Named(String),
  Builtin(EvictionPolicy),
  Custom(Arc<dyn CachePolicy>),
}

enum TtlChoice {
  Exact(Duration),
  Secs(f64),
}

/// Configures a memoized function. Created by
/// [`CacheManager::memoize`] or [`CacheManager::try_memoize`].
///
/// Defaults: unbounded, LRU, no time-to-live, no single-flight, no hash
/// overrides. Settings are validated by `build`.
pub struct MemoizeBuilder<F, M = Plain> {
  manager: CacheManager,
  func: F,
  id: CallableId,
  overrides: HashOverrides,
  max_items: Option<usize>,
  policy: PolicyChoice,
  ttl: Option<TtlChoice>,
  single_flight: bool,
  _mode: PhantomData<M>,
}

impl<F, M> fmt::Debug for MemoizeBuilder<F, M> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let policy = match &self.policy {
      PolicyChoice::Named(name) => name.as_str(),
      PolicyChoice::Builtin(policy) => policy.as_str(),
      PolicyChoice::Custom(policy) => policy.name(),
    };
    f.debug_struct("MemoizeBuilder")
      .field("callable", &self.id)
      .field("max_items", &self.max_items)
      .field("policy", &policy)
      .field("single_flight", &self.single_flight)
      .field("overrides", &self.overrides)
      .finish_non_exhaustive()
  }
}

impl<F: 'static, M> MemoizeBuilder<F, M> {
  pub(crate) fn new(manager: CacheManager, func: F) -> Self {
    Self {
      manager,
      func,
      id: CallableId::of::<F>(),
      overrides: HashOverrides::new(),
      max_items: None,
      policy: PolicyChoice::Builtin(EvictionPolicy::default()),
      ttl: None,
      single_flight: false,
      _mode: PhantomData,
    }
  }
}

impl<F, M> MemoizeBuilder<F, M> {
  /// Hashes arguments of type `T` with `hasher` instead of their built-in
  /// rule.
  pub fn hash_override<T, H, E>(mut self, hasher: H) -> Self
  where
    T: Any,
    H: Fn(&T) -> Result<Vec<u8>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.overrides.register::<T, H, E>(hasher);
    self
  }

  /// Adds every override in `overrides`.
  pub fn hash_overrides(mut self, overrides: &HashOverrides) -> Self {
    self.overrides.extend(overrides);
    self
  }

  /// Bounds the number of cached results.
  pub fn max_items(mut self, max_items: usize) -> Self {
    self.max_items = Some(max_items);
    self
  }

  /// Selects the eviction policy by name: `"FIFO"`, `"LRU"` or `"LFU"`, in
  /// any case. An unknown name fails the build.
  pub fn policy(mut self, name: impl Into<String>) -> Self {
    self.policy = PolicyChoice::Named(name.into());
    self
  }

  pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
    self.policy = PolicyChoice::Builtin(policy);
    self
  }

  /// Uses a custom eviction policy.
  pub fn cache_policy<P>(mut self, policy: P) -> Self
  where
    P: CachePolicy + 'static,
  {
    self.policy = PolicyChoice::Custom(Arc::new(policy));
    self
  }

  /// Sets the time-to-live of cached results.
  pub fn ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(TtlChoice::Exact(ttl));
    self
  }

  /// Sets the time-to-live in seconds. Negative or non-finite values fail the
  /// build.
  pub fn ttl_secs(mut self, secs: f64) -> Self {
    self.ttl = Some(TtlChoice::Secs(secs));
    self
  }

  /// Names the function in logs and in its cache keys.
  pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
    self.id = self.id.with_name(name);
    self
  }

  /// Makes concurrent callers with equal arguments share one computation.
  pub fn single_flight(mut self, enabled: bool) -> Self {
    self.single_flight = enabled;
    self
  }

  /// Applies every setting of `config`, replacing earlier ones.
  pub fn config(mut self, config: CacheConfig) -> Self {
    self.max_items = config.max_items;
    self.policy = PolicyChoice::Builtin(config.policy);
    self.ttl = config.ttl.map(TtlChoice::Exact);
    self.single_flight = config.single_flight;
    self
  }

  /// Validates the settings and splits off the function.
  fn finish(self) -> Result<(Arc<MemoCore>, F), BuildError> {
    check_capacity(self.max_items)?;
    let policy = match self.policy {
      PolicyChoice::Named(name) => name.parse::<EvictionPolicy>()?.into_policy(),
      PolicyChoice::Builtin(policy) => policy.into_policy(),
      PolicyChoice::Custom(policy) => policy,
    };
    let ttl = match self.ttl {
      Some(TtlChoice::Exact(ttl)) => Some(ttl),
      Some(TtlChoice::Secs(secs)) => Some(ttl_from_secs(secs)?),
      None => None,
    };

    let core = MemoCore {
      manager: self.manager,
      id: self.id.unique(),
      overrides: self.overrides,
      settings: StoreSettings {
        max_items: self.max_items,
        policy,
        ttl,
      },
      single_flight: self.single_flight,
    };
    Ok((Arc::new(core), self.func))
  }
}

impl<F> MemoizeBuilder<F, Plain> {
  /// Builds the memoized function.
  pub fn build<A, V>(self) -> Result<Memoized<A, V>, BuildError>
  where
    F: Fn(A) -> V + Send + Sync + 'static,
    A: StructuralHash + 'static,
    V: Send + Sync + 'static,
  {
    let (core, func) = self.finish()?;
    Ok(Memoized::new(
      core,
      Arc::new(move |args: A| Ok::<V, Infallible>(func(args))),
    ))
  }

  /// Builds a memoized method. Calls are keyed on the arguments plus the
  /// receiver's [`dependencies`](Dependent::dependencies), not on the
  /// receiver itself.
  pub fn build_method<O, A, V>(self) -> Result<MemoizedMethod<O, A, V>, BuildError>
  where
    F: Fn(&O, A) -> V + Send + Sync + 'static,
    O: Dependent + 'static,
    A: StructuralHash + 'static,
    V: Send + Sync + 'static,
  {
    let (core, func) = self.finish()?;
    Ok(MemoizedMethod::new(
      core,
      Arc::new(move |receiver: &O, args: A| Ok::<V, Infallible>(func(receiver, args))),
    ))
  }
}

impl<F> MemoizeBuilder<F, Fallible> {
  /// Builds the memoized function.
  pub fn build<A, V, E>(self) -> Result<Memoized<A, V, E>, BuildError>
  where
    F: Fn(A) -> Result<V, E> + Send + Sync + 'static,
    A: StructuralHash + 'static,
    V: Send + Sync + 'static,
    E: 'static,
  {
    let (core, func) = self.finish()?;
    Ok(Memoized::new(core, Arc::new(func)))
  }

  /// Builds a memoized method; see [`MemoizeBuilder::build_method`].
  pub fn build_method<O, A, V, E>(self) -> Result<MemoizedMethod<O, A, V, E>, BuildError>
  where
    F: Fn(&O, A) -> Result<V, E> + Send + Sync + 'static,
    O: Dependent + 'static,
    A: StructuralHash + 'static,
    V: Send + Sync + 'static,
    E: 'static,
  {
    let (core, func) = self.finish()?;
    Ok(MemoizedMethod::new(core, Arc::new(func)))
  }
}
