//! Memoization for Rust functions, keyed by the structure of their arguments.
//!
//! A memoized function caches its results under an MD5 digest of the
//! callable's identity and its arguments. Arguments are reduced to that digest
//! by a structural hasher, so two calls share a result whenever their
//! arguments are structurally equal, even if they are distinct allocations.
//!
//! # Features
//! - **Structural hashing**: Scalars, strings, collections, maps and sets,
//!   shared pointers (cycle-safe), numeric arrays and columnar frames (sampled
//!   above a size threshold), and user types via [`structural_hash!`].
//! - **Bounded stores**: One store per function, with FIFO, LRU or LFU
//!   eviction and an optional time-to-live.
//! - **Hash overrides**: Per-type hash functions registered at build time.
//! - **Single-flight**: Optionally, concurrent callers with equal arguments
//!   share one computation.
//!
//! ```
//! let fib = fibre_memo::memoize(|n: u64| (1..=n).product::<u64>())
//!   .max_items(64)
//!   .build()
//!   .unwrap();
//! assert_eq!(*fib.call(5).unwrap(), 120);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod hash;
pub mod manager;
pub mod memoized;
pub mod metrics;
pub mod policy;
pub mod store;
pub mod time;

mod callable;
mod digest;
mod entry;
mod inflight;
mod kwargs;
mod macros;
mod partial;
mod rng;

pub use builder::MemoizeBuilder;
pub use callable::CallableId;
pub use config::CacheConfig;
pub use digest::Digest;
pub use error::{BuildError, CallError, HashError};
pub use hash::{hash_value, Blob, ByIdentity, HashContext, HashOverrides, NativeKey, StructuralHash};
pub use kwargs::{DynValue, Kwargs};
pub use manager::{global, CacheManager, ManagerStats};
pub use memoized::{Dependent, Memoized, MemoizedMethod};
pub use metrics::MetricsSnapshot;
pub use partial::Partial;
pub use policy::{CachePolicy, EvictionPolicy};
pub use store::CacheStore;

/// Starts configuring a memoized `func` on the [`global`] manager.
pub fn memoize<F: 'static>(func: F) -> MemoizeBuilder<F> {
  global().memoize(func)
}

/// Same as [`memoize`] for functions returning `Result`.
pub fn try_memoize<F: 'static>(func: F) -> MemoizeBuilder<F, builder::Fallible> {
  global().try_memoize(func)
}

/// Computes the cache key of a call on the [`global`] manager.
pub fn compute_hash<A>(callable: &CallableId, args: &A, kwargs: &Kwargs) -> Result<Digest, HashError>
where
  A: StructuralHash + ?Sized,
{
  global().compute_hash(callable, args, kwargs)
}

/// Drops every store of the [`global`] manager.
pub fn clear_cache() {
  global().clear_cache()
}
