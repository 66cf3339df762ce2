use thiserror::Error;

/// A boxed error returned by user-supplied hash overrides.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while computing a structural hash.
#[derive(Debug, Error)]
pub enum HashError {
  /// A user-registered hash override failed for a value of `type_tag`.
  #[error("user hash function failed for input type {type_tag}: {source}")]
  Override {
    type_tag: &'static str,
    #[source]
    source: BoxError,
  },

  /// The value could not be read while hashing, e.g. a `RefCell` that is
  /// currently mutably borrowed.
  #[error("value of type {type_tag} is not readable while hashing")]
  Unavailable { type_tag: &'static str },
}

/// Errors that can occur when building a memoized function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// The eviction policy name is not one of FIFO, LRU or LFU.
  #[error("unknown eviction policy '{0}', expected one of FIFO, LRU, LFU")]
  UnknownPolicy(String),

  /// The cache was configured with `max_items` of zero. Leave it unset for an
  /// unbounded cache.
  #[error("max_items cannot be zero")]
  ZeroCapacity,

  /// The time-to-live was negative or not a finite number of seconds.
  #[error("ttl must be a finite, non-negative number of seconds, got {0}")]
  InvalidTtl(f64),
}

/// The error returned by a fallible memoized call.
#[derive(Debug, Error)]
pub enum CallError<E> {
  /// The arguments could not be hashed; the function was not invoked.
  #[error(transparent)]
  Hash(#[from] HashError),

  /// The wrapped function itself failed. Nothing was cached for the call.
  #[error("memoized function failed: {0}")]
  Call(E),
}

impl<E> CallError<E> {
  /// Returns the wrapped function's error, if that is what failed.
  pub fn into_call_error(self) -> Option<E> {
    match self {
      CallError::Call(e) => Some(e),
      CallError::Hash(_) => None,
    }
  }
}

/// A shaped container was given the wrong number of elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shape needs {expected} elements, got {actual}")]
pub struct ShapeError {
  pub expected: usize,
  pub actual: usize,
}
