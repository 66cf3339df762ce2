use crate::error::BoxError;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};

type OverrideFn = dyn Fn(&dyn Any) -> Result<Vec<u8>, BoxError> + Send + Sync;

/// A table of user-supplied hash functions, keyed by type.
///
/// The table is resolved once, when a memoized function is built. During
/// hashing a value whose type has an entry is handed to that function instead
/// of going through its built-in rule. The function's output bytes become the
/// value's structural hash.
///
/// Overrides apply to values that expose themselves through
/// [`StructuralHash::as_any`](super::StructuralHash::as_any), which every
/// built-in `'static` type and every type declared with
/// [`structural_hash!`](crate::structural_hash) does.
#[derive(Clone, Default)]
pub struct HashOverrides {
  table: HashMap<&'static str, Arc<OverrideFn>>,
}

impl HashOverrides {
  pub fn new() -> Self {
    Self {
      table: HashMap::new(),
    }
  }

  /// Registers a fallible hash function for values of type `T`.
  ///
  /// An error returned by `f` aborts the hash and is reported as
  /// [`HashError::Override`](crate::HashError::Override), naming `T`.
  pub fn register<T, F, E>(&mut self, f: F) -> &mut Self
  where
    T: Any,
    F: Fn(&T) -> Result<Vec<u8>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    let tag = std::any::type_name::<T>();
    let erased = move |value: &dyn Any| -> Result<Vec<u8>, BoxError> {
      match value.downcast_ref::<T>() {
        Some(v) => f(v).map_err(Into::into),
        None => Err(format!("override for {tag} was handed a value of another type").into()),
      }
    };
    self.table.insert(tag, Arc::new(erased));
    self
  }

  /// Registers an infallible hash function for values of type `T`.
  pub fn register_infallible<T, F>(&mut self, f: F) -> &mut Self
  where
    T: Any,
    F: Fn(&T) -> Vec<u8> + Send + Sync + 'static,
  {
    self.register::<T, _, std::convert::Infallible>(move |v| Ok(f(v)))
  }

  /// Builder-style variant of [`register`](Self::register).
  pub fn with<T, F, E>(mut self, f: F) -> Self
  where
    T: Any,
    F: Fn(&T) -> Result<Vec<u8>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.register::<T, F, E>(f);
    self
  }

  pub(crate) fn get(&self, type_tag: &str) -> Option<&OverrideFn> {
    self.table.get(type_tag).map(|f| &**f)
  }

  /// Adds every entry of `other`, replacing entries for the same type.
  pub fn extend(&mut self, other: &HashOverrides) {
    for (tag, f) in &other.table {
      self.table.insert(*tag, f.clone());
    }
  }

  pub fn contains<T: Any>(&self) -> bool {
    self.table.contains_key(std::any::type_name::<T>())
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}

impl fmt::Debug for HashOverrides {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut tags: Vec<_> = self.table.keys().collect();
    tags.sort();
    f.debug_struct("HashOverrides").field("types", &tags).finish()
  }
}
