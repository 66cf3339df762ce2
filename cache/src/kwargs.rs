use crate::error::HashError;
use crate::hash::{Combiner, HashContext, NativeKey, StructuralHash};

use std::fmt;
use std::sync::Arc;

/// A shared, type-erased hashable value.
pub type DynValue = Arc<dyn StructuralHash + Send + Sync>;

/// Named arguments, kept in insertion order.
///
/// Hashes as a mapping whose items are `(name, value)` pairs in the order the
/// names were first inserted.
#[derive(Clone, Default)]
pub struct Kwargs {
  entries: Vec<(String, DynValue)>,
}

impl Kwargs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style [`insert`](Self::insert).
  pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Self
  where
    T: StructuralHash + Send + Sync + 'static,
  {
    self.insert(name, value);
    self
  }

  /// Sets `name` to `value`. An existing name keeps its position.
  pub fn insert<T>(&mut self, name: impl Into<String>, value: T)
  where
    T: StructuralHash + Send + Sync + 'static,
  {
    self.insert_shared(name, Arc::new(value));
  }

  pub fn insert_shared(&mut self, name: impl Into<String>, value: DynValue) {
    let name = name.into();
    match self.entries.iter_mut().find(|(n, _)| *n == name) {
      Some((_, slot)) => *slot = value,
      None => self.entries.push((name, value)),
    }
  }

  pub fn get(&self, name: &str) -> Option<&(dyn StructuralHash + Send + Sync)> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| &**v)
  }

  /// Returns `self` updated with every entry of `other`; names present in
  /// both take the value from `other`.
  pub fn merged(&self, other: &Kwargs) -> Kwargs {
    let mut out = self.clone();
    for (name, value) in &other.entries {
      out.insert_shared(name.clone(), value.clone());
    }
    out
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(n, _)| n.as_str())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl fmt::Debug for Kwargs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}

impl StructuralHash for Kwargs {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::tagged("__dict");
    for (name, value) in &self.entries {
      parts.push(ctx.hash_pair(name.as_str(), &**value)?);
    }
    Ok(parts.finish())
  }

  fn native_key(&self) -> Option<NativeKey> {
    NativeKey::tuple(self.entries.iter().map(|(name, value)| {
      value
        .native_key()
        .map(|key| NativeKey::Tuple(vec![NativeKey::Str(name.clone()), key]))
    }))
  }
}
