use crate::error::HashError;
use crate::hash::{Combiner, HashContext, StructuralHash};

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// The identity of a memoized callable.
///
/// Every wrapped function gets its own cache store, looked up by this id. The
/// `TypeId` of the function keeps distinct closures apart even when they share
/// a name; the name is what shows up in logs and what goes into the digest.
///
/// Ids made by `of` and `named` describe a function type. Each memoized
/// function additionally carries an instance number, so two closures of one
/// type (or two function pointers of one signature) never share a store.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CallableId {
  name: Cow<'static, str>,
  type_id: TypeId,
  instance: u64,
}

impl CallableId {
  /// The id of the function type `F`, named after its type.
  pub fn of<F: 'static>() -> Self {
    Self {
      name: Cow::Borrowed(std::any::type_name::<F>()),
      type_id: TypeId::of::<F>(),
      instance: 0,
    }
  }

  /// Same as `of`, but with an explicit name.
  pub fn named<F: 'static>(name: impl Into<Cow<'static, str>>) -> Self {
    Self {
      name: name.into(),
      type_id: TypeId::of::<F>(),
      instance: 0,
    }
  }

  /// Replaces the name, keeping the type identity.
  pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
    self.name = name.into();
    self
  }

  /// Gives the id an instance number no other id in the process has.
  pub(crate) fn unique(mut self) -> Self {
    self.instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The instance number of a memoized function, `0` for a bare type id.
  pub fn instance(&self) -> u64 {
    self.instance
  }

  /// A process-local fingerprint of the function type.
  fn type_fingerprint(&self) -> u64 {
    // DefaultHasher::new() uses fixed keys, so this is stable for the life of
    // the process, which is as long as any digest needs to live.
    let mut hasher = DefaultHasher::new();
    self.type_id.hash(&mut hasher);
    hasher.finish()
  }
}

impl fmt::Debug for CallableId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CallableId")
      .field(&self.name)
      .field(&self.instance)
      .finish()
  }
}

impl fmt::Display for CallableId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

impl StructuralHash for CallableId {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::tagged("__callable");
    parts.push(ctx.hash(self.name())?);
    parts.push(ctx.hash(&self.type_fingerprint())?);
    parts.push(ctx.hash(&self.instance)?);
    Ok(parts.finish())
  }
}
