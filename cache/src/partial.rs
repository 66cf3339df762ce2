use crate::callable::CallableId;
use crate::error::HashError;
use crate::hash::{Combiner, HashContext, StructuralHash};
use crate::kwargs::Kwargs;

use std::fmt;

/// A function bound together with some of its arguments.
///
/// Two partials hash equal when they bind the same function to structurally
/// equal arguments, which lets a partial be passed as an argument to a
/// memoized function.
#[derive(Clone)]
pub struct Partial<F, A> {
  func: F,
  id: CallableId,
  args: A,
  kwargs: Kwargs,
}

impl<F: 'static, A> Partial<F, A> {
  pub fn new(func: F, args: A) -> Self {
    Self {
      func,
      id: CallableId::of::<F>(),
      args,
      kwargs: Kwargs::new(),
    }
  }

  /// Same as `new`, with an explicit name for the function. Function
  /// pointers of one signature all share a type, so they should be named.
  pub fn named(name: impl Into<std::borrow::Cow<'static, str>>, func: F, args: A) -> Self {
    Self {
      func,
      id: CallableId::named::<F>(name),
      args,
      kwargs: Kwargs::new(),
    }
  }
}

impl<F, A> Partial<F, A> {
  /// Binds a named argument.
  pub fn with_kwarg<T>(mut self, name: impl Into<String>, value: T) -> Self
  where
    T: StructuralHash + Send + Sync + 'static,
  {
    self.kwargs.insert(name, value);
    self
  }

  pub fn id(&self) -> &CallableId {
    &self.id
  }

  pub fn args(&self) -> &A {
    &self.args
  }

  pub fn kwargs(&self) -> &Kwargs {
    &self.kwargs
  }

  /// Invokes the function with the bound arguments.
  pub fn call<R>(&self) -> R
  where
    F: Fn(&A, &Kwargs) -> R,
  {
    (self.func)(&self.args, &self.kwargs)
  }
}

impl<F, A: fmt::Debug> fmt::Debug for Partial<F, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Partial")
      .field("func", &self.id)
      .field("args", &self.args)
      .field("kwargs", &self.kwargs)
      .finish()
  }
}

impl<F, A: StructuralHash> StructuralHash for Partial<F, A> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::untagged();
    parts.push(ctx.hash(&self.args)?);
    parts.push(ctx.hash(&self.id)?);
    parts.push(ctx.hash(&self.kwargs)?);
    Ok(parts.finish())
  }
}
