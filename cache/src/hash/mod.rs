//! Structural hashing of arbitrary values.
//!
//! A value's structural hash is a byte string derived only from its content:
//! scalars encode their value directly, containers digest a type tag followed
//! by the hashes of their items. Values take part by implementing
//! [`StructuralHash`]; recursion always goes back through
//! [`HashContext::hash`], which breaks reference cycles and applies
//! user-registered overrides before the type's own rule runs.

pub mod array;
mod encode;
mod impls;
mod native;
mod overrides;

pub use array::{Column, Element, Frame, NdArray};
pub use impls::{Blob, ByIdentity};
pub use native::NativeKey;
pub use overrides::HashOverrides;

pub(crate) use encode::int_to_bytes;

use crate::digest::Digest;
use crate::error::HashError;

use std::any::Any;

/// Returned in place of a value that is already being hashed further up the
/// stack. Reaching it means the value graph contains a cycle.
pub const CYCLE_PLACEHOLDER: &[u8] = b"fibre-memo-93KZ39Q-CYCLE";

/// A value that can be reduced to a deterministic structural hash.
///
/// Only `hash_structure` is required. Implementations must recurse into their
/// parts through [`HashContext::hash`], never by calling `hash_structure` on
/// the parts directly, so that cycle detection and overrides see every value.
///
/// User types usually implement this through the
/// [`structural_hash!`](crate::structural_hash) macro, which reduces a struct
/// to its type tag and fields.
pub trait StructuralHash {
  /// Produces the structural hash of `self`.
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError>;

  /// The tag under which overrides for this type are registered.
  fn type_tag(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  /// The address of the shared allocation behind `self`, for values that
  /// can take part in a reference cycle.
  fn identity(&self) -> Option<usize> {
    None
  }

  /// A cheap, exactly comparable stand-in for the value, or `None` if the
  /// value is indeterminate (not safely comparable by plain equality).
  fn native_key(&self) -> Option<NativeKey> {
    None
  }

  /// Exposes `self` for downcasting by a registered override.
  fn as_any(&self) -> Option<&dyn Any> {
    None
  }
}

/// Per-call hashing state.
///
/// Created fresh for every top-level hash and threaded through each recursive
/// step. It tracks the identities currently on the hashing stack and borrows
/// the override table for the duration of the call.
#[derive(Debug)]
pub struct HashContext<'a> {
  stack: Vec<usize>,
  overrides: &'a HashOverrides,
}

impl<'a> HashContext<'a> {
  pub fn new(overrides: &'a HashOverrides) -> Self {
    Self {
      stack: Vec::new(),
      overrides,
    }
  }

  /// Number of shared values currently being hashed.
  pub fn depth(&self) -> usize {
    self.stack.len()
  }

  /// Hashes `value`, dispatching in order: cycle check, user override, the
  /// type's own rule.
  pub fn hash<T>(&mut self, value: &T) -> Result<Vec<u8>, HashError>
  where
    T: StructuralHash + ?Sized,
  {
    let identity = value.identity();
    if let Some(id) = identity {
      if self.stack.contains(&id) {
        return Ok(CYCLE_PLACEHOLDER.to_vec());
      }
      self.stack.push(id);
    }

    let result = self.dispatch(value);

    if identity.is_some() {
      self.stack.pop();
    }
    result
  }

  fn dispatch<T>(&mut self, value: &T) -> Result<Vec<u8>, HashError>
  where
    T: StructuralHash + ?Sized,
  {
    if !self.overrides.is_empty() {
      let type_tag = value.type_tag();
      if let (Some(hash_fn), Some(any)) = (self.overrides.get(type_tag), value.as_any()) {
        return hash_fn(any).map_err(|source| HashError::Override { type_tag, source });
      }
    }
    value.hash_structure(self)
  }

  /// Hashes a `(key, value)` pair the same way a two-element tuple hashes.
  pub(crate) fn hash_pair<K, V>(&mut self, key: &K, value: &V) -> Result<Vec<u8>, HashError>
  where
    K: StructuralHash + ?Sized,
    V: StructuralHash + ?Sized,
  {
    let mut pair = Combiner::tagged("__tuple");
    pair.push(self.hash(key)?);
    pair.push(self.hash(value)?);
    Ok(pair.finish())
  }
}

/// Accumulates the hashes of a composite value's parts and digests them.
#[derive(Debug, Default)]
pub struct Combiner {
  buf: Vec<u8>,
}

impl Combiner {
  /// A combiner with no leading tag.
  pub fn untagged() -> Self {
    Self::default()
  }

  /// A combiner whose first part is the hash of `tag`.
  pub fn tagged(tag: &str) -> Self {
    Self {
      buf: tag.as_bytes().to_vec(),
    }
  }

  #[inline]
  pub fn push(&mut self, part: impl AsRef<[u8]>) {
    self.buf.extend_from_slice(part.as_ref());
  }

  pub fn finish(self) -> Vec<u8> {
    self.finish_digest().as_bytes().to_vec()
  }

  pub fn finish_digest(self) -> Digest {
    Digest::of(&self.buf)
  }
}

/// Hashes a single value with a fresh context.
pub fn hash_value<T>(value: &T, overrides: &HashOverrides) -> Result<Digest, HashError>
where
  T: StructuralHash + ?Sized,
{
  let mut ctx = HashContext::new(overrides);
  Ok(Digest::of(&ctx.hash(value)?))
}
