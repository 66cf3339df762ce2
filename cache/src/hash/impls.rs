use super::encode::{float_key_bits, float_to_bytes, int_to_bytes, uint_to_bytes};
use super::{Combiner, HashContext, NativeKey, StructuralHash};
use crate::error::HashError;

use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::io::Cursor;
use std::ops::Deref;
use std::rc::{self, Rc};
use std::sync::{self, Arc};

use parking_lot::{Mutex, RwLock};

const NONE_BYTES: &[u8] = b"0";

// --- Scalars ---

macro_rules! impl_signed {
  ($($t:ty),*) => {
    $(
      impl StructuralHash for $t {
        #[inline]
        fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
          Ok(int_to_bytes(*self as i128))
        }

        fn native_key(&self) -> Option<NativeKey> {
          Some(NativeKey::Int(*self as i128))
        }

        fn as_any(&self) -> Option<&dyn Any> {
          Some(self)
        }
      }
    )*
  };
}

impl_signed!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl StructuralHash for u128 {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(uint_to_bytes(*self))
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(match i128::try_from(*self) {
      Ok(i) => NativeKey::Int(i),
      Err(_) => NativeKey::UInt(*self),
    })
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

macro_rules! impl_float {
  ($($t:ty),*) => {
    $(
      impl StructuralHash for $t {
        #[inline]
        fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
          Ok(float_to_bytes(*self as f64))
        }

        fn native_key(&self) -> Option<NativeKey> {
          Some(NativeKey::Float(float_key_bits(*self as f64)))
        }

        fn as_any(&self) -> Option<&dyn Any> {
          Some(self)
        }
      }
    )*
  };
}

impl_float!(f32, f64);

impl StructuralHash for bool {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(if *self { b"1".to_vec() } else { b"0".to_vec() })
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Bool(*self))
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

impl StructuralHash for char {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut buf = [0u8; 4];
    Ok(self.encode_utf8(&mut buf).as_bytes().to_vec())
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Str(self.to_string()))
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

impl StructuralHash for str {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(self.as_bytes().to_vec())
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Str(self.to_owned()))
  }
}

impl StructuralHash for String {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(self.as_bytes().to_vec())
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Str(self.clone()))
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

impl StructuralHash for () {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(Combiner::tagged("__tuple").finish())
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Tuple(Vec::new()))
  }
}

impl<T: StructuralHash> StructuralHash for Option<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    match self {
      Some(value) => ctx.hash(value),
      None => Ok(NONE_BYTES.to_vec()),
    }
  }

  fn native_key(&self) -> Option<NativeKey> {
    match self {
      Some(value) => value.native_key(),
      None => Some(NativeKey::Unit),
    }
  }
}

/// A byte blob, hashed byte-for-byte.
///
/// `Vec<u8>` hashes as a list of integers; wrap raw binary data in `Blob` to
/// get the cheaper, direct encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl From<Vec<u8>> for Blob {
  fn from(bytes: Vec<u8>) -> Self {
    Blob(bytes)
  }
}

impl From<&[u8]> for Blob {
  fn from(bytes: &[u8]) -> Self {
    Blob(bytes.to_vec())
  }
}

impl Deref for Blob {
  type Target = [u8];
  fn deref(&self) -> &[u8] {
    &self.0
  }
}

impl StructuralHash for Blob {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    Ok(self.0.clone())
  }

  fn native_key(&self) -> Option<NativeKey> {
    Some(NativeKey::Bytes(self.0.clone()))
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

// --- Transparent wrappers ---

macro_rules! impl_transparent {
  ($($wrapper:ty),*) => {
    $(
      impl<T: StructuralHash + ?Sized> StructuralHash for $wrapper {
        #[inline]
        fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
          (**self).hash_structure(ctx)
        }

        fn type_tag(&self) -> &'static str {
          (**self).type_tag()
        }

        fn identity(&self) -> Option<usize> {
          (**self).identity()
        }

        fn native_key(&self) -> Option<NativeKey> {
          (**self).native_key()
        }

        fn as_any(&self) -> Option<&dyn Any> {
          (**self).as_any()
        }
      }
    )*
  };
}

impl_transparent!(&T, &mut T, Box<T>);

impl<B> StructuralHash for Cow<'_, B>
where
  B: StructuralHash + ToOwned + ?Sized,
{
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    (**self).hash_structure(ctx)
  }

  fn type_tag(&self) -> &'static str {
    (**self).type_tag()
  }

  fn native_key(&self) -> Option<NativeKey> {
    (**self).native_key()
  }

  fn as_any(&self) -> Option<&dyn Any> {
    (**self).as_any()
  }
}

// --- Shared pointers: the only place a cycle can form ---

macro_rules! impl_shared {
  ($ptr:ident, $weak:ty) => {
    impl<T: StructuralHash + ?Sized> StructuralHash for $ptr<T> {
      fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
        ctx.hash(&**self)
      }

      fn identity(&self) -> Option<usize> {
        Some($ptr::as_ptr(self) as *const () as usize)
      }

      fn native_key(&self) -> Option<NativeKey> {
        (**self).native_key()
      }
    }

    impl<T: StructuralHash + ?Sized> StructuralHash for $weak {
      fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
        match self.upgrade() {
          Some(strong) => ctx.hash(&strong),
          None => Ok(NONE_BYTES.to_vec()),
        }
      }
    }
  };
}

impl_shared!(Rc, rc::Weak<T>);
impl_shared!(Arc, sync::Weak<T>);

// --- Interior mutability: hash whatever is inside right now ---

impl<T: StructuralHash + ?Sized> StructuralHash for RefCell<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let guard = self.try_borrow().map_err(|_| HashError::Unavailable {
      type_tag: self.type_tag(),
    })?;
    ctx.hash(&*guard)
  }
}

impl<T: StructuralHash + ?Sized> StructuralHash for Mutex<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    // A lock already held by the caller would deadlock a blocking `lock()`.
    let guard = self.try_lock().ok_or(HashError::Unavailable {
      type_tag: self.type_tag(),
    })?;
    ctx.hash(&*guard)
  }
}

impl<T: StructuralHash + ?Sized> StructuralHash for RwLock<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let guard = self.try_read().ok_or(HashError::Unavailable {
      type_tag: self.type_tag(),
    })?;
    ctx.hash(&*guard)
  }
}

// --- Ordered containers ---

fn hash_items<'v, T, I>(ctx: &mut HashContext<'_>, tag: &str, items: I) -> Result<Vec<u8>, HashError>
where
  T: StructuralHash + 'v,
  I: IntoIterator<Item = &'v T>,
{
  let mut parts = Combiner::tagged(tag);
  for item in items {
    parts.push(ctx.hash(item)?);
  }
  Ok(parts.finish())
}

/// Containers without a stable iteration order digest their items sorted.
fn hash_unordered(tag: &str, mut item_hashes: Vec<Vec<u8>>) -> Vec<u8> {
  item_hashes.sort_unstable();
  let mut parts = Combiner::tagged(tag);
  for h in item_hashes {
    parts.push(h);
  }
  parts.finish()
}

impl<T: StructuralHash> StructuralHash for [T] {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    hash_items(ctx, "__list", self)
  }

  fn native_key(&self) -> Option<NativeKey> {
    NativeKey::list(self.iter().map(StructuralHash::native_key))
  }
}

impl<T: StructuralHash> StructuralHash for Vec<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    hash_items(ctx, "__list", self)
  }

  fn native_key(&self) -> Option<NativeKey> {
    NativeKey::list(self.iter().map(StructuralHash::native_key))
  }
}

impl<T: StructuralHash> StructuralHash for VecDeque<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    hash_items(ctx, "__list", self)
  }

  fn native_key(&self) -> Option<NativeKey> {
    NativeKey::list(self.iter().map(StructuralHash::native_key))
  }
}

impl<T: StructuralHash, const N: usize> StructuralHash for [T; N] {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    hash_items(ctx, "__tuple", self)
  }

  fn native_key(&self) -> Option<NativeKey> {
    NativeKey::tuple(self.iter().map(StructuralHash::native_key))
  }
}

macro_rules! impl_tuple {
  ($($name:ident)+) => {
    impl<$($name: StructuralHash),+> StructuralHash for ($($name,)+) {
      #[allow(non_snake_case)]
      fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
        let ($($name,)+) = self;
        let mut parts = Combiner::tagged("__tuple");
        $( parts.push(ctx.hash($name)?); )+
        Ok(parts.finish())
      }

      #[allow(non_snake_case)]
      fn native_key(&self) -> Option<NativeKey> {
        let ($($name,)+) = self;
        NativeKey::tuple([$($name.native_key()),+])
      }
    }
  };
}

impl_tuple!(A);
impl_tuple!(A B);
impl_tuple!(A B C);
impl_tuple!(A B C D);
impl_tuple!(A B C D E);
impl_tuple!(A B C D E F);
impl_tuple!(A B C D E F G);
impl_tuple!(A B C D E F G H);
impl_tuple!(A B C D E F G H I);
impl_tuple!(A B C D E F G H I J);
impl_tuple!(A B C D E F G H I J K);
impl_tuple!(A B C D E F G H I J K L);

impl<K: StructuralHash, V: StructuralHash> StructuralHash for BTreeMap<K, V> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::tagged("__dict");
    for (k, v) in self {
      parts.push(ctx.hash_pair(k, v)?);
    }
    Ok(parts.finish())
  }
}

impl<K: StructuralHash, V: StructuralHash, S> StructuralHash for HashMap<K, V, S> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let pairs = self
      .iter()
      .map(|(k, v)| ctx.hash_pair(k, v))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(hash_unordered("__dict", pairs))
  }
}

impl<T: StructuralHash> StructuralHash for BTreeSet<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    hash_items(ctx, "__set", self)
  }
}

impl<T: StructuralHash, S> StructuralHash for HashSet<T, S> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let items = self
      .iter()
      .map(|item| ctx.hash(item))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(hash_unordered("__set", items))
  }
}

// --- In-memory streams ---

/// A cursor hashes its current position followed by its full buffer, so the
/// same bytes read from a different offset give a different key.
impl<T: AsRef<[u8]>> StructuralHash for Cursor<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::untagged();
    parts.push(ctx.hash(&self.position())?);
    parts.push(self.get_ref().as_ref());
    Ok(parts.finish())
  }
}

// --- Identity fallback ---

/// Hashes a shared value by the address of its allocation instead of its
/// content.
///
/// This is the fallback for values with no meaningful structure. The hash is
/// only valid while that allocation is alive: a cache hit happens when the
/// *same* instance is passed again, never for a merely equal one, and a new
/// allocation that reuses a freed address can alias an old key.
pub struct ByIdentity<T: ?Sized>(pub Arc<T>);

impl<T> ByIdentity<T> {
  pub fn new(value: T) -> Self {
    ByIdentity(Arc::new(value))
  }
}

impl<T: ?Sized> ByIdentity<T> {
  fn address(&self) -> usize {
    Arc::as_ptr(&self.0) as *const () as usize
  }
}

impl<T: ?Sized> Clone for ByIdentity<T> {
  fn clone(&self) -> Self {
    ByIdentity(self.0.clone())
  }
}

impl<T: ?Sized> Deref for ByIdentity<T> {
  type Target = T;
  fn deref(&self) -> &T {
    &self.0
  }
}

impl<T: ?Sized> fmt::Debug for ByIdentity<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ByIdentity({:#x})", self.address())
  }
}

impl<T: ?Sized> StructuralHash for ByIdentity<T> {
  fn hash_structure(&self, _ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let address = self.address();
    tracing::trace!(
      type_tag = std::any::type_name::<T>(),
      address,
      "hashing by identity; key is only valid for this instance"
    );
    Ok(int_to_bytes(address as i128))
  }
}

#[cfg(test)]
mod tests {
  use super::super::{hash_value, HashOverrides};
  use super::*;

  fn digest<T: StructuralHash + ?Sized>(value: &T) -> crate::Digest {
    hash_value(value, &HashOverrides::new()).unwrap()
  }

  #[test]
  fn test_structurally_equal_values_hash_equal() {
    let a = (1, "two", vec![3.0, 4.5], Some(true));
    let b = (1, String::from("two"), vec![3.0, 4.5], Some(true));
    assert_eq!(digest(&a), digest(&b));
  }

  #[test]
  fn test_container_kind_is_part_of_the_hash() {
    assert_ne!(digest(&vec![1, 2]), digest(&[1, 2]));
    assert_eq!(digest(&vec![1, 2]), digest(&VecDeque::from(vec![1, 2])));
    assert_ne!(digest(&vec![1, 2]), digest(&vec![2, 1]));
  }

  #[test]
  fn test_hash_map_is_order_independent() {
    let mut a = HashMap::new();
    let mut b = HashMap::new();
    for i in 0..32 {
      a.insert(i, i * 2);
    }
    for i in (0..32).rev() {
      b.insert(i, i * 2);
    }
    assert_eq!(digest(&a), digest(&b));

    let mut c = a.clone();
    c.insert(0, 1);
    assert_ne!(digest(&a), digest(&c));

    // Sorting the pair digests is what makes the two rules differ.
    let sorted: BTreeMap<_, _> = a.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(digest(&sorted), digest(&sorted.clone()));
  }

  #[test]
  fn test_blob_hashes_raw_bytes() {
    assert_eq!(digest(&Blob(b"abc".to_vec())), digest("abc"));
    assert_ne!(digest(&Blob(vec![1, 2])), digest(&vec![1u8, 2]));
  }

  #[test]
  fn test_cursor_hash_includes_position() {
    let mut cursor = Cursor::new(b"hello".to_vec());
    let start = digest(&cursor);
    cursor.set_position(2);
    assert_ne!(start, digest(&cursor));
    let mut text = Cursor::new(String::from("hello"));
    text.set_position(2);
    assert_eq!(digest(&cursor), digest(&text));
  }

  #[test]
  fn test_refcell_mutably_borrowed_is_unavailable() {
    let cell = RefCell::new(5);
    let _guard = cell.borrow_mut();
    let err = hash_value(&cell, &HashOverrides::new()).unwrap_err();
    assert!(matches!(err, HashError::Unavailable { .. }));
  }

  #[test]
  fn test_identity_hash_distinguishes_equal_instances() {
    let a = ByIdentity::new(vec![1, 2, 3]);
    let b = ByIdentity::new(vec![1, 2, 3]);
    assert_eq!(digest(&a), digest(&a.clone()));
    assert_ne!(digest(&a), digest(&b));
  }

  #[test]
  fn test_native_keys() {
    assert_eq!(
      (1, "a").native_key(),
      Some(NativeKey::Tuple(vec![NativeKey::Int(1), NativeKey::Str("a".into())]))
    );
    assert_eq!(
      vec![Some(1u8), None].native_key(),
      Some(NativeKey::List(vec![NativeKey::Int(1), NativeKey::Unit]))
    );
    assert_eq!((1, RefCell::new(2)).native_key(), None);
    assert_eq!(u128::MAX.native_key(), Some(NativeKey::UInt(u128::MAX)));
  }
}
