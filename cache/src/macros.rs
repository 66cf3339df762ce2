/// Implements [`StructuralHash`](crate::StructuralHash) for a struct by
/// reducing it to its type name and a tuple of fields.
///
/// The digest is `md5(H("__<Type>") ++ H(field0) ++ H(field1) ++ ...)`, so two
/// values hash equal when they are of the same type and their listed fields
/// hash equal. Fields not listed are ignored. The type gains a native key when
/// every listed field has one, and it can be the target of a hash override.
///
/// ```
/// use fibre_memo::structural_hash;
///
/// struct Point {
///   x: i64,
///   y: i64,
///   label: String,
/// }
/// structural_hash!(Point { x, y, label });
///
/// struct Meters(f64);
/// structural_hash!(Meters(0));
/// ```
#[macro_export]
macro_rules! structural_hash {
  ($ty:ident { $($field:ident),* $(,)? }) => {
    $crate::structural_hash!(@impl $ty, $($field),*);
  };
  ($ty:ident ( $($idx:tt),* $(,)? )) => {
    $crate::structural_hash!(@impl $ty, $($idx),*);
  };
  (@impl $ty:ident, $($part:tt),*) => {
    impl $crate::StructuralHash for $ty {
      fn hash_structure(
        &self,
        ctx: &mut $crate::HashContext<'_>,
      ) -> ::std::result::Result<::std::vec::Vec<u8>, $crate::HashError> {
        #[allow(unused_mut)]
        let mut parts = $crate::hash::Combiner::tagged(concat!("__", stringify!($ty)));
        $( parts.push(ctx.hash(&self.$part)?); )*
        Ok(parts.finish())
      }

      fn native_key(&self) -> ::std::option::Option<$crate::NativeKey> {
        $crate::NativeKey::structure(
          stringify!($ty),
          [$( $crate::StructuralHash::native_key(&self.$part), )*],
        )
      }

      fn as_any(&self) -> ::std::option::Option<&dyn ::std::any::Any> {
        Some(self)
      }
    }
  };
}
