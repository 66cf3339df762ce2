/// An exactly comparable stand-in for a value built only from primitives.
///
/// Native keys let a repeated call skip the full structural hash: two calls
/// whose arguments produce equal native keys are guaranteed to produce equal
/// digests. Values that cannot be reduced this way report no key at all and
/// are called indeterminate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeKey {
  Unit,
  Bool(bool),
  Int(i128),
  UInt(u128),
  /// Canonicalized IEEE bits (`-0.0` folded into `0.0`, one NaN).
  Float(u64),
  Str(String),
  Bytes(Vec<u8>),
  Tuple(Vec<NativeKey>),
  List(Vec<NativeKey>),
  /// A user type reduced to its name and fields. Kept apart from `Tuple` so a
  /// struct and a tuple holding its name never share a key.
  Struct(&'static str, Vec<NativeKey>),
}

impl NativeKey {
  /// Collects the keys of `items` into a tuple key, or `None` if any item is
  /// indeterminate.
  pub fn tuple<I>(items: I) -> Option<NativeKey>
  where
    I: IntoIterator<Item = Option<NativeKey>>,
  {
    items
      .into_iter()
      .collect::<Option<Vec<_>>>()
      .map(NativeKey::Tuple)
  }

  /// Same as [`tuple`](Self::tuple), for list-like containers.
  pub fn list<I>(items: I) -> Option<NativeKey>
  where
    I: IntoIterator<Item = Option<NativeKey>>,
  {
    items
      .into_iter()
      .collect::<Option<Vec<_>>>()
      .map(NativeKey::List)
  }

  /// The key of a user type named `name`, or `None` if any field is
  /// indeterminate.
  pub fn structure<I>(name: &'static str, fields: I) -> Option<NativeKey>
  where
    I: IntoIterator<Item = Option<NativeKey>>,
  {
    fields
      .into_iter()
      .collect::<Option<Vec<_>>>()
      .map(|fields| NativeKey::Struct(name, fields))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_any_indeterminate_item_poisons_the_container() {
    assert_eq!(
      NativeKey::tuple([Some(NativeKey::Int(1)), Some(NativeKey::Unit)]),
      Some(NativeKey::Tuple(vec![NativeKey::Int(1), NativeKey::Unit]))
    );
    assert_eq!(NativeKey::list([Some(NativeKey::Int(1)), None]), None);
    assert_eq!(NativeKey::structure("Point", [None]), None);
  }

  #[test]
  fn test_struct_and_tuple_keys_differ() {
    let fields = [Some(NativeKey::Int(1)), Some(NativeKey::Int(2))];
    let tuple = NativeKey::tuple(
      [Some(NativeKey::Str("Point".to_string()))]
        .into_iter()
        .chain(fields.clone()),
    );
    assert_ne!(NativeKey::structure("Point", fields), tuple);
  }
}
