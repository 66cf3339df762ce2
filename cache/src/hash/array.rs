//! Homogeneous numeric arrays and columnar tables.
//!
//! Both types hash their full content while small. Past a size threshold they
//! hash their shape (or schema) plus a fixed-seed random sample, trading a
//! theoretical chance of collision between two large values for bounded cost.
//! Because the seed is fixed, the same value always hashes the same way.

use super::{Combiner, HashContext, StructuralHash};
use crate::error::{HashError, ShapeError};
use crate::rng::FixedSampler;

use std::any::Any;

/// Arrays with at least this many elements are sampled.
pub const ARRAY_SAMPLE_THRESHOLD: usize = 1_000_000;
/// Number of elements drawn from a sampled array.
pub const ARRAY_SAMPLE_SIZE: usize = 100_000;
/// Frames with at least this many rows are sampled.
pub const FRAME_SAMPLE_THRESHOLD: usize = 100_000;
/// Number of rows drawn from a sampled frame.
pub const FRAME_SAMPLE_SIZE: usize = 10_000;

/// A numeric element type with a fixed little-endian byte layout.
pub trait Element: Copy + Send + Sync + 'static {
  const DTYPE: &'static str;
  fn write_le(&self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
  ($($t:ty => $name:literal),*) => {
    $(
      impl Element for $t {
        const DTYPE: &'static str = $name;
        #[inline]
        fn write_le(&self, out: &mut Vec<u8>) {
          out.extend_from_slice(&self.to_le_bytes());
        }
      }
    )*
  };
}

impl_element!(
  i8 => "int8", i16 => "int16", i32 => "int32", i64 => "int64",
  u8 => "uint8", u16 => "uint16", u32 => "uint32", u64 => "uint64",
  f32 => "float32", f64 => "float64"
);

/// A dense, row-major n-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray<T: Element> {
  shape: Vec<usize>,
  data: Vec<T>,
}

impl<T: Element> NdArray<T> {
  /// A one-dimensional array over `data`.
  pub fn from_vec(data: Vec<T>) -> Self {
    Self {
      shape: vec![data.len()],
      data,
    }
  }

  /// An array of the given shape. The product of `shape` must equal the
  /// number of elements.
  pub fn from_shape_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self, ShapeError> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
      return Err(ShapeError {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { shape, data })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[T] {
    &self.data
  }

  pub fn as_mut_slice(&mut self) -> &mut [T] {
    &mut self.data
  }
}

impl<T: Element> StructuralHash for NdArray<T> {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut parts = Combiner::untagged();
    parts.push(ctx.hash(&self.shape)?);
    parts.push(T::DTYPE);

    let mut raw = Vec::new();
    if self.data.len() >= ARRAY_SAMPLE_THRESHOLD {
      raw.reserve(ARRAY_SAMPLE_SIZE * std::mem::size_of::<T>());
      for i in FixedSampler::new().indices(self.data.len(), ARRAY_SAMPLE_SIZE) {
        self.data[i].write_le(&mut raw);
      }
    } else {
      raw.reserve(self.data.len() * std::mem::size_of::<T>());
      for value in &self.data {
        value.write_le(&mut raw);
      }
    }
    parts.push(raw);
    Ok(parts.finish())
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

/// One column of a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
  Int(Vec<i64>),
  Float(Vec<f64>),
  Bool(Vec<bool>),
  Str(Vec<String>),
}

impl Column {
  pub fn len(&self) -> usize {
    match self {
      Column::Int(v) => v.len(),
      Column::Float(v) => v.len(),
      Column::Bool(v) => v.len(),
      Column::Str(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn dtype(&self) -> &'static str {
    match self {
      Column::Int(_) => "int64",
      Column::Float(_) => "float64",
      Column::Bool(_) => "bool",
      Column::Str(_) => "str",
    }
  }

  fn hash_cell(&self, row: usize, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    match self {
      Column::Int(v) => ctx.hash(&v[row]),
      Column::Float(v) => ctx.hash(&v[row]),
      Column::Bool(v) => ctx.hash(&v[row]),
      Column::Str(v) => ctx.hash(&v[row]),
    }
  }
}

/// A named-column table whose columns all have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
  columns: Vec<(String, Column)>,
}

impl Frame {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a column. Every column must have as many rows as the first.
  pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self, ShapeError> {
    if let Some((_, first)) = self.columns.first() {
      if first.len() != column.len() {
        return Err(ShapeError {
          expected: first.len(),
          actual: column.len(),
        });
      }
    }
    self.columns.push((name.into(), column));
    Ok(self)
  }

  pub fn num_rows(&self) -> usize {
    self.columns.first().map_or(0, |(_, c)| c.len())
  }

  pub fn num_columns(&self) -> usize {
    self.columns.len()
  }

  pub fn column(&self, name: &str) -> Option<&Column> {
    self
      .columns
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, c)| c)
  }

  fn schema(&self) -> Vec<(&str, &'static str)> {
    self
      .columns
      .iter()
      .map(|(name, column)| (name.as_str(), column.dtype()))
      .collect()
  }

  fn hash_row(&self, row: usize, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let mut cells = Combiner::tagged("__row");
    for (_, column) in &self.columns {
      cells.push(column.hash_cell(row, ctx)?);
    }
    Ok(cells.finish())
  }
}

impl StructuralHash for Frame {
  fn hash_structure(&self, ctx: &mut HashContext<'_>) -> Result<Vec<u8>, HashError> {
    let rows = self.num_rows();
    let mut parts = Combiner::tagged("__frame");
    parts.push(ctx.hash(&self.schema())?);
    parts.push(ctx.hash(&rows)?);

    if rows >= FRAME_SAMPLE_THRESHOLD {
      for row in FixedSampler::new().indices(rows, FRAME_SAMPLE_SIZE) {
        parts.push(self.hash_row(row, ctx)?);
      }
    } else {
      for row in 0..rows {
        parts.push(self.hash_row(row, ctx)?);
      }
    }
    Ok(parts.finish())
  }

  fn as_any(&self) -> Option<&dyn Any> {
    Some(self)
  }
}

#[cfg(test)]
mod tests {
  use super::super::{hash_value, HashOverrides};
  use super::*;

  fn digest<T: StructuralHash>(value: &T) -> crate::Digest {
    hash_value(value, &HashOverrides::new()).unwrap()
  }

  #[test]
  fn test_shape_is_part_of_the_hash() {
    let flat = NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]);
    let square = NdArray::from_shape_vec(vec![2, 2], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
    assert_ne!(digest(&flat), digest(&square));
  }

  #[test]
  fn test_dtype_is_part_of_the_hash() {
    let a = NdArray::from_vec(vec![1u32, 2]);
    let b = NdArray::from_vec(vec![1i32, 2]);
    assert_ne!(digest(&a), digest(&b));
  }

  #[test]
  fn test_shape_mismatch_is_rejected() {
    let err = NdArray::from_shape_vec(vec![3, 3], vec![0u8; 8]).unwrap_err();
    assert_eq!(err.expected, 9);
    assert_eq!(err.actual, 8);
  }

  #[test]
  fn test_large_array_hash_is_stable() {
    let data: Vec<i64> = (0..ARRAY_SAMPLE_THRESHOLD as i64).collect();
    let a = NdArray::from_vec(data.clone());
    let b = NdArray::from_vec(data);
    assert_eq!(digest(&a), digest(&b));
  }

  #[test]
  fn test_small_array_hashes_every_element() {
    let a = NdArray::from_vec(vec![0u8; 1000]);
    let mut b = a.clone();
    b.as_mut_slice()[999] = 1;
    assert_ne!(digest(&a), digest(&b));
  }

  #[test]
  fn test_frame_hash_covers_schema_and_rows() {
    let a = Frame::new()
      .with_column("id", Column::Int(vec![1, 2, 3]))
      .unwrap()
      .with_column("name", Column::Str(vec!["a".into(), "b".into(), "c".into()]))
      .unwrap();
    let renamed = Frame::new()
      .with_column("key", Column::Int(vec![1, 2, 3]))
      .unwrap()
      .with_column("name", Column::Str(vec!["a".into(), "b".into(), "c".into()]))
      .unwrap();
    assert_ne!(digest(&a), digest(&renamed));
    assert_eq!(digest(&a), digest(&a.clone()));
    assert_eq!(a.num_rows(), 3);
  }

  #[test]
  fn test_frame_rejects_ragged_columns() {
    let err = Frame::new()
      .with_column("a", Column::Bool(vec![true]))
      .unwrap()
      .with_column("b", Column::Float(vec![1.0, 2.0]))
      .unwrap_err();
    assert_eq!(err.expected, 1);
    assert_eq!(err.actual, 2);
  }
}
