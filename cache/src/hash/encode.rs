//! Direct byte encodings for scalar values.

/// Encodes a signed integer as little-endian two's complement using
/// `(bit_length + 8) / 8` bytes, so every value carries room for its sign.
pub(crate) fn int_to_bytes(i: i128) -> Vec<u8> {
  let magnitude = i.unsigned_abs();
  let bit_length = (u128::BITS - magnitude.leading_zeros()) as usize;
  let num_bytes = (bit_length + 8) / 8;
  i.to_le_bytes()[..num_bytes.min(16)].to_vec()
}

/// Same scheme as [`int_to_bytes`], for values beyond `i128::MAX`.
pub(crate) fn uint_to_bytes(u: u128) -> Vec<u8> {
  if let Ok(i) = i128::try_from(u) {
    return int_to_bytes(i);
  }
  // 128 significant bits need a 17th byte for the (zero) sign.
  let mut out = u.to_le_bytes().to_vec();
  out.push(0);
  out
}

/// Encodes a float through its integer hash representation.
///
/// Integral values encode exactly like the equal integer, so `1.0` and `1`
/// collide on purpose. `-0.0` follows `0.0`, and every NaN shares one
/// encoding.
pub(crate) fn float_to_bytes(f: f64) -> Vec<u8> {
  if f.is_nan() {
    return b"nan".to_vec();
  }
  if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38 {
    return int_to_bytes(f as i128);
  }
  int_to_bytes(f.to_bits() as i64 as i128)
}

/// Canonical bits of a float for exact-equality lookups.
pub(crate) fn float_key_bits(f: f64) -> u64 {
  if f.is_nan() {
    f64::NAN.to_bits()
  } else if f == 0.0 {
    0
  } else {
    f.to_bits()
  }
}
