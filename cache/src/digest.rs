use std::fmt;

/// A 16-byte structural digest. This is the key type of every cache store.
///
/// The digest is an MD5 over the structural encoding of a value. It is meant
/// for cache keys only and makes no claim of resistance to adversarial input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 16]);

impl Digest {
  /// Digests a byte string.
  #[inline]
  pub fn of(bytes: &[u8]) -> Self {
    Digest(md5::compute(bytes).0)
  }

  #[inline]
  pub fn as_bytes(&self) -> &[u8; 16] {
    &self.0
  }

  /// Renders the digest as 32 lowercase hex characters.
  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }
}

impl From<[u8; 16]> for Digest {
  fn from(bytes: [u8; 16]) -> Self {
    Digest(bytes)
  }
}

impl fmt::Display for Digest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for Digest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Digest({})", self.to_hex())
  }
}
