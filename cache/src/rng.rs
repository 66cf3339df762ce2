use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Seed for every sample taken while hashing. Fixed so that the same large
/// value always selects the same elements.
const SAMPLE_SEED: u64 = 0;

/// A deterministic index sampler for hashing large homogeneous data.
#[derive(Debug, Clone)]
pub(crate) struct FixedSampler {
  rng: Pcg64,
}

impl FixedSampler {
  pub(crate) fn new() -> Self {
    Self {
      rng: Pcg64::seed_from_u64(SAMPLE_SEED),
    }
  }

  /// Draws `count` indices in `0..len`, with replacement, in draw order.
  pub(crate) fn indices(mut self, len: usize, count: usize) -> Vec<usize> {
    if len == 0 {
      return Vec::new();
    }
    (0..count).map(|_| self.rng.random_range(0..len)).collect()
  }
}
