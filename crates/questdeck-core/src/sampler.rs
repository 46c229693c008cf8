//! Uniform sampling of challenge pools.

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;

/// Draw `k` distinct elements from `pool`.
///
/// A pool no larger than `k` comes back unchanged and in order. Otherwise the
/// draw is a partial Fisher-Yates shuffle over a copy of the pool, so every
/// k-subset is equally likely. Order of the drawn subset is unspecified.
pub fn sample<T: Clone, R: Rng + ?Sized>(pool: &[T], k: usize, rng: &mut R) -> Vec<T> {
    if pool.len() <= k {
        return pool.to_vec();
    }

    let mut scratch = pool.to_vec();
    let (drawn, _) = scratch.partial_shuffle(rng, k);
    drawn.to_vec()
}

/// Draw a single element, `None` for an empty pool.
pub fn sample_one<T: Clone, R: Rng + ?Sized>(pool: &[T], rng: &mut R) -> Option<T> {
    sample(pool, 1, rng).into_iter().next()
}

/// Seeded generator when `seed` is set, entropy-seeded otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> Mcg128Xsl64 {
    match seed {
        Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
        None => Mcg128Xsl64::from_entropy(),
    }
}
