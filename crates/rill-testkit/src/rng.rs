//! Seeded randomness for reproducible calculations.

use std::ops::Range;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rill_reactive::CalculationContext;

/// Calculation context carrying a deterministic RNG.
pub type SeededContext = CalculationContext<ChaCha8Rng>;

/// A context whose RNG yields the same sequence for the same seed.
pub fn seeded_context(seed: u64) -> SeededContext {
    CalculationContext::new(ChaCha8Rng::seed_from_u64(seed))
}

/// Draw a delay in `millis` from the context's RNG.
pub fn random_delay(context: &SeededContext, millis: Range<u64>) -> Duration {
    Duration::from_millis(context.with(|rng| rng.gen_range(millis)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_delays() {
        let a = seeded_context(7);
        let b = seeded_context(7);
        let left: Vec<_> = (0..8).map(|_| random_delay(&a, 1..500)).collect();
        let right: Vec<_> = (0..8).map(|_| random_delay(&b, 1..500)).collect();
        assert_eq!(left, right);
        assert!(left.iter().all(|d| *d >= Duration::from_millis(1)));
    }
}
