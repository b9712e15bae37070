//! Randomness seam for the clock phase draw.
//!
//! The clock manager only ever needs uniform deviates, so it depends on
//! this narrow trait rather than a concrete generator. Any [`rand::Rng`]
//! satisfies it; tests can substitute a fixed sequence.

/// Source of uniform random deviates.
pub trait UniformSource {
    /// A deviate uniform in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// A deviate uniform in `[low, high)`.
    fn flat(&mut self, low: f64, high: f64) -> f64 {
        low + self.uniform() * (high - low)
    }
}

impl<R: rand::Rng> UniformSource for R {
    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_flat_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let x = rng.flat(0.0, 1600.0);
            assert!((0.0..1600.0).contains(&x));
        }
    }
}
