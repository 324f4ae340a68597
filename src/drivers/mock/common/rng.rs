//! Seeded RNG wrapper for reproducible behavior.
//!
//! Thread-safe, seeded random number generator shared by the simulated
//! signal (noise) and the error injection framework.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG wrapper for reproducible random behavior
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Create a new RNG with optional seed.
    /// If seed is None, uses a random seed from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// Check if an operation should fail based on the given failure rate.
    ///
    /// # Arguments
    /// * `rate` - Failure probability from 0.0 (never fail) to 1.0 (always fail)
    pub fn should_fail(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        self.inner.lock().gen::<f64>() < rate
    }

    /// Generate a random f64 value in the range [0.0, 1.0)
    pub fn next_f64(&self) -> f64 {
        self.inner.lock().gen()
    }

    /// Generate a random value in the given range
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.inner.lock().gen_range(range)
    }

    /// Uniform noise in `[-amplitude, amplitude)`; zero when amplitude is not positive
    pub fn noise(&self, amplitude: f64) -> f64 {
        if amplitude > 0.0 {
            self.gen_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng")
            .field("inner", &"<Mutex<ChaCha8Rng>>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_deterministic() {
        let rng1 = MockRng::new(Some(42));
        let rng2 = MockRng::new(Some(42));
        assert_eq!(rng1.next_f64(), rng2.next_f64(), "Same seed should produce same values");
    }

    #[test]
    fn test_should_fail_bounds() {
        let rng = MockRng::new(Some(42));
        for _ in 0..100 {
            assert!(!rng.should_fail(0.0), "Rate 0.0 should never fail");
            assert!(rng.should_fail(1.0), "Rate 1.0 should always fail");
        }
    }

    #[test]
    fn test_noise_amplitude() {
        let rng = MockRng::new(Some(7));
        for _ in 0..1000 {
            let n = rng.noise(0.5);
            assert!((-0.5..0.5).contains(&n), "noise {} out of range", n);
        }
        assert_eq!(rng.noise(0.0), 0.0);
    }
}
