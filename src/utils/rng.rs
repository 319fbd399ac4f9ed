//! Seeded random number generator.
//!
//! Weight initialization, dropout masks, shuffling and the synthetic data used
//! by the demos all draw from this xorshift generator, so a single seed in the
//! execution context reproduces a whole run.

/// Xorshift PRNG.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

const ZERO_SEED_REPLACEMENT: u64 = 0x9e3779b97f4a7c15;

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits keep the quotient strictly below 1.0 after rounding to f32
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Standard normal sample (Box-Muller).
    pub fn next_normal(&mut self) -> f32 {
        let u1 = self.next_f32().max(f32::MIN_POSITIVE);
        let u2 = self.next_f32();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            (self.next_u32() as usize) % upper
        }
    }

    /// Fisher-Yates shuffle for usize slices.
    pub fn shuffle_usize(&mut self, data: &mut [usize]) {
        if data.len() <= 1 {
            return;
        }
        for i in (1..data.len()).rev() {
            let j = self.gen_usize(i + 1);
            data.swap(i, j);
        }
    }

    /// Derive an independent generator, advancing this one.
    ///
    /// Layers that need their own stream (dropout) fork from the model's
    /// initialization RNG when they are built.
    pub fn fork(&mut self) -> SimpleRng {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        SimpleRng::new((hi << 32) | lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_next_f32_range() {
        let mut rng = SimpleRng::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f32();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_rng_zero_seed() {
        let mut zero = SimpleRng::new(0);
        let mut fixed = SimpleRng::new(ZERO_SEED_REPLACEMENT);
        assert_eq!(zero.next_u32(), fixed.next_u32());
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = SimpleRng::new(7);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| rng.next_normal()).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n as f32;

        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }

    #[test]
    fn test_fork_diverges_from_parent() {
        let mut parent = SimpleRng::new(99);
        let mut child = parent.fork();
        let a: Vec<u32> = (0..8).map(|_| parent.next_u32()).collect();
        let b: Vec<u32> = (0..8).map(|_| child.next_u32()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_shuffle_usize() {
        let mut rng = SimpleRng::new(33333);
        let mut data = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let original = data.clone();

        rng.shuffle_usize(&mut data);

        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(sorted, original);
        assert_ne!(data, original);
    }
}
