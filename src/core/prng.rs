// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// Every stochastic decision of the engine (learning acceptance, cause/response
// picks, residual response noise) draws from one stream, so the state is part
// of the saved image.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        Self::from_state(seed)
    }

    pub(crate) fn from_state(state: u64) -> Self {
        // Avoid a zero state.
        let state = if state == 0 {
            0x9E3779B97F4A7C15
        } else {
            state
        };
        Self { state }
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 significant bits.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64_01() < p
    }

    /// Uniform index in `0..n`; returns 0 for `n == 0`.
    #[inline]
    pub fn choice(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }

    #[inline]
    pub fn coin(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(4517);
        let mut b = Prng::new(4517);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut rng = Prng::new(0);
        assert_ne!(rng.state(), 0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn restored_state_continues_stream() {
        let mut a = Prng::new(99);
        a.next_u32();
        let mut b = Prng::from_state(a.state());
        assert_eq!(a.next_f64_01(), b.next_f64_01());
    }

    #[test]
    fn unit_interval_and_choice_bounds() {
        let mut rng = Prng::new(7);
        for _ in 0..1000 {
            let x = rng.next_f64_01();
            assert!((0.0..1.0).contains(&x));
            assert!(rng.choice(5) < 5);
        }
        assert_eq!(rng.choice(0), 0);
        assert!(!rng.chance(0.0));
        assert!(rng.chance(1.0));
    }
}
