//! PCG32 pseudorandom number generator (PCG-XSH-RR).
//!
//! Every random decision in the pipeline (object counts, placement
//! candidates, property draws, mutation targets) flows through this
//! generator, so a (seed, stream) pair reproduces a whole dataset run
//! bit for bit.

const MULTIPLIER: u64 = 6_364_136_223_846_793_005;

pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    pub fn new(seed: u64, seq: u64) -> Self {
        let inc = (seq << 1) | 1;
        let mut rng = Pcg32 { state: 0, inc };
        rng.advance();
        rng.state = rng.state.wrapping_add(seed);
        rng.advance();
        rng
    }

    fn advance(&mut self) {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(self.inc);
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.advance();
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        (xorshifted >> rot) | (xorshifted << (rot.wrapping_neg() & 31))
    }

    /// Uniform float in [0, 1).
    pub fn next_float(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform integer in [lo, hi], inclusive on both ends.
    pub fn next_int(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.next_u32() % (hi - lo + 1)
    }

    /// Uniform float in [lo, hi).
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_float() * (hi - lo)
    }

    /// Bernoulli draw with probability `p` of returning true.
    pub fn next_bool(&mut self, p: f64) -> bool {
        self.next_float() < p
    }

    /// Uniform choice from a slice. Returns None on an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_int(0, items.len() as u32 - 1) as usize;
        Some(&items[idx])
    }
}
