//! Deterministic ±1 chip generator.
//!
//! Both the embedder and the extractor derive the same chip train from the
//! secret key alone, so nothing about the spreading sequence is ever
//! transmitted. The state is an explicit value threaded through calls,
//! which keeps the generator trivially reproducible in tests and lets the
//! tuner run independent simulations from the same key.

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET: u32 = 0x811C_9DC5;
/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 0x0100_0193;
/// Substitute seed when the key hashes to zero (xorshift fixes at zero).
const ZERO_SEED_SUBSTITUTE: u32 = 0x9E37_79B9;

/// Stable 32-bit hash of the secret key, FNV-1a with wrapping arithmetic.
pub fn seed_from_key(key: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in key.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    if hash == 0 {
        ZERO_SEED_SUBSTITUTE
    } else {
        hash
    }
}

/// Value-threaded xorshift32 generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipGen {
    state: u32,
}

impl ChipGen {
    /// Seed the generator from a secret key.
    pub fn new(key: &str) -> Self {
        Self {
            state: seed_from_key(key),
        }
    }

    /// Advance one step, returning a value in [0, 1) and the next state.
    pub fn next(self) -> (f32, ChipGen) {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        // Max-uint normalization; f64 intermediate avoids rounding to 1.0.
        let value = (x as f64 / (u32::MAX as f64 + 1.0)) as f32;
        (value, ChipGen { state: x })
    }

    /// Advance one step, returning the chip (±1.0) and the next state.
    pub fn next_chip(self) -> (f32, ChipGen) {
        let (value, next) = self.next();
        let chip = if value < 0.5 { -1.0 } else { 1.0 };
        (chip, next)
    }
}
