//! Deterministic draw stream
//!
//! seed -> SHA-256 -> state; every draw re-hashes the state and maps the
//! first 48 bits of the new digest onto [0, 1). The only randomness used
//! anywhere in scoring.

use sha2::{Digest, Sha256};

const DRAW_BYTES: usize = 6;
const DRAW_SCALE: f64 = (1u64 << (DRAW_BYTES * 8)) as f64;

/// Reproducible stream of uniform draws in [0, 1)
#[derive(Debug, Clone)]
pub struct DrawStream {
    state: [u8; 32],
}

impl DrawStream {
    pub fn new(seed: &str) -> Self {
        Self {
            state: Sha256::digest(seed.as_bytes()).into(),
        }
    }

    /// Independent sub-stream, e.g. `DrawStream::derived(seed, "-crash")`
    pub fn derived(seed: &str, discriminator: &str) -> Self {
        Self::new(&format!("{}{}", seed, discriminator))
    }

    /// Next uniform value in [0, 1)
    pub fn next_unit(&mut self) -> f64 {
        self.state = Sha256::digest(self.state).into();
        let mut wide = [0u8; 8];
        wide[8 - DRAW_BYTES..].copy_from_slice(&self.state[..DRAW_BYTES]);
        u64::from_be_bytes(wide) as f64 / DRAW_SCALE
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        let idx = (self.next_unit() * len as f64).floor() as usize;
        idx.min(len.saturating_sub(1))
    }
}

impl Iterator for DrawStream {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_unit())
    }
}
