//! Fragile block-chained integrity watermark.
//!
//! The channel-interleaved sample stream is cut into fixed-size blocks.
//! Each block's first 8 samples carry the previous block's Pearson hash,
//! one bit per sample in the LSB of the raw f32 bit pattern. The hash of
//! a block covers the block as written (check bits included), so embedder
//! and verifier observe identical bytes. Any lossy transform destroys the
//! LSBs and with them detectability — that fragility is the feature.

use crate::config::WatermarkConfig;
use crate::error::{Error, Result};
use crate::pearson::PearsonHasher;

/// Samples at the head of each block that carry the chained hash.
pub const CHECK_SAMPLES: usize = 8;

/// The chain is keyless, so only the block size matters here; a block
/// must at least hold its own check bits with room to spare.
fn validate_block_size(block_size: usize) -> Result<usize> {
    if block_size < 2 * CHECK_SAMPLES {
        return Err(Error::InvalidBlockSize(block_size));
    }
    Ok(block_size)
}

#[inline]
fn write_lsb(sample: f32, bit: u8) -> f32 {
    f32::from_bits((sample.to_bits() & !1) | (bit as u32 & 1))
}

#[inline]
fn read_lsb(sample: f32) -> u8 {
    (sample.to_bits() & 1) as u8
}

/// Streaming integrity embedder.
pub struct IntegrityEmbedder {
    block_size: usize,
    fill: usize,
    hasher: PearsonHasher,
    prev_hash: Option<u8>,
}

impl IntegrityEmbedder {
    pub fn new(config: &WatermarkConfig) -> Result<Self> {
        Ok(Self {
            block_size: validate_block_size(config.integrity_block_size)?,
            fill: 0,
            hasher: PearsonHasher::new(),
            prev_hash: None,
        })
    }

    /// Embed chain bits into a chunk of interleaved samples, in place.
    ///
    /// The very first block has no predecessor and receives no check
    /// bits; a trailing partial block is hashed but never verified.
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            if self.fill < CHECK_SAMPLES {
                if let Some(hash) = self.prev_hash {
                    let bit = (hash >> (CHECK_SAMPLES - 1 - self.fill)) & 1;
                    *sample = write_lsb(*sample, bit);
                }
            }
            self.hasher.update_sample(*sample);
            self.fill += 1;
            if self.fill == self.block_size {
                self.prev_hash = Some(self.hasher.finish());
                self.hasher.reset();
                self.fill = 0;
            }
        }
    }
}

/// A failed chain check. Non-fatal: reported, not thrown.
///
/// The check at block `block_index` covers the previous block, so a
/// tamper in block k surfaces here with index k+1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Index of the block whose embedded check value did not match.
    pub block_index: u64,
    /// Hash claimed by the check bits.
    pub claimed: u8,
    /// Hash recomputed from the buffered samples.
    pub actual: u8,
}

/// Streaming integrity verifier, mirror of [`IntegrityEmbedder`].
pub struct IntegrityVerifier {
    block_size: usize,
    fill: usize,
    hasher: PearsonHasher,
    prev_hash: Option<u8>,
    claimed: u8,
    block_index: u64,
}

impl IntegrityVerifier {
    pub fn new(config: &WatermarkConfig) -> Result<Self> {
        Ok(Self {
            block_size: validate_block_size(config.integrity_block_size)?,
            fill: 0,
            hasher: PearsonHasher::new(),
            prev_hash: None,
            claimed: 0,
            block_index: 0,
        })
    }

    /// Verify a chunk of interleaved samples, returning every violation
    /// found in it. Callers wanting fail-fast simply stop at the first
    /// non-empty return.
    pub fn process(&mut self, samples: &[f32]) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        for &sample in samples {
            if self.fill < CHECK_SAMPLES {
                self.claimed = (self.claimed << 1) | read_lsb(sample);
            }
            self.hasher.update_sample(sample);
            self.fill += 1;

            if self.fill == CHECK_SAMPLES {
                if let Some(expected) = self.prev_hash {
                    if self.claimed != expected {
                        violations.push(IntegrityViolation {
                            block_index: self.block_index,
                            claimed: self.claimed,
                            actual: expected,
                        });
                    }
                }
            }
            if self.fill == self.block_size {
                self.prev_hash = Some(self.hasher.finish());
                self.hasher.reset();
                self.fill = 0;
                self.claimed = 0;
                self.block_index += 1;
            }
        }
        violations
    }

    /// Blocks fully processed so far.
    pub fn blocks_seen(&self) -> u64 {
        self.block_index
    }
}

/// One-shot convenience: embed the chain over a whole buffer.
pub fn seal(samples: &mut [f32], config: &WatermarkConfig) -> Result<()> {
    let mut embedder = IntegrityEmbedder::new(config)?;
    embedder.process(samples);
    Ok(())
}

/// One-shot convenience: verify a whole buffer, returning all violations.
pub fn verify(samples: &[f32], config: &WatermarkConfig) -> Result<Vec<IntegrityViolation>> {
    let mut verifier = IntegrityVerifier::new(config)?;
    Ok(verifier.process(samples))
}
