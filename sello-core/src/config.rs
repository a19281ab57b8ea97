use crate::bits;
use crate::error::{Error, Result};

/// Configuration for ownership and integrity watermarking.
///
/// The embedder and matching extractor/verifier must share an identical
/// config (same key, spread factor and block size), so this is a plain
/// immutable value record passed by reference to both sides.
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    /// Secret key. Seeds the chip generator; never transmitted.
    pub key: String,
    /// Base embedding strength on a 0–1 scale. Higher = more robust but
    /// more audible. Typical range: 0.02 to 0.12.
    pub strength: f32,
    /// Chips (frames) per payload bit. Larger = more robust, lower capacity.
    pub spread_factor: u32,
    /// Block size in samples for the fragile integrity chain.
    pub integrity_block_size: usize,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            strength: 0.10,
            spread_factor: 16384,
            integrity_block_size: 4096,
        }
    }
}

impl WatermarkConfig {
    /// Validate the configuration. Called by every codec constructor;
    /// a bad config aborts construction rather than corrupting output.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if !(self.strength > 0.0 && self.strength <= 1.0) {
            return Err(Error::InvalidStrength(self.strength));
        }
        if self.spread_factor == 0 {
            return Err(Error::InvalidSpreadFactor);
        }
        // 8 samples carry the chained hash bits; anything close to that
        // leaves no content worth protecting.
        if self.integrity_block_size < 16 {
            return Err(Error::InvalidBlockSize(self.integrity_block_size));
        }
        Ok(())
    }

    /// Frames required to embed `text` with this spread factor.
    pub fn frames_for_payload(&self, text: &str) -> usize {
        bits::payload_bits(text.len()) * self.spread_factor as usize
    }

    /// Maximum payload size in bytes that fits in `num_frames` frames.
    pub fn capacity_bytes(&self, num_frames: usize) -> usize {
        let bits_avail = num_frames / self.spread_factor as usize;
        bits_avail.saturating_sub(bits::HEADER_BITS) / 8
    }
}
