pub mod bits;
pub mod chip;
pub mod cipher;
pub mod config;
pub mod dsss;
pub mod error;
pub mod fft;
pub mod fingerprint;
pub mod identify;
pub mod integrity;
pub mod pearson;
pub mod source;
pub mod store;
pub mod tuner;

// Re-export primary API types
pub use cipher::PcmCipher;
pub use config::WatermarkConfig;
pub use dsss::{extract_from_source, Embedder, ExtractedPayload, StreamExtractor};
pub use error::Error;
pub use fingerprint::{AudioFingerprint, FingerprintConfig, FingerprintHash};
pub use identify::FingerprintResult;
pub use integrity::{IntegrityEmbedder, IntegrityVerifier, IntegrityViolation};
pub use source::{MemorySource, SampleSource};
pub use store::{FingerprintStore, MatchCandidate, MemoryFingerprintStore};
pub use tuner::TunedParameters;

/// Embed an ownership watermark into audio samples (in-place).
///
/// This is the one-shot API for file-based workflows.
/// For streaming/real-time use, see [`Embedder`].
pub fn embed(
    samples: &mut [f32],
    channels: usize,
    payload: &str,
    config: &WatermarkConfig,
) -> error::Result<()> {
    dsss::embed(samples, channels, payload, config)
}

/// Extract an ownership watermark from audio samples.
///
/// Searches for the sync pattern across frame offsets.
/// For streaming/real-time use, see [`StreamExtractor`].
pub fn extract(
    samples: &[f32],
    channels: usize,
    config: &WatermarkConfig,
) -> error::Result<ExtractedPayload> {
    dsss::extract(samples, channels, config)
}

/// Seal audio with a fragile integrity chain (in-place).
pub fn seal(samples: &mut [f32], config: &WatermarkConfig) -> error::Result<()> {
    integrity::seal(samples, config)
}

/// Verify a sealed stream; returns every detected violation.
pub fn verify(
    samples: &[f32],
    config: &WatermarkConfig,
) -> error::Result<Vec<IntegrityViolation>> {
    integrity::verify(samples, config)
}

/// Fingerprint audio for indexing or identification.
pub fn fingerprint(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    track_id: &str,
    config: &FingerprintConfig,
) -> error::Result<AudioFingerprint> {
    fingerprint::generate(samples, channels, sample_rate, track_id, config)
}

/// Identify an unknown clip against a fingerprint store.
pub fn identify<S: FingerprintStore + ?Sized>(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    store: &S,
    config: &FingerprintConfig,
) -> error::Result<Option<FingerprintResult>> {
    identify::identify(samples, channels, sample_rate, store, config)
}

/// Search for robust, minimally audible embedding parameters.
pub fn tune(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    payload: &str,
    key: &str,
) -> error::Result<TunedParameters> {
    tuner::tune(samples, channels, sample_rate, payload, key)
}
