//! Acoustic landmark fingerprinting.
//!
//! Frames the signal, finds prominent spectral peaks in logarithmic bands,
//! then pairs each peak (anchor) with a handful of nearby later peaks
//! (targets). Each pair becomes a compact 32-bit hash that survives
//! moderate noise and level changes, keyed by the anchor's frame offset.

use crate::error::Result;
use crate::fft::SpectrumAnalyzer;

/// Fingerprinting parameters. Matching requires that index and query
/// were generated with identical parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintConfig {
    /// Analysis frame size in samples. Must be even.
    pub frame_size: usize,
    /// Hop between successive frames in samples.
    pub hop_size: usize,
    /// Number of logarithmic frequency bands to pick peaks from.
    pub num_bands: usize,
    /// Maximum target peaks paired with each anchor.
    pub fan_out: usize,
    /// How far ahead (in frames) an anchor may look for targets.
    pub target_zone_frames: u32,
    /// Widest bin distance between anchor and target. Keeps the target
    /// zone bounded in frequency as well as time.
    pub max_bin_delta: u32,
    /// Lowest bin considered; bin 0 is DC and never carries a landmark.
    pub min_bin: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            num_bands: 6,
            fan_out: 5,
            target_zone_frames: 64,
            max_bin_delta: 255,
            min_bin: 1,
        }
    }
}

/// One landmark pair hash and the frame index of its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintHash {
    pub hash: u32,
    pub time_offset: u32,
}

/// Complete fingerprint for one track.
#[derive(Debug, Clone)]
pub struct AudioFingerprint {
    pub track_id: String,
    pub hashes: Vec<FingerprintHash>,
    pub duration_seconds: f64,
}

/// A spectral peak: frame index and frequency bin.
#[derive(Debug, Clone, Copy)]
struct Peak {
    frame: u32,
    bin: u32,
}

/// Fingerprint an interleaved PCM buffer.
///
/// Multichannel input is downmixed to mono before analysis so the same
/// track fingerprints identically regardless of channel layout.
pub fn generate(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    track_id: &str,
    config: &FingerprintConfig,
) -> Result<AudioFingerprint> {
    let channels = channels.max(1);
    let mono = downmix(samples, channels);
    let duration_seconds = mono.len() as f64 / sample_rate as f64;

    let peaks = extract_peaks(&mono, config)?;
    let hashes = pair_peaks(&peaks, config);

    Ok(AudioFingerprint {
        track_id: track_id.to_string(),
        hashes,
        duration_seconds,
    })
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Per-frame peak picking: one candidate peak per logarithmic band, kept
/// only if it rises above the mean of the frame's band maxima. Quiet or
/// flat frames contribute few or no peaks.
fn extract_peaks(mono: &[f32], config: &FingerprintConfig) -> Result<Vec<Peak>> {
    let mut analyzer = SpectrumAnalyzer::new(config.frame_size)?;
    let num_bins = analyzer.num_bins();
    let edges = band_edges(config.min_bin, num_bins, config.num_bands);

    let mut mags = vec![0.0f32; num_bins];
    let mut peaks = Vec::new();

    for (frame_idx, frame) in mono
        .windows(config.frame_size)
        .step_by(config.hop_size)
        .enumerate()
    {
        analyzer.magnitudes(frame, &mut mags)?;

        // Strongest bin in each band.
        let mut band_max: Vec<(u32, f32)> = Vec::with_capacity(config.num_bands);
        for band in edges.windows(2) {
            let (lo, hi) = (band[0], band[1]);
            if lo >= hi {
                continue;
            }
            let (bin, mag) = mags[lo..hi]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, &m)| ((lo + i) as u32, m))
                .expect("band is non-empty");
            band_max.push((bin, mag));
        }
        if band_max.is_empty() {
            continue;
        }

        let mean = band_max.iter().map(|&(_, m)| m).sum::<f32>() / band_max.len() as f32;
        for &(bin, mag) in &band_max {
            if mag >= mean && mag > 0.0 {
                peaks.push(Peak {
                    frame: frame_idx as u32,
                    bin,
                });
            }
        }
    }

    Ok(peaks)
}

/// Geometric band boundaries over [min_bin, num_bins).
fn band_edges(min_bin: usize, num_bins: usize, num_bands: usize) -> Vec<usize> {
    let lo = min_bin.max(1) as f64;
    let hi = num_bins as f64;
    let ratio = (hi / lo).powf(1.0 / num_bands as f64);
    let mut edges: Vec<usize> = (0..=num_bands)
        .map(|i| (lo * ratio.powi(i as i32)).round() as usize)
        .collect();
    // Rounding can collapse narrow low bands; force monotonicity.
    for i in 1..edges.len() {
        edges[i] = edges[i].max(edges[i - 1] + 1).min(num_bins);
    }
    edges[num_bands] = num_bins;
    edges
}

/// Combine anchor and target into a 32-bit hash:
/// 10 bits anchor bin, 10 bits target bin, 12 bits frame delta.
fn pack_hash(anchor_bin: u32, target_bin: u32, frame_delta: u32) -> u32 {
    ((anchor_bin & 0x3FF) << 22) | ((target_bin & 0x3FF) << 12) | (frame_delta & 0xFFF)
}

fn pair_peaks(peaks: &[Peak], config: &FingerprintConfig) -> Vec<FingerprintHash> {
    let mut hashes = Vec::new();
    for (i, anchor) in peaks.iter().enumerate() {
        let mut paired = 0;
        for target in &peaks[i + 1..] {
            let dt = target.frame - anchor.frame;
            if dt == 0 {
                continue;
            }
            if dt > config.target_zone_frames {
                break;
            }
            if anchor.bin.abs_diff(target.bin) > config.max_bin_delta {
                continue;
            }
            hashes.push(FingerprintHash {
                hash: pack_hash(anchor.bin, target.bin, dt),
                time_offset: anchor.frame,
            });
            paired += 1;
            if paired >= config.fan_out {
                break;
            }
        }
    }
    hashes
}
