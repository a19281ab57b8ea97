//! Query-side identification: vote on time-offset deltas.
//!
//! A true match puts the query clip at a fixed position inside the
//! indexed track, so every shared hash votes for the same delta between
//! track offset and query offset. Random collisions scatter across
//! deltas and never accumulate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::fingerprint::{self, FingerprintConfig};
use crate::store::FingerprintStore;

/// Aligned-hash votes required before a match is reported. Below this,
/// collisions between unrelated tracks are a real possibility.
const MIN_ALIGNED_HASHES: u32 = 5;

/// A successful identification.
#[derive(Debug, Clone)]
pub struct FingerprintResult {
    pub track_id: String,
    /// Number of hashes that agreed on the winning alignment.
    pub confidence: u32,
    /// Position of the query clip within the matched track, in seconds.
    pub match_time_seconds: f64,
    pub processing_time: Duration,
}

/// Identify an unknown clip against an indexed store.
///
/// Returns `Ok(None)` when nothing reaches the confidence threshold;
/// absence of a match is an answer, not an error.
pub fn identify<S: FingerprintStore + ?Sized>(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    store: &S,
    config: &FingerprintConfig,
) -> Result<Option<FingerprintResult>> {
    let started = Instant::now();

    let query = fingerprint::generate(samples, channels, sample_rate, "query", config)?;

    // (track, track_offset - query_offset) -> votes
    let mut votes: HashMap<(String, i64), u32> = HashMap::new();
    for h in &query.hashes {
        for candidate in store.query(h.hash)? {
            let delta = candidate.track_time_offset as i64 - h.time_offset as i64;
            *votes.entry((candidate.track_id, delta)).or_insert(0) += 1;
        }
    }

    let best = votes
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

    let result = match best {
        Some(((track_id, delta), confidence)) if confidence >= MIN_ALIGNED_HASHES => {
            // Negative delta means the clip starts before the indexed
            // track; clamp rather than report a nonsense position.
            let frames = delta.max(0) as f64;
            Some(FingerprintResult {
                track_id,
                confidence,
                match_time_seconds: frames * config.hop_size as f64 / sample_rate as f64,
                processing_time: started.elapsed(),
            })
        }
        _ => None,
    };
    Ok(result)
}
