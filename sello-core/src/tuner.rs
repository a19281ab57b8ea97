//! Embedding parameter search.
//!
//! Runs embed → attack → extract trials on copies of representative
//! regions of the input, walking a fixed grid from the most robust
//! spread factor downward and the least audible strength upward. The
//! regions are alternative embedding sites, so a grid point is accepted
//! as soon as any one of them round-trips; a safety margin is applied
//! to the accepted strength.

use crate::config::WatermarkConfig;
use crate::dsss::{self, SILENCE_FLOOR};
use crate::error::Result;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Grid axes, in preference order: robustness first, audibility second.
const SPREAD_FACTORS: [u32; 4] = [16384, 8192, 4096, 2048];
const STRENGTHS: [f32; 6] = [0.02, 0.04, 0.06, 0.08, 0.10, 0.12];

/// Strength is never pushed past this, margin included.
const MAX_STRENGTH: f32 = 0.14;

/// Gain attack applied to each trial region before re-extraction.
const ATTACK_GAIN: f32 = 0.75;

/// Extra audio appended to each trial region beyond the payload itself,
/// in seconds. Gives the extractor the same slack a real clip would.
const REGION_SLACK_SECONDS: u32 = 5;

/// Conservative parameters reported when no grid point survives.
const FALLBACK: TunedParameters = TunedParameters {
    spread_factor: 16384,
    strength: 0.10,
    validated: false,
};

/// Outcome of a tuning run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedParameters {
    pub spread_factor: u32,
    pub strength: f32,
    /// True when the reported parameters survived a full trial. The
    /// fallback is a guess and must be verified by the caller.
    pub validated: bool,
}

/// Search for the weakest embedding that still survives a gain attack
/// in at least one sampled region of `samples`.
///
/// Falls back to conservative defaults (flagged `validated: false`)
/// when the audio is too short or too quiet for any grid point.
pub fn tune(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    payload: &str,
    key: &str,
) -> Result<TunedParameters> {
    let channels = channels.max(1);
    let num_frames = samples.len() / channels;

    let mut grid: Vec<(u32, f32)> = Vec::new();
    for &sf in &SPREAD_FACTORS {
        let region = region_frames(sf, sample_rate, payload);
        if region > num_frames {
            continue; // payload cannot fit at this spread factor
        }
        for &strength in &STRENGTHS {
            grid.push((sf, strength));
        }
    }
    if grid.is_empty() {
        return Ok(FALLBACK);
    }

    // Region starts are shared across the grid at the coarsest feasible
    // spread factor, so every grid point is judged on the same audio.
    let max_region = region_frames(grid[0].0, sample_rate, payload);
    let starts = pick_regions(samples, channels, sample_rate, max_region);

    let accepted = find_accepted(&grid, samples, channels, sample_rate, payload, key, &starts);

    Ok(match accepted {
        Some((spread_factor, strength)) => TunedParameters {
            spread_factor,
            strength: (strength * safety_margin(strength)).min(MAX_STRENGTH),
            validated: true,
        },
        None => FALLBACK,
    })
}

#[cfg(feature = "parallel")]
fn find_accepted(
    grid: &[(u32, f32)],
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    payload: &str,
    key: &str,
    starts: &[usize],
) -> Option<(u32, f32)> {
    // find_first keeps grid preference order despite parallel trials.
    grid.par_iter()
        .copied()
        .find_first(|&(sf, strength)| {
            passes_any_region(samples, channels, sample_rate, payload, key, sf, strength, starts)
        })
}

#[cfg(not(feature = "parallel"))]
fn find_accepted(
    grid: &[(u32, f32)],
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    payload: &str,
    key: &str,
    starts: &[usize],
) -> Option<(u32, f32)> {
    grid.iter().copied().find(|&(sf, strength)| {
        passes_any_region(samples, channels, sample_rate, payload, key, sf, strength, starts)
    })
}

/// Weaker embeddings get a larger headroom multiplier; near the top of
/// the grid the trial already proved most of the budget.
fn safety_margin(strength: f32) -> f32 {
    if strength <= 0.04 {
        1.5
    } else if strength <= 0.08 {
        1.25
    } else {
        1.15
    }
}

/// Frames needed for one trial region at a given spread factor.
fn region_frames(spread_factor: u32, sample_rate: u32, payload: &str) -> usize {
    let cfg = WatermarkConfig {
        spread_factor,
        ..WatermarkConfig::default()
    };
    cfg.frames_for_payload(payload) + (REGION_SLACK_SECONDS * sample_rate) as usize
}

/// Up to three trial regions: the opening, ten seconds in, and the
/// liveliest stretch found by a coarse silence scan.
fn pick_regions(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    region: usize,
) -> Vec<usize> {
    let num_frames = samples.len() / channels;
    let last_start = num_frames.saturating_sub(region);

    let mut starts = vec![0usize];
    let ten_seconds = 10 * sample_rate as usize;
    if ten_seconds <= last_start && !starts.contains(&ten_seconds) {
        starts.push(ten_seconds);
    }
    if let Some(busy) = busiest_start(samples, channels, sample_rate, region, last_start) {
        if !starts.contains(&busy) {
            starts.push(busy);
        }
    }
    starts.truncate(3);
    starts
}

/// Coarse scan for the candidate region with the fewest near-silent
/// frames. Samples one frame in every 64 to stay cheap on long inputs.
fn busiest_start(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    region: usize,
    last_start: usize,
) -> Option<usize> {
    if last_start == 0 {
        return None;
    }
    let step = (sample_rate as usize).max(1); // one candidate per second
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0usize;
    while start <= last_start {
        let mut silent = 0usize;
        let mut frame = start;
        while frame < start + region {
            if samples[frame * channels].abs() < SILENCE_FLOOR {
                silent += 1;
            }
            frame += 64;
        }
        match best {
            Some((_, best_silent)) if silent >= best_silent => {}
            _ => best = Some((start, silent)),
        }
        start += step;
    }
    best.map(|(s, _)| s)
}

/// One grid point against the candidate regions: embed, extract, attack,
/// extract again. The regions are alternative sites, which is what lets
/// the search step past a quiet intro, so the first one whose trial
/// recovers the payload verbatim accepts the grid point.
#[allow(clippy::too_many_arguments)]
fn passes_any_region(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    payload: &str,
    key: &str,
    spread_factor: u32,
    strength: f32,
    starts: &[usize],
) -> bool {
    let cfg = WatermarkConfig {
        key: key.to_string(),
        strength,
        spread_factor,
        ..WatermarkConfig::default()
    };
    let region = region_frames(spread_factor, sample_rate, payload);
    let num_frames = samples.len() / channels;

    starts.iter().any(|&start| {
        let start = start.min(num_frames.saturating_sub(region));
        let mut trial = samples[start * channels..(start + region) * channels].to_vec();
        if dsss::embed(&mut trial, channels, payload, &cfg).is_err() {
            return false;
        }
        if !recovers(&trial, channels, payload, &cfg) {
            return false;
        }
        for s in trial.iter_mut() {
            *s *= ATTACK_GAIN;
        }
        recovers(&trial, channels, payload, &cfg)
    })
}

fn recovers(trial: &[f32], channels: usize, payload: &str, cfg: &WatermarkConfig) -> bool {
    dsss::extract_aligned(trial, channels, cfg)
        .map(|p| p.text == payload)
        .unwrap_or(false)
}
