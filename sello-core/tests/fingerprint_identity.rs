//! End-to-end fingerprinting: index a small catalog, identify clips.

use sello_core::{FingerprintConfig, FingerprintStore, MemoryFingerprintStore};

/// Synthetic "track": a stepped tone sequence seeded per track so each
/// catalog entry has its own spectral trajectory.
fn make_track(seconds: usize, sample_rate: u32, seed: u32) -> Vec<f32> {
    let num_samples = seconds * sample_rate as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let step = (i / 4096) as u32;
            let mut state = seed.wrapping_add(step).wrapping_mul(0x9E37_79B9);
            state ^= state >> 16;
            let freq = 200.0 + (state % 2000) as f32;
            0.8 * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

fn build_catalog(sample_rate: u32) -> (MemoryFingerprintStore, FingerprintConfig) {
    let store = MemoryFingerprintStore::new();
    let config = FingerprintConfig::default();
    for (id, seed) in [("alpha", 11u32), ("bravo", 22), ("charlie", 33)] {
        let track = make_track(8, sample_rate, seed);
        let fp = sello_core::fingerprint(&track, 1, sample_rate, id, &config).unwrap();
        assert!(!fp.hashes.is_empty(), "track {id} produced no landmarks");
        store.insert(&fp).unwrap();
    }
    (store, config)
}

#[test]
fn identifies_clip_and_locates_it() {
    let sample_rate = 44_100;
    let (store, config) = build_catalog(sample_rate);

    let track = make_track(8, sample_rate, 22);
    // Hop-aligned 3-second clip starting 3 seconds in.
    let start = (3 * sample_rate as usize / config.hop_size) * config.hop_size;
    let clip = &track[start..start + 3 * sample_rate as usize];

    let result = sello_core::identify(clip, 1, sample_rate, &store, &config)
        .unwrap()
        .expect("known clip not identified");

    assert_eq!(result.track_id, "bravo");
    let expected = start as f64 / sample_rate as f64;
    let frame_duration = config.frame_size as f64 / sample_rate as f64;
    assert!(
        (result.match_time_seconds - expected).abs() <= frame_duration,
        "located at {}s, expected {}s",
        result.match_time_seconds,
        expected
    );
}

#[test]
fn unknown_clip_is_reported_absent() {
    let sample_rate = 44_100;
    let (store, config) = build_catalog(sample_rate);

    let stranger = make_track(5, sample_rate, 99);
    let result = sello_core::identify(&stranger, 1, sample_rate, &store, &config).unwrap();
    assert!(result.is_none());
}

#[test]
fn stereo_clip_matches_mono_index() {
    let sample_rate = 44_100;
    let (store, config) = build_catalog(sample_rate);

    let track = make_track(8, sample_rate, 33);
    let stereo: Vec<f32> = track[..4 * sample_rate as usize]
        .iter()
        .flat_map(|&s| [s, s])
        .collect();

    let result = sello_core::identify(&stereo, 2, sample_rate, &store, &config)
        .unwrap()
        .expect("stereo rendition not identified");
    assert_eq!(result.track_id, "charlie");
}

#[test]
fn confidence_counts_aligned_votes() {
    let sample_rate = 44_100;
    let (store, config) = build_catalog(sample_rate);

    let track = make_track(8, sample_rate, 11);
    let full = sello_core::identify(&track, 1, sample_rate, &store, &config)
        .unwrap()
        .expect("full track not identified");
    let clip = sello_core::identify(
        &track[..2 * sample_rate as usize],
        1,
        sample_rate,
        &store,
        &config,
    )
    .unwrap()
    .expect("clip not identified");

    assert_eq!(full.track_id, "alpha");
    assert_eq!(clip.track_id, "alpha");
    // More shared audio means more votes for the winning alignment.
    assert!(full.confidence > clip.confidence);
}

#[test]
fn store_trait_object_is_usable() {
    let sample_rate = 44_100;
    let (store, config) = build_catalog(sample_rate);
    let dyn_store: &dyn FingerprintStore = &store;

    let track = make_track(8, sample_rate, 11);
    let result = sello_core::identify(&track, 1, sample_rate, dyn_store, &config)
        .unwrap()
        .expect("identification through trait object failed");
    assert_eq!(result.track_id, "alpha");
}
