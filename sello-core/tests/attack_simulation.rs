//! Embed → attack → extract scenarios, plus the parameter tuner on top
//! of them.

use sello_core::WatermarkConfig;

fn make_test_audio(num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let mut samples = vec![0.0f32; num_samples];
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f32 / sample_rate as f32;
        for k in 1u32..80 {
            let freq = k as f32 * 60.0;
            let amp = 1.0 / (k as f32).sqrt();
            *sample += amp * (2.0 * std::f32::consts::PI * freq * t + k as f32).sin();
        }
    }
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s *= 0.9 / peak;
        }
    }
    samples
}

/// Full-scale square wave: the densest signal the embedder can ride on.
fn make_loud_audio(num_samples: usize, sample_rate: u32) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.95 * (2.0 * std::f32::consts::PI * 440.0 * t).sin().signum()
        })
        .collect()
}

fn ownership_config() -> WatermarkConfig {
    WatermarkConfig {
        key: "attack-sim-key".to_string(),
        strength: 0.6,
        spread_factor: 2048,
        ..WatermarkConfig::default()
    }
}

#[test]
fn survives_gain_attack() {
    let config = ownership_config();
    let sample_rate = 44_100;
    let mut audio = make_test_audio(sample_rate as usize * 10, sample_rate);

    sello_core::embed(&mut audio, 1, "gain attack", &config).unwrap();
    for s in audio.iter_mut() {
        *s *= 0.75;
    }

    let payload = sello_core::extract(&audio, 1, &config).unwrap();
    assert_eq!(payload.text, "gain attack");
}

#[test]
fn survives_gain_attack_with_leading_offset() {
    let config = ownership_config();
    let sample_rate = 44_100;
    let lead = 1500usize;

    let mut audio = make_test_audio(sample_rate as usize * 10, sample_rate);
    sello_core::embed(&mut audio[lead..], 1, "shifted", &config).unwrap();
    for s in audio.iter_mut() {
        *s *= 0.75;
    }

    let payload = sello_core::extract(&audio, 1, &config).unwrap();
    assert_eq!(payload.text, "shifted");
    assert_eq!(payload.sync_offset, lead);
}

#[test]
fn heavy_additive_noise_defeats_extraction() {
    let config = ownership_config();
    let sample_rate = 44_100;
    let mut audio = make_test_audio(sample_rate as usize * 10, sample_rate);

    sello_core::embed(&mut audio, 1, "buried", &config).unwrap();

    // Deterministic noise far above the chip energy.
    let mut state: u32 = 0xDEAD_BEEF;
    for s in audio.iter_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *s += (state as f32 / u32::MAX as f32 - 0.5) * 8.0;
    }

    assert!(sello_core::extract(&audio, 1, &config).is_err());
}

#[test]
fn tuner_validates_on_sustained_loud_audio() {
    let sample_rate = 44_100;
    let audio = make_loud_audio(sample_rate as usize * 25, sample_rate);

    let tuned = sello_core::tune(&audio, 1, sample_rate, "TEST", "tuner-key").unwrap();
    assert!(tuned.validated, "tuner fell back on easy audio: {tuned:?}");
    assert_eq!(tuned.spread_factor, 8192);
    assert!(tuned.strength > 0.0 && tuned.strength <= 0.14);

    // The accepted parameters must hold up outside the tuner's own
    // trial regions too.
    let config = WatermarkConfig {
        key: "tuner-key".to_string(),
        strength: tuned.strength,
        spread_factor: tuned.spread_factor,
        ..WatermarkConfig::default()
    };
    let mut marked = audio;
    sello_core::embed(&mut marked, 1, "TEST", &config).unwrap();
    for s in marked.iter_mut() {
        *s *= 0.75;
    }
    let payload = sello_core::extract(&marked, 1, &config).unwrap();
    assert_eq!(payload.text, "TEST");
}

#[test]
fn tuner_stays_within_grid_bounds_on_short_clip() {
    let sample_rate = 44_100;
    let audio = make_test_audio(sample_rate as usize * 10, sample_rate);

    // Whether the grid accepts or the fallback kicks in, the reported
    // parameters always come from the sanctioned ranges.
    let tuned = sello_core::tune(&audio, 1, sample_rate, "TEST", "tuner-key").unwrap();
    assert!([2048, 4096, 8192, 16384].contains(&tuned.spread_factor));
    assert!(tuned.strength >= 0.02 && tuned.strength <= 0.14);
}

#[test]
fn tuner_falls_back_on_hostile_audio() {
    let sample_rate = 44_100;
    // Quiet enough that the silence floor swallows most chips.
    let audio: Vec<f32> = (0..sample_rate as usize * 12)
        .map(|i| 0.002 * (i as f32 * 0.01).sin())
        .collect();

    let tuned = sello_core::tune(&audio, 1, sample_rate, "TEST", "tuner-key").unwrap();
    assert!(!tuned.validated);
    assert_eq!(tuned.spread_factor, 16384);
}
