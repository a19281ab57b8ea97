use criterion::{Criterion, black_box, criterion_group, criterion_main};

use sello_core::{FingerprintConfig, PcmCipher, WatermarkConfig};

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

fn bench_config() -> WatermarkConfig {
    WatermarkConfig {
        key: "bench-key".to_string(),
        strength: 0.6,
        spread_factor: 2048,
        ..WatermarkConfig::default()
    }
}

fn bench_embed(c: &mut Criterion) {
    let config = bench_config();
    let audio = make_test_audio(44_100 * 10, 44_100);

    c.bench_function("embed_10s_44khz", |b| {
        b.iter(|| {
            let mut samples = audio.clone();
            sello_core::embed(black_box(&mut samples), 1, "bench payload", &config).unwrap();
        });
    });
}

fn bench_extract(c: &mut Criterion) {
    let config = bench_config();
    let mut audio = make_test_audio(44_100 * 10, 44_100);
    sello_core::embed(&mut audio, 1, "bench payload", &config).unwrap();

    c.bench_function("extract_10s_44khz", |b| {
        b.iter(|| {
            sello_core::extract(black_box(&audio), 1, &config).unwrap();
        });
    });
}

fn bench_seal_verify(c: &mut Criterion) {
    let config = WatermarkConfig::default();
    let audio = make_test_audio(44_100 * 10, 44_100);

    c.bench_function("seal_10s_44khz", |b| {
        b.iter(|| {
            let mut samples = audio.clone();
            sello_core::seal(black_box(&mut samples), &config).unwrap();
        });
    });

    let mut sealed = audio;
    sello_core::seal(&mut sealed, &config).unwrap();
    c.bench_function("verify_10s_44khz", |b| {
        b.iter(|| {
            sello_core::verify(black_box(&sealed), &config).unwrap();
        });
    });
}

fn bench_cipher(c: &mut Criterion) {
    let key = [42u8; 32];
    let iv = [7u8; 12];
    let audio = make_test_audio(44_100 * 10, 44_100);

    c.bench_function("encrypt_10s_44khz", |b| {
        b.iter(|| {
            let mut samples = audio.clone();
            let mut cipher = PcmCipher::new(&key, &iv).unwrap();
            cipher.process_samples(black_box(&mut samples));
            black_box(samples);
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let config = FingerprintConfig::default();
    let audio = make_test_audio(44_100 * 10, 44_100);

    c.bench_function("fingerprint_10s_44khz", |b| {
        b.iter(|| {
            sello_core::fingerprint(black_box(&audio), 1, 44_100, "bench", &config).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_embed,
    bench_extract,
    bench_seal_verify,
    bench_cipher,
    bench_fingerprint,
);

criterion_main!(benches);
