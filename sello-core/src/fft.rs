use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Sliding dot products of `template` against `signal`.
///
/// Returns one score per alignment `d` in `0..=signal.len() - template.len()`,
/// where `score[d] = Σ template[j] · signal[d + j]`. Computed in the
/// frequency domain, so a template can be matched against minutes of audio
/// in a single pass.
pub fn cross_correlate(signal: &[f32], template: &[f32]) -> Result<Vec<f32>> {
    if template.is_empty() || template.len() > signal.len() {
        return Err(Error::Fft(format!(
            "template length {} unusable against signal length {}",
            template.len(),
            signal.len()
        )));
    }
    let len = signal.len().next_power_of_two();
    let mut planner = RealFftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(len);
    let inverse = planner.plan_fft_inverse(len);

    let mut padded = vec![0.0f32; len];
    padded[..signal.len()].copy_from_slice(signal);
    let mut signal_spec = forward.make_output_vec();
    forward
        .process(&mut padded, &mut signal_spec)
        .map_err(|e| Error::Fft(e.to_string()))?;

    padded.fill(0.0);
    padded[..template.len()].copy_from_slice(template);
    let mut template_spec = forward.make_output_vec();
    forward
        .process(&mut padded, &mut template_spec)
        .map_err(|e| Error::Fft(e.to_string()))?;

    for (s, t) in signal_spec.iter_mut().zip(&template_spec) {
        *s *= t.conj();
    }
    // DC and Nyquist bins of a real correlation are real; the inverse
    // transform rejects residual imaginary parts there.
    signal_spec[0].im = 0.0;
    if let Some(last) = signal_spec.last_mut() {
        last.im = 0.0;
    }

    let mut scores = inverse.make_output_vec();
    inverse
        .process(&mut signal_spec, &mut scores)
        .map_err(|e| Error::Fft(e.to_string()))?;

    let scale = 1.0 / len as f32;
    scores.truncate(signal.len() - template.len() + 1);
    for s in scores.iter_mut() {
        *s *= scale;
    }
    Ok(scores)
}

/// Pre-allocated forward FFT for spectral analysis at a fixed frame size.
///
/// Fingerprinting only inspects magnitudes, so there is no inverse path;
/// the window and all scratch buffers are allocated once at construction.
pub struct SpectrumAnalyzer {
    frame_size: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    windowed: Vec<f32>,
    freq_buf: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyzer {
    /// Frame size must be even and > 0.
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 || frame_size % 2 != 0 {
            return Err(Error::Fft(format!("invalid frame size {frame_size}")));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(frame_size);

        let freq_buf = forward.make_output_vec();
        let scratch = forward.make_scratch_vec();

        Ok(Self {
            frame_size,
            forward,
            window: hann_window(frame_size),
            windowed: vec![0.0; frame_size],
            freq_buf,
            scratch,
        })
    }

    /// Number of complex frequency bins (frame_size/2 + 1).
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Window a frame with Hann and transform it.
    ///
    /// `frame` must have exactly `frame_size` samples. Returns the
    /// complex bins, valid until the next call.
    pub fn analyze(&mut self, frame: &[f32]) -> Result<&[Complex32]> {
        if frame.len() != self.frame_size {
            return Err(Error::Fft(format!(
                "expected {} samples, got {}",
                self.frame_size,
                frame.len()
            )));
        }
        for (out, (&s, &w)) in self.windowed.iter_mut().zip(frame.iter().zip(&self.window)) {
            *out = s * w;
        }
        self.forward
            .process_with_scratch(&mut self.windowed, &mut self.freq_buf, &mut self.scratch)
            .map_err(|e| Error::Fft(e.to_string()))?;
        Ok(&self.freq_buf)
    }

    /// Like `analyze`, but writes bin magnitudes into `out`.
    /// `out` must have `num_bins()` elements.
    pub fn magnitudes(&mut self, frame: &[f32], out: &mut [f32]) -> Result<()> {
        let bins = self.analyze(frame)?;
        debug_assert_eq!(out.len(), bins.len());
        for (m, bin) in out.iter_mut().zip(bins) {
            *m = bin.norm();
        }
        Ok(())
    }
}

/// Periodic Hann window of the given size.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let size = 1024;
        let mut analyzer = SpectrumAnalyzer::new(size).unwrap();

        // Exactly 32 cycles across the frame lands on bin 32.
        let frame: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * 32.0 * i as f32 / size as f32).sin())
            .collect();

        let mut mags = vec![0.0f32; analyzer.num_bins()];
        analyzer.magnitudes(&frame, &mut mags).unwrap();

        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn num_bins_correct() {
        let analyzer = SpectrumAnalyzer::new(1024).unwrap();
        assert_eq!(analyzer.num_bins(), 513);
    }

    #[test]
    fn wrong_frame_size_rejected() {
        let mut analyzer = SpectrumAnalyzer::new(1024).unwrap();
        assert!(analyzer.analyze(&[0.0f32; 512]).is_err());
        assert!(SpectrumAnalyzer::new(1023).is_err());
        assert!(SpectrumAnalyzer::new(0).is_err());
    }

    #[test]
    fn hann_window_endpoints_and_peak() {
        let w = hann_window(1024);
        assert!(w[0].abs() < 1e-6);
        assert!((w[512] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cross_correlation_matches_direct_products() {
        let signal = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let template = [1.0f32, 0.0, 2.0];
        let scores = cross_correlate(&signal, &template).unwrap();
        assert_eq!(scores.len(), 3);
        for (d, &score) in scores.iter().enumerate() {
            let direct: f32 = template
                .iter()
                .enumerate()
                .map(|(j, &t)| t * signal[d + j])
                .sum();
            assert!((score - direct).abs() < 1e-4);
        }
    }

    #[test]
    fn cross_correlation_rejects_oversized_template() {
        assert!(cross_correlate(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(cross_correlate(&[1.0, 2.0], &[]).is_err());
    }
}
