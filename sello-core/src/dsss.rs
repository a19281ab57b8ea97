//! Direct-sequence spread-spectrum ownership watermark.
//!
//! The embedder hides the payload frame (see [`crate::bits`]) as low-level
//! additive noise: one ±1 chip per audio frame, each payload bit spread
//! over `spread_factor` consecutive chips. The extractor regenerates the
//! identical chip train from the key and recovers bits by correlation,
//! acquiring alignment from the fixed sync pattern first.

use crate::bits::{self, HEADER_BITS, SYNC_PATTERN};
use crate::chip::ChipGen;
use crate::config::WatermarkConfig;
use crate::error::{Error, Result};
use crate::fft;
use crate::source::SampleSource;

/// −50 dBFS magnitude floor. Samples below this carry no watermark so
/// silence and fades stay bit-exact.
pub const SILENCE_FLOOR: f32 = 0.003;

/// Minimum normalized sync correlation for a candidate offset.
const SYNC_THRESHOLD: f32 = 0.45;

/// Matched-filter peaks kept per sync acquisition pass. The exact
/// correlation check runs only on these.
const MAX_SYNC_CANDIDATES: usize = 32;

/// Decode attempts per extraction pass. The CRC-16 check is the real
/// false-positive filter; the cap only bounds work on noisy audio.
const MAX_DECODE_ATTEMPTS: usize = 5;

/// Adaptive per-sample strength: zero below the silence floor, otherwise
/// quadratic in magnitude so loud passages carry far more watermark
/// energy than quiet ones.
#[inline]
fn adaptive_strength(sample: f32, base: f32) -> f32 {
    let mag = sample.abs();
    if mag < SILENCE_FLOOR {
        0.0
    } else {
        (base * mag * mag).min(1.0)
    }
}

/// Streaming ownership watermark embedder.
///
/// Stateful and strictly sequential: bit/chip counters only advance, so a
/// stream cannot be restarted without a fresh instance. After the last
/// payload bit the embedder passes audio through untouched.
pub struct Embedder {
    strength: f32,
    spread_factor: usize,
    chip: ChipGen,
    payload_bits: Vec<bool>,
    bit_index: usize,
    chips_in_bit: usize,
}

impl Embedder {
    pub fn new(payload: &str, config: &WatermarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            strength: config.strength,
            spread_factor: config.spread_factor as usize,
            chip: ChipGen::new(&config.key),
            payload_bits: bits::encode(payload.as_bytes()),
            bit_index: 0,
            chips_in_bit: 0,
        })
    }

    /// True once every payload bit has been embedded.
    pub fn is_complete(&self) -> bool {
        self.bit_index >= self.payload_bits.len()
    }

    /// Frames still needed to finish the payload.
    pub fn frames_remaining(&self) -> usize {
        if self.is_complete() {
            return 0;
        }
        let bits_left = self.payload_bits.len() - self.bit_index - 1;
        bits_left * self.spread_factor + (self.spread_factor - self.chips_in_bit)
    }

    /// Embed into a chunk of interleaved samples, in place.
    pub fn process(&mut self, samples: &mut [f32], channels: usize) {
        debug_assert!(channels > 0);
        for frame in samples.chunks_mut(channels) {
            if self.is_complete() {
                return;
            }
            let (chip, next) = self.chip.next_chip();
            self.chip = next;

            let bit = if self.payload_bits[self.bit_index] {
                1.0
            } else {
                -1.0
            };
            for sample in frame.iter_mut() {
                let eff = adaptive_strength(*sample, self.strength);
                *sample += eff * chip * bit;
            }

            self.chips_in_bit += 1;
            if self.chips_in_bit == self.spread_factor {
                self.chips_in_bit = 0;
                self.bit_index += 1;
            }
        }
    }
}

/// One-shot embed with an up-front capacity check.
pub fn embed(
    samples: &mut [f32],
    channels: usize,
    payload: &str,
    config: &WatermarkConfig,
) -> Result<()> {
    config.validate()?;
    let num_frames = samples.len() / channels.max(1);
    let needed = config.frames_for_payload(payload);
    if needed > num_frames {
        return Err(Error::PayloadTooLarge {
            needed,
            capacity: num_frames,
        });
    }
    let mut embedder = Embedder::new(payload, config)?;
    embedder.process(samples, channels);
    Ok(())
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPayload {
    pub text: String,
    /// Frame offset where the sync pattern locked.
    pub sync_offset: usize,
    /// Normalized sync correlation at the accepted offset (−1..=1).
    pub sync_correlation: f32,
}

/// Chip train and per-frame channel sums for one stream.
///
/// Bit decisions are windowed dot products `Σ chips[j] · frame_sums[d+j]`
/// where `d` is the candidate alignment between the embedder's first
/// frame and this stream. Chips are indexed from the payload start, not
/// the stream start, so dropping stream history never drops chips.
struct Series {
    chips: Vec<f32>,
    chip_gen: ChipGen,
    frame_sums: Vec<f32>,
}

impl Series {
    fn new(key: &str) -> Self {
        Self {
            chips: Vec::new(),
            chip_gen: ChipGen::new(key),
            frame_sums: Vec::new(),
        }
    }

    fn from_samples(samples: &[f32], channels: usize, key: &str) -> Self {
        let channels = channels.max(1);
        let mut series = Self::new(key);
        series.frame_sums.reserve(samples.len() / channels);
        for frame in samples.chunks_exact(channels) {
            series.frame_sums.push(frame.iter().sum());
        }
        let frames = series.frame_sums.len();
        series.ensure_chips(frames);
        series
    }

    /// Grow the chip train to at least `n` entries. Never shrinks.
    fn ensure_chips(&mut self, n: usize) {
        while self.chips.len() < n {
            let (c, next) = self.chip_gen.next_chip();
            self.chip_gen = next;
            self.chips.push(c);
        }
    }

    /// Discard the oldest `n` frame sums.
    fn drop_prefix(&mut self, n: usize) {
        self.frame_sums.drain(..n);
    }

    fn num_frames(&self) -> usize {
        self.frame_sums.len()
    }

    /// Correlation sum for bit `k` of a payload aligned at frame `d`.
    #[inline]
    fn bit_sum(&self, spread: usize, d: usize, k: usize) -> f64 {
        let start = k * spread;
        let mut acc = 0.0f64;
        for j in start..start + spread {
            acc += (self.chips[j] * self.frame_sums[d + j]) as f64;
        }
        acc
    }

    /// Normalized correlation of the first 16 bit periods at alignment
    /// `d` against the fixed sync pattern. 1.0 = every bit sum has the
    /// expected sign with consistent magnitude.
    fn sync_correlation(&self, spread: usize, d: usize) -> f32 {
        let mut signed = 0.0f64;
        let mut total = 0.0f64;
        for (k, &expected) in SYNC_PATTERN.iter().enumerate() {
            let s = self.bit_sum(spread, d, k);
            signed += if expected { s } else { -s };
            total += s.abs();
        }
        if total <= f64::EPSILON {
            return 0.0;
        }
        (signed / total) as f32
    }

    /// Try a full header + data decode at one candidate alignment.
    ///
    /// A payload that extends past the buffered frames fails with
    /// [`Error::AudioTooShort`] so streaming callers can tell "wait for
    /// more audio" apart from a dead candidate.
    fn decode_at(&self, spread: usize, d: usize) -> Result<String> {
        let num_frames = self.num_frames();
        if d + HEADER_BITS * spread > num_frames {
            return Err(Error::AudioTooShort {
                needed: d + HEADER_BITS * spread,
                got: num_frames,
            });
        }

        let mut header = Vec::with_capacity(HEADER_BITS);
        for k in 0..HEADER_BITS {
            // Zero ties decode as 0.
            header.push(self.bit_sum(spread, d, k) > 0.0);
        }
        let parsed = bits::parse_header(&header)?;

        let data_bits_len = parsed.data_bits as usize;
        let total_bits = HEADER_BITS + data_bits_len;
        if d + total_bits * spread > num_frames {
            return Err(Error::AudioTooShort {
                needed: d + total_bits * spread,
                got: num_frames,
            });
        }

        let mut data_bits = Vec::with_capacity(data_bits_len);
        for k in HEADER_BITS..total_bits {
            data_bits.push(self.bit_sum(spread, d, k) > 0.0);
        }
        let data = bits::decode_data(&data_bits, parsed.crc)?;
        String::from_utf8(data).map_err(|_| Error::NotDetected)
    }
}

/// Shortest stream worth attempting: a full header span.
fn min_extract_frames(spread: usize) -> usize {
    HEADER_BITS * spread
}

/// Sliding sync acquisition over every buffered alignment at or past
/// `from`.
///
/// A single frequency-domain matched filter of the sync-signed chip train
/// against the frame sums scores all alignments at once, so acquisition
/// covers the whole stream rather than a fixed window near its start. The
/// top peaks (normalized by local signal energy) are then re-scored with
/// the exact per-bit sync correlation and gated on [`SYNC_THRESHOLD`].
///
/// Requires `series.chips` grown to at least the sync span.
fn sync_candidates(series: &Series, spread: usize, from: usize) -> Result<Vec<(usize, f32)>> {
    let sync_frames = SYNC_PATTERN.len() * spread;
    let num_frames = series.num_frames();
    if num_frames < sync_frames {
        return Ok(Vec::new());
    }

    let template: Vec<f32> = series.chips[..sync_frames]
        .iter()
        .enumerate()
        .map(|(j, &c)| if SYNC_PATTERN[j / spread] { c } else { -c })
        .collect();
    let scores = fft::cross_correlate(&series.frame_sums, &template)?;

    // Prefix sums of squared frame sums normalize each score by the
    // energy under its window, so loud unwatermarked passages do not
    // outrank the true alignment.
    let mut energy = vec![0.0f64; num_frames + 1];
    for (i, &s) in series.frame_sums.iter().enumerate() {
        energy[i + 1] = energy[i] + (s as f64) * (s as f64);
    }

    let mut top: Vec<(usize, f32)> = Vec::with_capacity(MAX_SYNC_CANDIDATES + 1);
    for (d, &score) in scores.iter().enumerate().skip(from) {
        let window_rms = (energy[d + sync_frames] - energy[d]).sqrt() as f32;
        if window_rms <= f32::EPSILON {
            continue;
        }
        let normalized = score / window_rms;
        if let Some(&(_, weakest)) = top.last() {
            if top.len() == MAX_SYNC_CANDIDATES && normalized <= weakest {
                continue;
            }
        }
        let at = top.partition_point(|&(_, s)| s > normalized);
        top.insert(at, (d, normalized));
        top.truncate(MAX_SYNC_CANDIDATES);
    }

    let mut candidates: Vec<(usize, f32)> = top
        .into_iter()
        .map(|(d, _)| (d, series.sync_correlation(spread, d)))
        .filter(|&(_, corr)| corr > SYNC_THRESHOLD)
        .collect();
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(candidates)
}

fn extract_from_series(series: &Series, config: &WatermarkConfig) -> Result<ExtractedPayload> {
    let spread = config.spread_factor as usize;
    let num_frames = series.num_frames();
    let min_frames = min_extract_frames(spread);
    if num_frames < min_frames {
        return Err(Error::AudioTooShort {
            needed: min_frames,
            got: num_frames,
        });
    }

    // Fast path: embedder-aligned stream, the common file-based case.
    if let Ok(text) = series.decode_at(spread, 0) {
        return Ok(ExtractedPayload {
            text,
            sync_offset: 0,
            sync_correlation: series.sync_correlation(spread, 0),
        });
    }

    for &(d, corr) in sync_candidates(series, spread, 0)?
        .iter()
        .take(MAX_DECODE_ATTEMPTS)
    {
        if let Ok(text) = series.decode_at(spread, d) {
            return Ok(ExtractedPayload {
                text,
                sync_offset: d,
                sync_correlation: corr,
            });
        }
    }

    Err(Error::NotDetected)
}

/// One-shot extraction from a complete buffer.
///
/// Absence of a watermark is an expected outcome ([`Error::NotDetected`]),
/// never a panic; a failed CRC is reported the same way rather than
/// emitting garbage text.
pub fn extract(
    samples: &[f32],
    channels: usize,
    config: &WatermarkConfig,
) -> Result<ExtractedPayload> {
    config.validate()?;
    let series = Series::from_samples(samples, channels, &config.key);
    extract_from_series(&series, config)
}

/// Extraction restricted to embedder alignment (offset 0).
///
/// Much cheaper than [`extract`] since no sliding search runs. Suitable
/// when the caller controls the embed point, e.g. the tuner's in-memory
/// simulations.
pub fn extract_aligned(
    samples: &[f32],
    channels: usize,
    config: &WatermarkConfig,
) -> Result<ExtractedPayload> {
    config.validate()?;
    let series = Series::from_samples(samples, channels, &config.key);
    let spread = config.spread_factor as usize;
    if series.num_frames() < min_extract_frames(spread) {
        return Err(Error::AudioTooShort {
            needed: min_extract_frames(spread),
            got: series.num_frames(),
        });
    }
    let text = series.decode_at(spread, 0)?;
    Ok(ExtractedPayload {
        text,
        sync_offset: 0,
        sync_correlation: series.sync_correlation(spread, 0),
    })
}

/// Streaming extractor: feed arbitrary-length chunks, get the payload at
/// most once.
///
/// Memory stays bounded on long streams: each acquisition pass rules out
/// every alignment whose sync window is fully buffered, and frames behind
/// the search frontier are discarded. History is retained past the
/// frontier only while a sync-locked candidate is still waiting for the
/// rest of its payload, and released as soon as its CRC settles.
pub struct StreamExtractor {
    config: WatermarkConfig,
    channels: usize,
    series: Series,
    frame_accum: f32,
    frame_fill: usize,
    /// Stream frame index of `series.frame_sums[0]`.
    base_frame: usize,
    /// Stream frame index below which every alignment has been ruled out.
    search_frontier: usize,
    /// Sync-locked alignments (stream offset, correlation) whose payload
    /// extends past the buffered frames.
    pending: Vec<(usize, f32)>,
    next_attempt_frames: usize,
    done: bool,
}

impl StreamExtractor {
    pub fn new(config: &WatermarkConfig, channels: usize) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            channels: channels.max(1),
            series: Series::new(&config.key),
            frame_accum: 0.0,
            frame_fill: 0,
            base_frame: 0,
            search_frontier: 0,
            pending: Vec::new(),
            next_attempt_frames: 0,
            done: false,
        })
    }

    /// Push a chunk of interleaved samples. Returns the payload the first
    /// time a complete, CRC-valid watermark has been seen, `None` after.
    pub fn push(&mut self, samples: &[f32]) -> Option<ExtractedPayload> {
        if self.done {
            return None;
        }
        for &s in samples {
            self.frame_accum += s;
            self.frame_fill += 1;
            if self.frame_fill == self.channels {
                self.series.frame_sums.push(self.frame_accum);
                self.frame_accum = 0.0;
                self.frame_fill = 0;
            }
        }

        let spread = self.config.spread_factor as usize;
        let total = self.total_frames();
        // Re-attempt only after a sync pattern's worth of new frames.
        if total < min_extract_frames(spread) || total < self.next_attempt_frames {
            return None;
        }
        self.next_attempt_frames = total + SYNC_PATTERN.len() * spread;
        self.attempt(spread)
    }

    /// Final attempt once the stream has ended. Payloads whose tail
    /// arrived after the last periodic attempt are only decodable here.
    pub fn finish(&mut self) -> Option<ExtractedPayload> {
        if self.done {
            return None;
        }
        let spread = self.config.spread_factor as usize;
        if self.total_frames() < min_extract_frames(spread) {
            return None;
        }
        self.attempt(spread)
    }

    /// Whether the payload has already been delivered.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    fn total_frames(&self) -> usize {
        self.base_frame + self.series.num_frames()
    }

    fn attempt(&mut self, spread: usize) -> Option<ExtractedPayload> {
        let sync_frames = SYNC_PATTERN.len() * spread;
        let retained = self.series.num_frames();
        self.series.ensure_chips(retained.max(sync_frames));

        // Candidates waiting on the rest of their payload come first.
        let mut kept = Vec::with_capacity(self.pending.len());
        for &(offset, corr) in &self.pending {
            match self.series.decode_at(spread, offset - self.base_frame) {
                Ok(text) => {
                    self.done = true;
                    return Some(ExtractedPayload {
                        text,
                        sync_offset: offset,
                        sync_correlation: corr,
                    });
                }
                Err(Error::AudioTooShort { .. }) => kept.push((offset, corr)),
                Err(_) => {}
            }
        }
        self.pending = kept;

        // Fresh alignments whose full sync window is now buffered.
        if retained >= sync_frames {
            let from = self.search_frontier.saturating_sub(self.base_frame);
            let last = retained - sync_frames;
            if from <= last {
                if let Ok(candidates) = sync_candidates(&self.series, spread, from) {
                    for &(d, corr) in candidates.iter().take(MAX_DECODE_ATTEMPTS) {
                        match self.series.decode_at(spread, d) {
                            Ok(text) => {
                                self.done = true;
                                return Some(ExtractedPayload {
                                    text,
                                    sync_offset: self.base_frame + d,
                                    sync_correlation: corr,
                                });
                            }
                            Err(Error::AudioTooShort { .. }) => {
                                self.pending.push((self.base_frame + d, corr));
                            }
                            Err(_) => {}
                        }
                    }
                }
                self.search_frontier = self.base_frame + last + 1;
            }
        }
        if self.pending.len() > MAX_DECODE_ATTEMPTS {
            self.pending
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            self.pending.truncate(MAX_DECODE_ATTEMPTS);
        }

        // Frames behind every live candidate and the frontier are dead.
        let keep_from = self
            .pending
            .iter()
            .map(|&(offset, _)| offset)
            .min()
            .unwrap_or(self.search_frontier)
            .min(self.search_frontier);
        let drop = keep_from.saturating_sub(self.base_frame);
        if drop > 0 {
            self.series.drop_prefix(drop);
            self.base_frame = keep_from;
        }
        None
    }
}

/// Drain a [`SampleSource`] through a [`StreamExtractor`].
///
/// Stops at the first hit; `Ok(None)` means the source ran dry without a
/// CRC-valid watermark.
pub fn extract_from_source<S: SampleSource + ?Sized>(
    source: &mut S,
    config: &WatermarkConfig,
) -> Result<Option<ExtractedPayload>> {
    let mut extractor = StreamExtractor::new(config, source.channels())?;
    let mut buf = vec![0.0f32; 16 * 1024];
    loop {
        let n = source.read(&mut buf);
        if n == 0 {
            return Ok(extractor.finish());
        }
        if let Some(result) = extractor.push(&buf[..n]) {
            return Ok(Some(result));
        }
    }
}
