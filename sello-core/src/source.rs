//! Pull-based PCM sources for streaming pipelines.

/// A source of interleaved f32 PCM.
///
/// Decoders, capture devices, and in-memory buffers all present the
/// same pull interface, so streaming embed/extract loops do not care
/// where samples come from.
pub trait SampleSource {
    /// Fill `buf` with interleaved samples. Returns the number of
    /// samples written; 0 means end of stream.
    fn read(&mut self, buf: &mut [f32]) -> usize;

    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Jump to an absolute interleaved-sample position. Returns false
    /// for sources that cannot seek; the default cannot.
    fn seek(&mut self, _sample_offset: u64) -> bool {
        false
    }
}

/// A seekable source over an owned buffer.
pub struct MemorySource {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl SampleSource for MemorySource {
    fn read(&mut self, buf: &mut [f32]) -> usize {
        let remaining = self.samples.len() - self.position;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        n
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn seek(&mut self, sample_offset: u64) -> bool {
        let target = sample_offset as usize;
        if target > self.samples.len() {
            return false;
        }
        self.position = target;
        true
    }
}
