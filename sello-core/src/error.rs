use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid cipher key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid cipher IV length: expected 12 or 16 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("watermark key must not be empty")]
    EmptyKey,

    #[error("strength {0} out of range (0, 1]")]
    InvalidStrength(f32),

    #[error("spread factor must be non-zero")]
    InvalidSpreadFactor,

    #[error("integrity block size {0} too small: need at least 16 samples")]
    InvalidBlockSize(usize),

    #[error("payload too large: needs {needed} frames, capacity is {capacity}")]
    PayloadTooLarge { needed: usize, capacity: usize },

    #[error("CRC mismatch: expected {expected:#06x}, got {got:#06x}")]
    CrcMismatch { expected: u16, got: u16 },

    #[error("no watermark detected")]
    NotDetected,

    #[error("audio too short: need at least {needed} samples, got {got}")]
    AudioTooShort { needed: usize, got: usize },

    #[error("fingerprint store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("FFT error: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, Error>;
