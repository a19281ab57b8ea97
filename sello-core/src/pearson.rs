//! 8-bit Pearson hashing for block tamper detection.
//!
//! Order-sensitive and cheap enough to run inline with sample streaming.
//! The permutation table is the classic one from Pearson's paper; the
//! only requirement is that it is a fixed permutation of 0..=255 shared
//! by embedder and verifier.

/// Pearson permutation table.
pub const TABLE: [u8; 256] = [
    98, 6, 85, 150, 36, 23, 112, 164, 135, 207, 169, 5, 26, 64, 165, 219, //
    61, 20, 68, 89, 130, 63, 52, 102, 24, 229, 132, 245, 80, 216, 195, 115, //
    90, 168, 156, 203, 177, 120, 2, 190, 188, 7, 100, 185, 174, 243, 162, 10, //
    237, 18, 253, 225, 8, 208, 172, 244, 255, 126, 101, 79, 145, 235, 228, 121, //
    123, 251, 67, 250, 161, 0, 107, 97, 241, 111, 181, 82, 249, 33, 69, 55, //
    59, 153, 29, 9, 213, 167, 84, 93, 30, 46, 94, 75, 151, 114, 73, 222, //
    197, 96, 210, 45, 16, 227, 248, 202, 51, 152, 252, 125, 81, 206, 215, 186, //
    39, 158, 178, 187, 131, 136, 1, 49, 50, 17, 141, 91, 47, 129, 60, 99, //
    154, 35, 86, 171, 105, 34, 38, 200, 147, 58, 77, 118, 173, 246, 76, 254, //
    133, 232, 196, 144, 198, 124, 53, 4, 108, 74, 223, 234, 134, 230, 157, 139, //
    189, 205, 199, 128, 176, 19, 211, 236, 127, 192, 231, 70, 233, 88, 146, 44, //
    183, 201, 22, 83, 13, 214, 116, 109, 159, 32, 95, 226, 140, 220, 57, 12, //
    221, 31, 209, 182, 143, 92, 149, 184, 148, 62, 113, 65, 37, 27, 106, 166, //
    3, 14, 204, 72, 21, 41, 56, 66, 28, 193, 40, 217, 25, 54, 179, 117, //
    238, 87, 240, 155, 180, 170, 242, 212, 191, 163, 78, 218, 137, 194, 175, 110, //
    43, 119, 224, 71, 122, 142, 42, 160, 104, 48, 247, 103, 15, 11, 138, 239,
];

/// Incremental Pearson hash over a byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonHasher {
    state: u8,
}

impl PearsonHasher {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    pub fn update_byte(&mut self, byte: u8) {
        self.state = TABLE[(self.state ^ byte) as usize];
    }

    /// Feed a sample's raw bit pattern, little-endian.
    pub fn update_sample(&mut self, sample: f32) {
        for byte in sample.to_bits().to_le_bytes() {
            self.update_byte(byte);
        }
    }

    pub fn finish(&self) -> u8 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }
}

/// One-shot hash of a block of samples.
pub fn hash_block(samples: &[f32]) -> u8 {
    let mut hasher = PearsonHasher::new();
    for &s in samples {
        hasher.update_sample(s);
    }
    hasher.finish()
}
