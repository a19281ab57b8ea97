//! AES-256-CTR stream cipher over raw PCM bytes.
//!
//! The block primitive is driven as a keystream generator the same way
//! the watermark key material is expanded: encrypt a counter block,
//! XOR the result with the data. Sample count is preserved exactly, and
//! CTR's random access makes `seek` equivalent to sequential processing.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::error::{Error, Result};

const BLOCK_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Stream cipher state for one PCM stream.
///
/// Single-threaded and stateful; one instance per stream, never shared.
pub struct PcmCipher {
    cipher: Aes256,
    nonce: [u8; NONCE_LEN],
    /// Counter of the next keystream block to generate.
    counter: u32,
    initial_counter: u32,
    keystream: [u8; BLOCK_LEN],
    /// Cursor into `keystream`; always in [0, 16].
    ks_index: usize,
}

impl PcmCipher {
    /// Create a cipher from a 32-byte key and a 12- or 16-byte IV.
    ///
    /// A 16-byte IV carries an explicit big-endian initial counter in its
    /// last four bytes; a 12-byte IV starts the counter at zero. Wrong
    /// lengths fail here, before any data could be silently corrupted.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::InvalidKeyLength(key.len()));
        }
        let (nonce, initial_counter) = match iv.len() {
            12 => {
                let mut n = [0u8; NONCE_LEN];
                n.copy_from_slice(iv);
                (n, 0u32)
            }
            16 => {
                let mut n = [0u8; NONCE_LEN];
                n.copy_from_slice(&iv[..NONCE_LEN]);
                let counter = u32::from_be_bytes([iv[12], iv[13], iv[14], iv[15]]);
                (n, counter)
            }
            other => return Err(Error::InvalidIvLength(other)),
        };
        let cipher = Aes256::new_from_slice(key).expect("key length already validated");

        let mut this = Self {
            cipher,
            nonce,
            counter: initial_counter,
            initial_counter,
            keystream: [0u8; BLOCK_LEN],
            ks_index: 0,
        };
        this.refill();
        Ok(this)
    }

    /// Generate the keystream block for the current counter, then advance
    /// the counter (wrapping on overflow — defined CTR behavior).
    fn refill(&mut self) {
        let mut block = [0u8; BLOCK_LEN];
        block[..NONCE_LEN].copy_from_slice(&self.nonce);
        block[NONCE_LEN..].copy_from_slice(&self.counter.to_be_bytes());
        let mut block = aes::Block::from(block);
        self.cipher.encrypt_block(&mut block);
        self.keystream = block.into();
        self.ks_index = 0;
        self.counter = self.counter.wrapping_add(1);
    }

    /// Reposition to an absolute byte offset in the stream.
    ///
    /// Output after a seek is byte-identical to sequential processing
    /// from the start.
    pub fn seek(&mut self, byte_offset: u64) {
        let block_index = byte_offset / BLOCK_LEN as u64;
        self.counter = self.initial_counter.wrapping_add(block_index as u32);
        self.refill();
        self.ks_index = (byte_offset % BLOCK_LEN as u64) as usize;
    }

    /// Reposition to an absolute sample offset (4 bytes per f32 sample).
    pub fn seek_to_sample(&mut self, sample_offset: u64) {
        self.seek(sample_offset * 4);
    }

    /// XOR the keystream into `data` in place. Same call encrypts and
    /// decrypts.
    pub fn process_bytes(&mut self, data: &mut [u8]) {
        let mut i = 0;
        while i < data.len() {
            if self.ks_index == BLOCK_LEN {
                self.refill();
            }
            // 16-byte lane fast path, only available on block alignment.
            if self.ks_index == 0 && data.len() - i >= BLOCK_LEN {
                let lane: [u8; BLOCK_LEN] = data[i..i + BLOCK_LEN].try_into().expect("lane is 16 bytes");
                let mixed = u128::from_ne_bytes(lane) ^ u128::from_ne_bytes(self.keystream);
                data[i..i + BLOCK_LEN].copy_from_slice(&mixed.to_ne_bytes());
                self.ks_index = BLOCK_LEN;
                i += BLOCK_LEN;
                continue;
            }
            // Scalar fallback for partial lanes; numerically identical.
            data[i] ^= self.keystream[self.ks_index];
            self.ks_index += 1;
            i += 1;
        }
    }

    /// Encrypt/decrypt f32 samples in place, preserving sample count.
    pub fn process_samples(&mut self, samples: &mut [f32]) {
        // Batch through a fixed scratch buffer to keep the lane path hot.
        const SCRATCH_SAMPLES: usize = 256;
        let mut scratch = [0u8; SCRATCH_SAMPLES * 4];
        for chunk in samples.chunks_mut(SCRATCH_SAMPLES) {
            let bytes = &mut scratch[..chunk.len() * 4];
            for (i, &s) in chunk.iter().enumerate() {
                bytes[i * 4..i * 4 + 4].copy_from_slice(&s.to_le_bytes());
            }
            self.process_bytes(bytes);
            for (i, s) in chunk.iter_mut().enumerate() {
                *s = f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().expect("4-byte sample"));
            }
        }
    }
}
