use crate::error::{Error, Result};

/// Fixed 16-bit acquisition pattern, identical across all payloads.
pub const SYNC_PATTERN: [bool; 16] = [
    true, false, true, false, true, false, true, false, // 10101010
    true, true, false, false, true, true, false, false, // 11001100
];

/// Sync bits.
pub const SYNC_BITS: usize = 16;
/// CRC-16 bits.
pub const CRC_BITS: usize = 16;
/// Length field bits (data bit count).
pub const LENGTH_BITS: usize = 32;
/// Header = sync + crc + length.
pub const HEADER_BITS: usize = SYNC_BITS + CRC_BITS + LENGTH_BITS;

/// Largest accepted data field. Anything bigger than this in a decoded
/// length field is treated as corruption rather than attempted.
pub const MAX_DATA_BITS: usize = 64 * 1024 * 8;

/// Total bits in the frame carrying a payload of `data_len` bytes.
pub fn payload_bits(data_len: usize) -> usize {
    HEADER_BITS + data_len * 8
}

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn push_bits_msb(bits: &mut Vec<bool>, value: u32, count: usize) {
    for j in (0..count).rev() {
        bits.push((value >> j) & 1 == 1);
    }
}

fn read_bits_msb(bits: &[bool]) -> u32 {
    let mut value = 0u32;
    for &bit in bits {
        value = (value << 1) | (bit as u32);
    }
    value
}

/// Encode a payload into the self-describing bit frame:
/// `sync(16) | crc16(16) | length(32, data bit count) | data bits`.
/// Data bits are the payload bytes MSB-first.
pub fn encode(data: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(payload_bits(data.len()));
    bits.extend_from_slice(&SYNC_PATTERN);
    push_bits_msb(&mut bits, crc16(data) as u32, CRC_BITS);
    push_bits_msb(&mut bits, (data.len() * 8) as u32, LENGTH_BITS);
    for &byte in data {
        push_bits_msb(&mut bits, byte as u32, 8);
    }
    bits
}

/// Header fields recovered ahead of the data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub crc: u16,
    pub data_bits: u32,
}

/// Parse the CRC and length fields from the first `HEADER_BITS` bits.
///
/// The sync bits are not re-checked here: acquisition already matched
/// them by correlation, and the CRC is the real arbiter. A length that
/// is not byte-aligned or exceeds [`MAX_DATA_BITS`] is rejected; zero is
/// a valid length since an empty payload is still CRC-protected.
pub fn parse_header(bits: &[bool]) -> Result<Header> {
    if bits.len() < HEADER_BITS {
        return Err(Error::NotDetected);
    }
    let crc = read_bits_msb(&bits[SYNC_BITS..SYNC_BITS + CRC_BITS]) as u16;
    let data_bits = read_bits_msb(&bits[SYNC_BITS + CRC_BITS..HEADER_BITS]);
    if data_bits as usize > MAX_DATA_BITS || data_bits % 8 != 0 {
        return Err(Error::NotDetected);
    }
    Ok(Header { crc, data_bits })
}

/// Reassemble data bytes from data bits and verify them against the
/// header CRC.
pub fn decode_data(data_bits: &[bool], expected_crc: u16) -> Result<Vec<u8>> {
    let mut data = vec![0u8; data_bits.len() / 8];
    for (i, &bit) in data_bits.iter().enumerate() {
        if bit {
            data[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    let got = crc16(&data);
    if got != expected_crc {
        return Err(Error::CrcMismatch {
            expected: expected_crc,
            got,
        });
    }
    Ok(data)
}
