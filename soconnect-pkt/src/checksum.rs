//! RFC 1071 checksum utilities.
//!
//! The computing functions are taken directly from smol-tcp, the same way
//! the teacher crate's `checksum_utils` module took them.

use byteorder::{ByteOrder, NetworkEndian};

/// Compute an RFC 1071 compliant checksum (without the final complement).
pub fn from_slice(mut data: &[u8]) -> u16 {
    let mut accum: u32 = 0;

    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        data = &data[CHUNK_SIZE..];
    }

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Fold a one's-complement sum into the final on-wire checksum (complement,
/// with the RFC 768 special case that an all-zero UDP checksum means
/// "checksum not computed" and must be replaced with `0xffff`).
pub fn finish(sum: u16) -> u16 {
    let complement = !sum;
    if complement == 0 {
        0xffff
    } else {
        complement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_buffer_checksum_is_zero() {
        assert_eq!(from_slice(&[0u8; 20]), 0);
    }

    #[test]
    fn combine_matches_manual_fold() {
        let a = from_slice(&[0x45, 0x00, 0x00, 0x3c]);
        let b = from_slice(&[0x1c, 0x46, 0x40, 0x00]);
        let combined = combine(&[a, b]);
        let direct = from_slice(&[0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00]);
        assert_eq!(combined, direct);
    }
}
