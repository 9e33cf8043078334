//! Small helpers for reading/writing network-byte-order fields, in the style
//! of the `byteorder` crate's `NetworkEndian`.

use byteorder::{ByteOrder, NetworkEndian};

#[inline]
pub fn read_u16(buf: &[u8]) -> u16 {
    NetworkEndian::read_u16(buf)
}

#[inline]
pub fn write_u16(buf: &mut [u8], value: u16) {
    NetworkEndian::write_u16(buf, value)
}

#[inline]
pub fn read_u32(buf: &[u8]) -> u32 {
    NetworkEndian::read_u32(buf)
}

#[inline]
pub fn write_u32(buf: &mut [u8], value: u32) {
    NetworkEndian::write_u32(buf, value)
}

#[inline]
pub fn read_u128(buf: &[u8]) -> u128 {
    NetworkEndian::read_u128(buf)
}

#[inline]
pub fn write_u128(buf: &mut [u8], value: u128) {
    NetworkEndian::write_u128(buf, value)
}

#[inline]
pub fn read_u48(buf: &[u8]) -> u64 {
    NetworkEndian::read_uint(buf, 6)
}

#[inline]
pub fn write_u48(buf: &mut [u8], value: u64) {
    NetworkEndian::write_uint(buf, value, 6)
}
