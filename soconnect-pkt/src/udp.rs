//! UDP header (RFC 768). Hand-written directly in the teacher's idiom for
//! its one hand-written protocol header (`rpkt/src/udp/header.rs`) rather
//! than generated from a header spec, since SoConnect has no header-codegen
//! pipeline of its own.

use crate::checksum;
use crate::netbytes::{read_u16, write_u16};

pub const UDP_HEADER_LEN: usize = 8;

pub const UDP_HEADER_TEMPLATE: UdpHeader<[u8; UDP_HEADER_LEN]> =
    UdpHeader { buf: [0u8; UDP_HEADER_LEN] };

#[derive(Clone, Copy, Debug)]
pub struct UdpHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> UdpHeader<T> {
    #[inline]
    pub fn new(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= UDP_HEADER_LEN {
            Ok(Self { buf })
        } else {
            Err(buf)
        }
    }

    #[inline]
    pub fn new_unchecked(buf: T) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[..UDP_HEADER_LEN]
    }

    #[inline]
    pub fn src_port(&self) -> u16 {
        read_u16(&self.buf.as_ref()[0..2])
    }

    #[inline]
    pub fn dst_port(&self) -> u16 {
        read_u16(&self.buf.as_ref()[2..4])
    }

    #[inline]
    pub fn packet_len(&self) -> u16 {
        read_u16(&self.buf.as_ref()[4..6])
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        read_u16(&self.buf.as_ref()[6..8])
    }
}

impl<T: AsMut<[u8]>> UdpHeader<T> {
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[0..2], value);
    }

    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[2..4], value);
    }

    #[inline]
    pub fn set_packet_len(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[4..6], value);
    }

    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[6..8], value);
    }
}

/// Build the IPv4 pseudo-header checksum partial sum (RFC 768).
pub fn ipv4_pseudo_header_sum(src_addr: u32, dst_addr: u32, udp_len: u16) -> u16 {
    let mut buf = [0u8; 12];
    buf[0..4].copy_from_slice(&src_addr.to_be_bytes());
    buf[4..8].copy_from_slice(&dst_addr.to_be_bytes());
    buf[8] = 0;
    buf[9] = crate::ipv4::PROTO_UDP;
    buf[10..12].copy_from_slice(&udp_len.to_be_bytes());
    checksum::from_slice(&buf)
}

impl UdpHeader<[u8; UDP_HEADER_LEN]> {
    /// Recompute and store the UDP checksum over the header, the IPv4
    /// pseudo-header and the payload.
    pub fn compute_and_set_checksum_v4(&mut self, src_addr: u32, dst_addr: u32, payload: &[u8]) {
        self.set_checksum(0);
        let pseudo = ipv4_pseudo_header_sum(src_addr, dst_addr, self.packet_len());
        let header_sum = checksum::from_slice(self.as_bytes());
        let payload_sum = checksum::from_slice(payload);
        let sum = checksum::combine(&[pseudo, header_sum, payload_sum]);
        self.set_checksum(checksum::finish(sum));
    }
}

impl<T: AsRef<[u8]>> UdpHeader<T> {
    /// Re-fold the pseudo-header, header (including its stored checksum)
    /// and payload; a correctly checksummed datagram folds to `0xffff`
    /// (spec testable property #4).
    pub fn verify_checksum_v4(&self, src_addr: u32, dst_addr: u32, payload: &[u8]) -> bool {
        let pseudo = ipv4_pseudo_header_sum(src_addr, dst_addr, self.packet_len());
        let header_sum = checksum::from_slice(self.as_bytes());
        let payload_sum = checksum::from_slice(payload);
        checksum::combine(&[pseudo, header_sum, payload_sum]) == 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_fields() {
        let mut buf = UDP_HEADER_TEMPLATE;
        buf.set_src_port(53);
        buf.set_dst_port(9000);
        buf.set_packet_len(42);
        assert_eq!(buf.src_port(), 53);
        assert_eq!(buf.dst_port(), 9000);
        assert_eq!(buf.packet_len(), 42);
    }
}
