//! Ethernet II header.

use crate::netbytes::{read_u16, write_u16};

pub const ETHER_HEADER_LEN: usize = 14;
pub const ETHER_ADDR_LEN: usize = 6;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

pub const ETHER_HEADER_TEMPLATE: EtherHeader<[u8; ETHER_HEADER_LEN]> =
    EtherHeader { buf: [0u8; ETHER_HEADER_LEN] };

#[derive(Clone, Copy, Debug)]
pub struct EtherHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> EtherHeader<T> {
    #[inline]
    pub fn new(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= ETHER_HEADER_LEN {
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
        &self.buf.as_ref()[..ETHER_HEADER_LEN]
    }

    #[inline]
    pub fn dst_addr(&self) -> [u8; ETHER_ADDR_LEN] {
        self.buf.as_ref()[0..6].try_into().unwrap()
    }

    #[inline]
    pub fn src_addr(&self) -> [u8; ETHER_ADDR_LEN] {
        self.buf.as_ref()[6..12].try_into().unwrap()
    }

    #[inline]
    pub fn ethertype(&self) -> u16 {
        read_u16(&self.buf.as_ref()[12..14])
    }
}

impl<T: AsMut<[u8]>> EtherHeader<T> {
    #[inline]
    pub fn set_dst_addr(&mut self, value: [u8; ETHER_ADDR_LEN]) {
        self.buf.as_mut()[0..6].copy_from_slice(&value);
    }

    #[inline]
    pub fn set_src_addr(&mut self, value: [u8; ETHER_ADDR_LEN]) {
        self.buf.as_mut()[6..12].copy_from_slice(&value);
    }

    #[inline]
    pub fn set_ethertype(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[12..14], value);
    }
}

/// Render a MAC address as `XX:XX:XX:XX:XX:XX`.
///
/// Used both for log messages and for round-tripping the `port_mac`
/// configuration key (spec §6).
pub fn format_mac(mac: [u8; ETHER_ADDR_LEN]) -> alloc::string::String {
    use alloc::format;
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Parse a MAC address formatted as `XX:XX:XX:XX:XX:XX`.
pub fn parse_mac(s: &str) -> crate::Result<[u8; ETHER_ADDR_LEN]> {
    let mut mac = [0u8; ETHER_ADDR_LEN];
    let mut parts = s.split(':');
    for slot in mac.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| crate::Error::invalid_value("malformed mac address"))?;
        *slot = u8::from_str_radix(part, 16)
            .map_err(|_| crate::Error::invalid_value("malformed mac address byte"))?;
    }
    if parts.next().is_some() {
        return Err(crate::Error::invalid_value("malformed mac address length"));
    }
    Ok(mac)
}
