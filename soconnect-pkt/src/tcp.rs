//! TCP header (RFC 9293), fixed 20-byte form (no options — SoConnect never
//! generates or expects TCP options).

use crate::netbytes::{read_u16, read_u32, write_u16, write_u32};

pub const TCP_HEADER_LEN: usize = 20;
pub const TCP_DEFAULT_DATA_OFFSET: u8 = 5;

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_SYN: u8 = 0x02;
pub const FLAG_RST: u8 = 0x04;
pub const FLAG_PSH: u8 = 0x08;
pub const FLAG_ACK: u8 = 0x10;

pub const TCP_HEADER_TEMPLATE: TcpHeader<[u8; TCP_HEADER_LEN]> = TcpHeader {
    buf: [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        TCP_DEFAULT_DATA_OFFSET << 4, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ],
};

#[derive(Clone, Copy, Debug)]
pub struct TcpHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> TcpHeader<T> {
    #[inline]
    pub fn new(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() >= TCP_HEADER_LEN {
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
        &self.buf.as_ref()[..TCP_HEADER_LEN]
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
    pub fn seq_num(&self) -> u32 {
        read_u32(&self.buf.as_ref()[4..8])
    }

    #[inline]
    pub fn ack_num(&self) -> u32 {
        read_u32(&self.buf.as_ref()[8..12])
    }

    #[inline]
    pub fn data_offset(&self) -> u8 {
        (self.buf.as_ref()[12] >> 4) & 0x0f
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.buf.as_ref()[13]
    }

    #[inline]
    pub fn window_size(&self) -> u16 {
        read_u16(&self.buf.as_ref()[14..16])
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        read_u16(&self.buf.as_ref()[16..18])
    }
}

impl<T: AsMut<[u8]>> TcpHeader<T> {
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[0..2], value);
    }

    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[2..4], value);
    }

    #[inline]
    pub fn set_seq_num(&mut self, value: u32) {
        write_u32(&mut self.buf.as_mut()[4..8], value);
    }

    #[inline]
    pub fn set_ack_num(&mut self, value: u32) {
        write_u32(&mut self.buf.as_mut()[8..12], value);
    }

    #[inline]
    pub fn set_data_offset(&mut self, value: u8) {
        let b = &mut self.buf.as_mut()[12];
        *b = (value << 4) | (*b & 0x0f);
    }

    #[inline]
    pub fn set_flags(&mut self, value: u8) {
        self.buf.as_mut()[13] = value;
    }

    #[inline]
    pub fn set_window_size(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[14..16], value);
    }

    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        write_u16(&mut self.buf.as_mut()[16..18], value);
    }
}
