//! Wire-format latency instrumentation table embedded at the front of a
//! generated UDP/TCP/SCTP payload (spec §3/§4.7/§6).
//!
//! Layout: a 17-byte header (1-byte tag, 1-byte written bitmap, 7 bytes
//! reserved/zeroed, 8-byte sequence number) followed by up to four 8-byte
//! slots, each carrying a 48-bit nanosecond timestamp right-aligned in the
//! low 48 bits with the top 16 bits zeroed. `Half` uses two slots
//! (client-send, server-recv); `Full` uses four (client-send, server-recv,
//! server-send, client-recv). Once a slot's bitmap bit is set it is never
//! rewritten.

use crate::netbytes::{read_u48, write_u48};

pub const TSTABLE_HEADER_LEN: usize = 17;
pub const TSTABLE_SLOT_LEN: usize = 8;

pub const TSTABLE_HALF_LEN: usize = TSTABLE_HEADER_LEN + 2 * TSTABLE_SLOT_LEN;
pub const TSTABLE_FULL_LEN: usize = TSTABLE_HEADER_LEN + 4 * TSTABLE_SLOT_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TsTag {
    Half = 0,
    Full = 1,
}

impl TsTag {
    fn nb_slots(self) -> usize {
        match self {
            TsTag::Half => 2,
            TsTag::Full => 4,
        }
    }

    pub fn wire_len(self) -> usize {
        TSTABLE_HEADER_LEN + self.nb_slots() * TSTABLE_SLOT_LEN
    }

    fn from_u8(value: u8) -> crate::Result<Self> {
        match value {
            0 => Ok(TsTag::Half),
            1 => Ok(TsTag::Full),
            other => Err(crate::Error::invalid_value(alloc::format!(
                "unknown TsTable tag byte {other}"
            ))),
        }
    }
}

/// Slot indices within a `Full` table. A `Half` table only ever uses
/// `ClientSend` and `ServerRecv`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TsSlot {
    ClientSend = 0,
    ServerRecv = 1,
    ServerSend = 2,
    ClientRecv = 3,
}

pub struct TsTable<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> TsTable<T> {
    pub fn parse(buf: T) -> crate::Result<Self> {
        let tag = TsTag::from_u8(buf.as_ref()[0])?;
        if buf.as_ref().len() < tag.wire_len() {
            return Err(crate::Error::invalid_value("TsTable buffer too short"));
        }
        Ok(Self { buf })
    }

    #[inline]
    pub fn new_unchecked(buf: T) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn tag(&self) -> TsTag {
        TsTag::from_u8(self.buf.as_ref()[0]).unwrap_or(TsTag::Half)
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        u64::from_be_bytes(self.buf.as_ref()[9..17].try_into().unwrap())
    }

    #[inline]
    fn written_mask(&self) -> u8 {
        self.buf.as_ref()[1]
    }

    pub fn is_written(&self, slot: TsSlot) -> bool {
        self.written_mask() & (1 << (slot as u8)) != 0
    }

    pub fn get(&self, slot: TsSlot) -> Option<u64> {
        if !self.is_written(slot) {
            return None;
        }
        let offset = TSTABLE_HEADER_LEN + (slot as usize) * TSTABLE_SLOT_LEN;
        Some(read_u48(&self.buf.as_ref()[offset..offset + TSTABLE_SLOT_LEN]))
    }

    pub fn wire_len(&self) -> usize {
        self.tag().wire_len()
    }

    /// True only once every slot the tag defines has been written.
    pub fn is_complete(&self) -> bool {
        let expected = match self.tag() {
            TsTag::Half => 0b0011,
            TsTag::Full => 0b1111,
        };
        self.written_mask() & expected == expected
    }
}

impl<T: AsMut<[u8]> + AsRef<[u8]>> TsTable<T> {
    /// Initialize a fresh table in `buf`, zeroing the written bitmap.
    pub fn init(mut buf: T, tag: TsTag, sequence: u64) -> Self {
        {
            let raw = buf.as_mut();
            raw[0] = tag as u8;
            raw[1] = 0;
            raw[2..9].fill(0);
            raw[9..17].copy_from_slice(&sequence.to_be_bytes());
        }
        Self { buf }
    }

    /// Write `value_ns` into `slot`. Returns an error if the slot was
    /// already written, enforcing the write-once invariant (spec §3).
    pub fn set(&mut self, slot: TsSlot, value_ns: u64) -> crate::Result<()> {
        if self.is_written(slot) {
            return Err(crate::Error::invalid_value("TsTable slot already written"));
        }
        let offset = TSTABLE_HEADER_LEN + (slot as usize) * TSTABLE_SLOT_LEN;
        write_u48(&mut self.buf.as_mut()[offset..offset + TSTABLE_SLOT_LEN], value_ns);
        self.buf.as_mut()[1] |= 1 << (slot as u8);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_round_trip() {
        let mut buf = [0u8; TSTABLE_HALF_LEN];
        let mut table = TsTable::init(&mut buf[..], TsTag::Half, 42);
        table.set(TsSlot::ClientSend, 100).unwrap();
        table.set(TsSlot::ServerRecv, 150).unwrap();
        assert!(table.is_complete());
        assert_eq!(table.get(TsSlot::ClientSend), Some(100));
        assert_eq!(table.get(TsSlot::ServerRecv), Some(150));
        assert_eq!(table.sequence(), 42);
    }

    #[test]
    fn rewrite_is_rejected() {
        let mut buf = [0u8; TSTABLE_HALF_LEN];
        let mut table = TsTable::init(&mut buf[..], TsTag::Half, 1);
        table.set(TsSlot::ClientSend, 1).unwrap();
        assert!(table.set(TsSlot::ClientSend, 2).is_err());
    }

    #[test]
    fn full_table_ordering_property() {
        let mut buf = [0u8; TSTABLE_FULL_LEN];
        let mut table = TsTable::init(&mut buf[..], TsTag::Full, 7);
        table.set(TsSlot::ClientSend, 10).unwrap();
        table.set(TsSlot::ServerRecv, 20).unwrap();
        table.set(TsSlot::ServerSend, 30).unwrap();
        table.set(TsSlot::ClientRecv, 40).unwrap();
        assert!(table.is_complete());
        let cs = table.get(TsSlot::ClientSend).unwrap();
        let sr = table.get(TsSlot::ServerRecv).unwrap();
        let ss = table.get(TsSlot::ServerSend).unwrap();
        let cr = table.get(TsSlot::ClientRecv).unwrap();
        assert!(cs <= sr && sr <= ss && ss <= cr);
    }
}
