//! Single mbuf wrapper, ported from `rpkt-dpdk/src/mbuf.rs` (single-segment
//! subset: the framework composes multi-segment packets itself via
//! `soconnect_pkt::hdr::assemble_into_mbuf`, so chain-walking/concat helpers
//! that exist only to support the teacher's own multi-seg API are dropped).

use std::ptr::NonNull;

use soconnect_dpdk_sys as ffi;

#[derive(Debug)]
pub struct Mbuf {
    ptr: NonNull<ffi::rte_mbuf>,
}

unsafe impl Send for Mbuf {}
unsafe impl Sync for Mbuf {}

impl Mbuf {
    /// # Safety
    /// `ptr` must point to a valid, exclusively-owned `rte_mbuf`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: *mut ffi::rte_mbuf) -> Self {
        Self { ptr: NonNull::new_unchecked(ptr) }
    }

    #[inline]
    pub(crate) unsafe fn as_mut_ptr(&mut self) -> *mut ffi::rte_mbuf {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) unsafe fn into_raw(self) -> *mut ffi::rte_mbuf {
        let raw = self.ptr.as_ptr();
        std::mem::forget(self);
        raw
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        unsafe { self.ptr.as_ref().data_len.into() }
    }

    #[inline]
    pub fn pkt_len(&self) -> usize {
        unsafe { self.ptr.as_ref().pkt_len as usize }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        unsafe { usize::from(self.ptr.as_ref().buf_len - self.ptr.as_ref().data_off) }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(data_addr(self.ptr.as_ref()), usize::from(self.ptr.as_ref().data_len))
        }
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(data_addr(self.ptr.as_ref()), usize::from(self.ptr.as_ref().data_len))
        }
    }

    /// # Panics
    /// If `slice` does not fit in the remaining capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        assert!(slice.len() <= self.capacity() - self.data_len());
        let old_len = self.data_len();
        unsafe {
            self.ptr.as_mut().data_len += slice.len() as u16;
            self.ptr.as_mut().pkt_len += slice.len() as u32;
        }
        self.data_mut()[old_len..].copy_from_slice(slice);
    }

    /// The NIC's reported rss hash for a received mbuf.
    #[inline]
    pub fn rss(&self) -> u32 {
        unsafe { self.ptr.as_ref().__bindgen_anon_2.hash.rss }
    }

    #[inline]
    pub fn set_tx_offload(&mut self, tx_offload: u64) {
        unsafe {
            self.ptr.as_mut().ol_flags = tx_offload;
        }
    }
}

impl soconnect_pkt::hdr::Segment for Mbuf {
    fn capacity(&self) -> usize {
        Mbuf::capacity(self)
    }

    fn written(&self) -> usize {
        self.data_len()
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> soconnect_pkt::Result<()> {
        if offset != self.data_len() {
            return Err(soconnect_pkt::Error::internal(
                "mbuf segments must be written contiguously from the front",
            ));
        }
        if data.len() > self.capacity() - self.data_len() {
            return Err(soconnect_pkt::Error::memory("mbuf segment is full"));
        }
        self.extend_from_slice(data);
        Ok(())
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        unsafe { ffi::rte_pktmbuf_free_(self.ptr.as_ptr()) };
    }
}

#[inline]
unsafe fn data_addr(mbuf: &ffi::rte_mbuf) -> *mut u8 {
    (mbuf.buf_addr as *mut u8).add(usize::from(mbuf.data_off))
}
