//! Mbuf pool wrapper, ported from `rpkt-dpdk/src/mempool.rs`.

use std::ffi::CString;
use std::ptr::NonNull;
use std::sync::Arc;

use arrayvec::ArrayVec;
use soconnect_dpdk_sys as ffi;

use crate::error::{service_err, Result};
use crate::mbuf::Mbuf;

/// Construction parameters for one `Mempool`.
///
/// `nb_mbufs` is computed by the caller per spec §4.3 (`2 * queue_depth - 1`
/// for a per-queue pool, `(rx_depth + tx_depth) * nb_cores - 1` for the
/// shared out-of-fast-path pool), not by this type -- the pool sizing policy
/// belongs to the runtime's memory-buffer provisioning step.
#[derive(Clone, Copy, Debug)]
pub struct MempoolConf {
    pub nb_mbufs: u32,
    pub per_core_caches: u32,
    pub dataroom: u16,
    pub socket_id: u32,
}

impl MempoolConf {
    pub const PER_CORE_CACHES: u32 = 256;
    pub const DATAROOM: u16 = 2048;

    pub fn new(nb_mbufs: u32, socket_id: u32) -> Self {
        Self {
            nb_mbufs,
            per_core_caches: Self::PER_CORE_CACHES,
            dataroom: Self::DATAROOM,
            socket_id,
        }
    }
}

/// A named, reference-counted mbuf pool. Cloning shares the underlying DPDK
/// pool; the pool is freed only once every clone has been dropped.
#[derive(Clone)]
pub struct Mempool {
    ptr: NonNull<ffi::rte_mempool>,
    counter: Arc<()>,
}

unsafe impl Send for Mempool {}
unsafe impl Sync for Mempool {}

impl Mempool {
    pub(crate) fn try_create<S: AsRef<str>>(name: S, conf: &MempoolConf) -> Result<Self> {
        let c_name = CString::new(name.as_ref())
            .map_err(|_| service_err("mempool name contains an interior nul byte"))?;

        let data_room_size = conf.dataroom as u32 + ffi::RTE_PKTMBUF_HEADROOM;
        let ptr = unsafe {
            ffi::rte_pktmbuf_pool_create(
                c_name.as_ptr(),
                conf.nb_mbufs,
                conf.per_core_caches,
                0,
                data_room_size as u16,
                conf.socket_id as i32,
            )
        };

        NonNull::new(ptr)
            .map(|ptr| Self { ptr, counter: Arc::new(()) })
            .ok_or_else(|| service_err(format!("failed to create mempool {}", name.as_ref())))
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut ffi::rte_mempool {
        self.ptr.as_ptr()
    }

    /// Allocate one mbuf, or `None` if the pool is exhausted.
    #[inline]
    pub fn try_alloc(&self) -> Option<Mbuf> {
        let ptr = unsafe { ffi::rte_pktmbuf_alloc_(self.ptr.as_ptr()) };
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { Mbuf::from_raw(ptr) })
        }
    }

    /// Fill `batch` with as many mbufs as the pool can provide, up to its
    /// remaining capacity.
    pub fn fill_batch<const N: usize>(&self, batch: &mut ArrayVec<Mbuf, N>) {
        while batch.len() < N {
            match self.try_alloc() {
                Some(mbuf) => batch.push(mbuf),
                None => break,
            }
        }
    }

    /// Number of mbufs currently available in the pool.
    pub fn nb_mbufs(&self) -> u32 {
        unsafe { ffi::rte_mempool_avail_count(self.ptr.as_ptr()) }
    }

    /// Whether every mbuf originally provisioned is currently back in the
    /// pool (no mbuf from this pool is still in flight).
    pub fn full(&self) -> bool {
        unsafe { ffi::rte_mempool_avail_count(self.ptr.as_ptr()) == self.ptr.as_ref().size }
    }

    pub(crate) fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }

    /// # Safety
    /// The caller must guarantee every `Mbuf` allocated from `mp` has been
    /// freed and that no other clone of `mp` is live.
    pub(crate) unsafe fn delete(mp: Self) {
        debug_assert!(mp.full() && !mp.in_use());
        ffi::rte_mempool_free(mp.ptr.as_ptr());
    }
}

impl std::fmt::Debug for Mempool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mempool").field("avail", &self.nb_mbufs()).finish()
    }
}

/// Lets `soconnect_pkt::hdr::assemble_into_mbuf` stage a `PktHdr` straight
/// into this pool's mbufs without the packet toolkit depending on this crate.
impl soconnect_pkt::hdr::Pool for Mempool {
    type Seg = Mbuf;

    fn segment_room(&self) -> usize {
        unsafe { ffi::rte_pktmbuf_data_room_size_(self.ptr.as_ptr()) as usize }
    }

    fn alloc(&mut self) -> soconnect_pkt::Result<Self::Seg> {
        self.try_alloc()
            .ok_or_else(|| soconnect_pkt::Error::memory("mempool exhausted"))
    }
}
