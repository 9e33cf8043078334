//! Lcore detection and pinning, ported from `rpkt-dpdk/src/lcore.rs`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{service_err, Result};
use soconnect_dpdk_sys as ffi;

thread_local! {
    pub(crate) static LCORE: RefCell<Option<Lcore>> = RefCell::new(None);
}

/// One schedulable core: DPDK's logical id, the underlying OS `cpu_id`, and
/// the NUMA socket it belongs to.
#[derive(Copy, Clone, Debug)]
pub struct Lcore {
    pub lcore_id: u32,
    pub cpu_id: u32,
    pub socket_id: u32,
}

impl Lcore {
    pub(crate) fn current() -> Option<Lcore> {
        LCORE.with(|tl| tl.borrow().as_ref().copied())
    }
}

pub(crate) struct LcoreContext(HashMap<u32, bool>);

impl LcoreContext {
    pub(crate) fn create(lcores: &[Lcore]) -> Self {
        Self(lcores.iter().map(|lcore| (lcore.lcore_id, false)).collect())
    }

    /// Pin the calling OS thread to `lcore`. A thread may pin itself at most
    /// once, and each lcore may be claimed by at most one thread.
    pub(crate) fn pin(&mut self, lcore: &Lcore) -> Result<()> {
        if LCORE.with(|tl| tl.borrow().is_some()) {
            return Err(service_err("thread is already pinned to an lcore"));
        }

        let occupied = self
            .0
            .get_mut(&lcore.lcore_id)
            .ok_or_else(|| service_err("no such lcore"))?;
        if *occupied {
            return Err(service_err("lcore is already in use"));
        }
        *occupied = true;

        unsafe {
            let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(usize::try_from(lcore.cpu_id).unwrap(), &mut cpu_set);
            let res = ffi::rte_thread_set_affinity(&mut std::mem::transmute(cpu_set));
            if res != 0 {
                return Err(crate::error::ffi_err(res, "failed to set thread affinity"));
            }
        }

        LCORE.with(|tl| {
            *tl.borrow_mut() = Some(*lcore);
        });

        Ok(())
    }
}

/// Detect schedulable lcores by walking `/sys/devices/system/{cpu,node}`,
/// matching the teacher's detection approach rather than invoking EAL's
/// internal lcore list (which requires a full EAL init first).
pub(crate) fn detect_lcores() -> Vec<Lcore> {
    let mut lcores: Vec<Lcore> = (0..ffi::RTE_MAX_LCORE)
        .filter(|id| cpu_detected(*id))
        .map(|lcore_id| Lcore {
            lcore_id,
            cpu_id: cpu_core_id(lcore_id).unwrap_or(lcore_id),
            socket_id: cpu_socket_id(lcore_id).unwrap_or(0),
        })
        .collect();
    lcores.sort_by_key(|lcore| lcore.lcore_id);
    lcores
}

fn cpu_detected(lcore_id: u32) -> bool {
    PathBuf::from("/sys/devices/system/cpu")
        .join(format!("cpu{lcore_id}"))
        .join("topology/core_id")
        .exists()
}

fn cpu_socket_id(lcore_id: u32) -> Option<u32> {
    for socket_id in 0..ffi::RTE_MAX_NUMA_NODES {
        let sys_file = PathBuf::from("/sys/devices/system/node")
            .join(format!("node{socket_id}"))
            .join(format!("cpu{lcore_id}"));
        if sys_file.exists() {
            return Some(socket_id);
        }
    }
    None
}

fn cpu_core_id(lcore_id: u32) -> Option<u32> {
    let sys_file = PathBuf::from("/sys/devices/system/cpu")
        .join(format!("cpu{lcore_id}"))
        .join("topology/core_id");

    let mut file = File::open(sys_file).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse::<u32>().ok()
}
