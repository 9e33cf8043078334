//! EAL lifecycle and the global `DpdkService` singleton, ported from
//! `rpkt-dpdk/src/service.rs`.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use soconnect_dpdk_sys as ffi;
use tracing::{debug, info};

use crate::error::{service_err, Result};
use crate::lcore::{self, Lcore, LcoreContext};
use crate::mempool::{Mempool, MempoolConf};
use crate::port::{DevInfo, EthConf, Port, PortStats, PortView, RxQueue, StatsQueryContext, TxQueue};

static SERVICE: OnceCell<DpdkService> = OnceCell::new();

/// The EAL argument string used to bring DPDK up. Mirrors the teacher's
/// `DpdkOption`, defaulting to a single-lcore primary process.
pub struct DpdkOption {
    arg_string: String,
}

impl Default for DpdkOption {
    fn default() -> Self {
        Self { arg_string: "-c 1 -n 4 --proc-type primary".into() }
    }
}

impl DpdkOption {
    pub fn with_eal_arg<S: Into<String>>(arg: S) -> Self {
        Self { arg_string: arg.into() }
    }

    /// Initialize EAL and detect the machine's lcores. Idempotent: a second
    /// call observes the already-initialized singleton.
    pub fn init(self) -> Result<()> {
        SERVICE.get_or_try_init(|| {
            let mut args: Vec<CString> = vec![CString::new("./soconnect").unwrap()];
            args.extend(self.arg_string.split(' ').map(|arg| CString::new(arg).unwrap()));

            let c_args: Vec<_> = args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
            let res = unsafe { ffi::rte_eal_init(c_args.len() as c_int, c_args.as_ptr() as *mut *mut c_char) };
            if res == -1 {
                return Err(service_err("failed to initialize the DPDK EAL"));
            }

            let lcores = lcore::detect_lcores();
            info!(nb_lcores = lcores.len(), "dpdk eal initialized");

            Ok(DpdkService {
                service: Mutex::new(ServiceInner {
                    started: true,
                    lcores: LcoreContext::create(&lcores),
                    mpools: HashMap::new(),
                    ports: HashMap::new(),
                }),
                lcores,
            })
        })?;
        Ok(())
    }
}

struct ServiceInner {
    started: bool,
    lcores: LcoreContext,
    mpools: HashMap<String, Mempool>,
    ports: HashMap<u16, Port>,
}

/// The process-wide handle onto the driver boundary (spec §6). Every
/// out-of-scope primitive named there (`rx_burst`, `tx_burst`, `pool_alloc`,
/// `pool_free`, port configure/start/stop) is reached through this type.
pub struct DpdkService {
    service: Mutex<ServiceInner>,
    lcores: Vec<Lcore>,
}

pub fn try_service() -> Result<&'static DpdkService> {
    SERVICE.get().ok_or_else(|| service_err("dpdk service is not initialized"))
}

/// # Panics
/// If [`DpdkOption::init`] has not succeeded yet.
pub fn service() -> &'static DpdkService {
    SERVICE.get().expect("dpdk service is not initialized")
}

impl DpdkService {
    pub fn lcores(&self) -> &[Lcore] {
        &self.lcores
    }

    pub fn lcore_bind(&self, lcore_id: u32) -> Result<()> {
        let mut inner = self.try_lock()?;
        let lcore = self
            .lcores
            .iter()
            .find(|lcore| lcore.lcore_id == lcore_id)
            .ok_or_else(|| service_err("no such lcore"))?;
        inner.lcores.pin(lcore)
    }

    pub fn mempool_create<S: AsRef<str>>(&self, name: S, conf: &MempoolConf) -> Result<Mempool> {
        let mut inner = self.try_lock()?;
        if inner.mpools.contains_key(name.as_ref()) {
            return Err(service_err("mempool already exists"));
        }
        let mp = Mempool::try_create(name.as_ref(), conf)?;
        inner.mpools.insert(name.as_ref().to_string(), mp.clone());
        debug!(name = name.as_ref(), nb_mbufs = conf.nb_mbufs, "mempool created");
        Ok(mp)
    }

    pub fn mempool(&self, name: &str) -> Result<Mempool> {
        let inner = self.try_lock()?;
        inner.mpools.get(name).cloned().ok_or_else(|| service_err("no such mempool"))
    }

    pub fn mempool_free(&self, name: &str) -> Result<()> {
        let mut inner = self.try_lock()?;
        let mp = inner.mpools.get(name).ok_or_else(|| service_err("no such mempool"))?;
        if !mp.in_use() && mp.full() {
            let mp = inner.mpools.remove(name).unwrap();
            unsafe { Mempool::delete(mp) };
            Ok(())
        } else {
            Err(service_err("mempool is in use"))
        }
    }

    pub fn port_num(&self) -> Result<u16> {
        let _inner = self.try_lock()?;
        Ok(unsafe { ffi::rte_eth_dev_count_avail() })
    }

    pub fn port_info(&self, port_id: u16) -> Result<DevInfo> {
        let _inner = self.try_lock()?;
        if port_id >= unsafe { ffi::rte_eth_dev_count_avail() } {
            return Err(service_err("invalid port id"));
        }
        unsafe { DevInfo::try_get(port_id) }
    }

    /// Configure and start a port (spec §4.4), publishing its `PortView`.
    pub fn port_configure(
        &self,
        logical_id: u16,
        port_id: u16,
        eth_conf: &EthConf,
        rxq_confs: &[(u16, u32, String)],
        txq_confs: &[(u16, u32)],
    ) -> Result<PortView> {
        let mut inner = self.try_lock()?;
        if inner.ports.contains_key(&port_id) {
            return Err(service_err("port already configured"));
        }

        let rxq_confs = rxq_confs
            .iter()
            .map(|(nb_rx_desc, socket_id, mp_name)| {
                inner
                    .mpools
                    .get(mp_name.as_str())
                    .cloned()
                    .map(|mp| (*nb_rx_desc, *socket_id, mp))
                    .ok_or_else(|| service_err("no such mempool"))
            })
            .collect::<Result<Vec<_>>>()?;

        let eth_addr = unsafe { DevInfo::try_get(port_id)?.eth_addr };

        let port = Port::try_create(port_id, eth_conf, &rxq_confs, txq_confs)?;
        inner.ports.insert(port_id, port);
        info!(port_id, logical_id, mac = %crate::port::format_mac(&eth_addr), "port started");

        Ok(PortView { physical_id: port_id, logical_id, mac: eth_addr })
    }

    pub fn port_close(&self, port_id: u16) -> Result<()> {
        let mut inner = self.try_lock()?;
        let port = inner.ports.get(&port_id).ok_or_else(|| service_err("invalid port id"))?;
        if !port.can_shutdown() {
            return Err(service_err("port is in use"));
        }
        port.stop_port()?;
        inner.ports.remove(&port_id);
        Ok(())
    }

    pub fn rx_queue(&self, port_id: u16, qid: u16) -> Result<RxQueue> {
        let inner = self.try_lock()?;
        inner.ports.get(&port_id).ok_or_else(|| service_err("invalid port id"))?.rx_queue(qid)
    }

    pub fn tx_queue(&self, port_id: u16, qid: u16) -> Result<TxQueue> {
        let inner = self.try_lock()?;
        inner.ports.get(&port_id).ok_or_else(|| service_err("invalid port id"))?.tx_queue(qid)
    }

    pub fn stats_query(&self, port_id: u16) -> Result<StatsQueryContext> {
        let inner = self.try_lock()?;
        inner.ports.get(&port_id).ok_or_else(|| service_err("invalid port id"))?.stats_query()
    }

    pub fn service_close(&self) -> Result<()> {
        let mut inner = self.service.lock().unwrap();
        if inner.started {
            if inner.ports.is_empty() && inner.mpools.is_empty() {
                unsafe { ffi::rte_eal_cleanup() };
                inner.started = false;
            } else {
                return Err(service_err("service is in use"));
            }
        }
        Ok(())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, ServiceInner>> {
        let inner = self.service.lock().unwrap();
        if !inner.started {
            Err(service_err("service is shut down"))
        } else {
            Ok(inner)
        }
    }
}
