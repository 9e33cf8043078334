//! Port configuration, queue setup and stats, ported from `rpkt-dpdk/src/port.rs`.

use std::ffi::CStr;
use std::sync::Arc;

use arrayvec::ArrayVec;
use soconnect_dpdk_sys as ffi;

use crate::error::{ffi_err, service_err, Result};
use crate::mbuf::Mbuf;
use crate::mempool::Mempool;
use crate::offload::{DevRxOffload, DevTxOffload, RssHashFunc, DEFAULT_RSS_KEY_40B};

pub struct DescLim(ffi::rte_eth_desc_lim);

impl DescLim {
    pub fn nb_max(&self) -> u16 {
        self.0.nb_max
    }
    pub fn nb_min(&self) -> u16 {
        self.0.nb_min
    }
    pub fn nb_align(&self) -> u16 {
        self.0.nb_align
    }
}

/// A snapshot of the device capabilities reported by the driver, queried
/// before the device is configured.
pub struct DevInfo {
    pub port_id: u16,
    pub socket_id: u32,
    pub eth_addr: [u8; 6],
    pub driver_name: String,
    raw: ffi::rte_eth_dev_info,
}

impl DevInfo {
    pub(crate) unsafe fn try_get(port_id: u16) -> Result<Self> {
        let mut dev_info: ffi::rte_eth_dev_info = std::mem::zeroed();
        let res = ffi::rte_eth_dev_info_get(port_id, &mut dev_info);
        if res != 0 {
            return Err(ffi_err(res, "failed to get eth dev info"));
        }

        let socket_id = ffi::rte_eth_dev_socket_id(port_id);
        if socket_id < 0 {
            return Err(ffi_err(socket_id, "failed to get eth socket id"));
        }

        let mut eth_addr: ffi::rte_ether_addr = std::mem::zeroed();
        let res = ffi::rte_eth_macaddr_get(port_id, &mut eth_addr);
        if res != 0 {
            return Err(ffi_err(res, "failed to get eth mac address"));
        }

        Ok(Self {
            port_id,
            socket_id: socket_id as u32,
            eth_addr: eth_addr.addr_bytes,
            driver_name: unsafe { CStr::from_ptr(dev_info.driver_name) }
                .to_str()
                .unwrap_or("")
                .to_owned(),
            raw: dev_info,
        })
    }

    pub fn min_mtu(&self) -> u16 {
        self.raw.min_mtu
    }
    pub fn max_mtu(&self) -> u16 {
        self.raw.max_mtu
    }
    pub fn max_rx_queues(&self) -> u16 {
        self.raw.max_rx_queues
    }
    pub fn max_tx_queues(&self) -> u16 {
        self.raw.max_tx_queues
    }
    pub fn rx_offload_capa(&self) -> DevRxOffload {
        DevRxOffload(self.raw.rx_offload_capa & DevRxOffload::ALL_ENABLED.0)
    }
    pub fn tx_offload_capa(&self) -> DevTxOffload {
        DevTxOffload(self.raw.tx_offload_capa & DevTxOffload::ALL_ENABLED.0)
    }
    pub fn flow_type_rss_offloads(&self) -> RssHashFunc {
        RssHashFunc(self.raw.flow_type_rss_offloads & RssHashFunc::ALL_ENABLED.0)
    }
    pub fn reta_size(&self) -> u16 {
        self.raw.reta_size
    }
    pub fn hash_key_size(&self) -> u8 {
        self.raw.hash_key_size
    }
    pub fn tx_desc_lim(&self) -> DescLim {
        DescLim(self.raw.tx_desc_lim)
    }
    pub fn rx_desc_lim(&self) -> DescLim {
        DescLim(self.raw.rx_desc_lim)
    }
}

/// Published once a port is configured: the §4.4 `PortView`.
#[derive(Clone, Copy, Debug)]
pub struct PortView {
    pub physical_id: u16,
    pub logical_id: u16,
    pub mac: [u8; 6],
}

/// Device configuration, corresponding to spec §4.4's offload/RSS/promiscuous
/// decisions. Built from `DevInfo` so only capabilities the device actually
/// reports are turned on.
#[derive(Clone)]
pub struct EthConf {
    pub mtu: u32,
    pub tx_offloads: DevTxOffload,
    pub rx_offloads: DevRxOffload,
    pub rss_hf: RssHashFunc,
    pub rss_hash_key: Vec<u8>,
    pub enable_promiscuous: bool,
}

impl EthConf {
    pub const RTE_ETHER_MTU: u16 = 1500;
    pub const HASH_KEY_SIZE: u8 = 40;

    /// Build the opportunistic offload set from `dev_info`, per spec §4.4:
    /// checksum-receive on RX; ipv4/udp/tcp/sctp-cksum + mt-lockfree +
    /// fast-free on TX, each enabled only if the device reports it.
    pub fn from_dev_info(dev_info: &DevInfo, rss_enabled: bool, use_symmetric_key: bool) -> Result<Self> {
        if Self::RTE_ETHER_MTU < dev_info.min_mtu() || Self::RTE_ETHER_MTU > dev_info.max_mtu() {
            return Err(service_err("device does not support the default MTU"));
        }

        let supported_tx = dev_info.tx_offload_capa();
        let mut tx_offloads = DevTxOffload::ALL_DISABLED;
        if supported_tx.ipv4_cksum() {
            tx_offloads.enable_ipv4_cksum();
        }
        if supported_tx.udp_cksum() {
            tx_offloads.enable_udp_cksum();
        }
        if supported_tx.tcp_cksum() {
            tx_offloads.enable_tcp_cksum();
        }
        if supported_tx.sctp_cksum() {
            tx_offloads.enable_sctp_cksum();
        }
        if supported_tx.mt_lockfree() {
            tx_offloads.enable_mt_lockfree();
        }
        if supported_tx.fast_free() {
            tx_offloads.enable_fast_free();
        }

        let supported_rx = dev_info.rx_offload_capa();
        let mut rx_offloads = DevRxOffload::ALL_DISABLED;
        if supported_rx.ipv4_cksum() {
            rx_offloads.enable_ipv4_cksum();
        }
        if supported_rx.udp_cksum() {
            rx_offloads.enable_udp_cksum();
        }
        if supported_rx.tcp_cksum() {
            rx_offloads.enable_tcp_cksum();
        }
        if rss_enabled && supported_rx.rss_hash() {
            rx_offloads.enable_rss_hash();
        }

        let rss_hf = if rss_enabled {
            dev_info.flow_type_rss_offloads()
        } else {
            RssHashFunc::ALL_DISABLED
        };
        let rss_hash_key = if use_symmetric_key {
            DEFAULT_RSS_KEY_40B.to_vec()
        } else {
            crate::offload::DEFAULT_RSS_KEY_40B_ASYMMETRIC.to_vec()
        };

        Ok(Self {
            mtu: u32::from(Self::RTE_ETHER_MTU),
            tx_offloads,
            rx_offloads,
            rss_hf,
            rss_hash_key,
            enable_promiscuous: true,
        })
    }

    pub fn set_enable_promiscuous(&mut self, val: bool) {
        self.enable_promiscuous = val;
    }

    pub fn set_rss_hf(&mut self, val: RssHashFunc) {
        self.rss_hf = val;
    }

    // Safety: the returned `rte_eth_conf` must not outlive `self`.
    unsafe fn rte_eth_conf(&self, nb_rxq: u16) -> ffi::rte_eth_conf {
        let mut rx_mode: ffi::rte_eth_rxmode = std::mem::zeroed();
        rx_mode.mq_mode = if nb_rxq > 0 {
            ffi::rte_eth_rx_mq_mode_RTE_ETH_MQ_RX_RSS
        } else {
            ffi::rte_eth_rx_mq_mode_RTE_ETH_MQ_RX_NONE
        };
        rx_mode.mtu = self.mtu;
        rx_mode.offloads = self.rx_offloads.0;

        let mut tx_mode: ffi::rte_eth_txmode = std::mem::zeroed();
        tx_mode.mq_mode = ffi::rte_eth_tx_mq_mode_RTE_ETH_MQ_TX_NONE;
        tx_mode.offloads = self.tx_offloads.0;

        let mut rss_conf: ffi::rte_eth_rss_conf = std::mem::zeroed();
        rss_conf.rss_key = self.rss_hash_key.as_ptr() as *mut u8;
        rss_conf.rss_key_len = self.rss_hash_key.len() as u8;
        rss_conf.rss_hf = self.rss_hf.0;

        let mut eth_conf: ffi::rte_eth_conf = std::mem::zeroed();
        eth_conf.rxmode = rx_mode;
        eth_conf.txmode = tx_mode;
        eth_conf.rx_adv_conf.rss_conf = rss_conf;
        eth_conf
    }
}

pub(crate) struct Port {
    port_id: u16,
    rxq_cts: Vec<(RxQueue, Mempool)>,
    txqs: Vec<TxQueue>,
    stats_query_ct: StatsQueryContext,
}

impl Port {
    pub(crate) fn try_create(
        port_id: u16,
        eth_conf: &EthConf,
        rxq_confs: &[(u16, u32, Mempool)],
        txq_confs: &[(u16, u32)],
    ) -> Result<Self> {
        if rxq_confs.is_empty() || txq_confs.is_empty() {
            return Err(service_err("a port needs at least one rx and one tx queue"));
        }

        let raw_conf = unsafe { eth_conf.rte_eth_conf(rxq_confs.len() as u16) };
        let res = unsafe {
            ffi::rte_eth_dev_configure(port_id, rxq_confs.len() as u16, txq_confs.len() as u16, &raw_conf)
        };
        if res != 0 {
            return Err(ffi_err(res, "failed to configure eth dev"));
        }

        let rxq_cts = rxq_confs
            .iter()
            .enumerate()
            .map(|(rx_queue_id, (nb_rx_desc, socket_id, mp))| unsafe {
                RxQueue::try_create(port_id, rx_queue_id as u16, *nb_rx_desc, *socket_id, mp.as_ptr())
                    .map(|rxq| (rxq, mp.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let txqs = txq_confs
            .iter()
            .enumerate()
            .map(|(tx_queue_id, (nb_tx_desc, socket_id))| {
                TxQueue::try_create(port_id, tx_queue_id as u16, *nb_tx_desc, *socket_id)
            })
            .collect::<Result<Vec<_>>>()?;

        let res = if eth_conf.enable_promiscuous {
            unsafe { ffi::rte_eth_promiscuous_enable(port_id) }
        } else {
            unsafe { ffi::rte_eth_promiscuous_disable(port_id) }
        };
        if res != 0 {
            return Err(ffi_err(res, "failed to set promiscuous mode"));
        }

        let res = unsafe { ffi::rte_eth_dev_start(port_id) };
        if res != 0 {
            return Err(ffi_err(res, "failed to start eth dev"));
        }

        Ok(Self {
            port_id,
            rxq_cts,
            txqs,
            stats_query_ct: StatsQueryContext { port_id, counter: Arc::new(()) },
        })
    }

    pub(crate) fn rx_queue(&self, qid: u16) -> Result<RxQueue> {
        self.rxq_cts
            .get(usize::from(qid))
            .ok_or_else(|| service_err("invalid rx queue id"))?
            .0
            .clone_once()
    }

    pub(crate) fn tx_queue(&self, qid: u16) -> Result<TxQueue> {
        self.txqs
            .get(usize::from(qid))
            .ok_or_else(|| service_err("invalid tx queue id"))?
            .clone_once()
    }

    pub(crate) fn stats_query(&self) -> Result<StatsQueryContext> {
        self.stats_query_ct.clone_once()
    }

    pub(crate) fn can_shutdown(&self) -> bool {
        !self.rxq_cts.iter().any(|(q, _)| q.in_use())
            && !self.txqs.iter().any(|q| q.in_use())
            && !self.stats_query_ct.in_use()
    }

    pub(crate) fn stop_port(&self) -> Result<()> {
        if unsafe { ffi::rte_eth_dev_stop(self.port_id) } != 0 {
            return Err(service_err("failed to stop the port"));
        }
        if unsafe { ffi::rte_eth_dev_close(self.port_id) } != 0 {
            return Err(service_err("failed to close the port"));
        }
        Ok(())
    }
}

pub struct RxQueue {
    port_id: u16,
    qid: u16,
    counter: Arc<()>,
}

impl RxQueue {
    /// Poll up to `batch`'s remaining capacity of received mbufs; returns 0
    /// immediately if nothing is ready (spec §4.5, `rx_burst`).
    #[inline]
    pub fn rx<const N: usize>(&mut self, batch: &mut ArrayVec<Mbuf, N>) -> usize {
        let remaining = N - batch.len();
        unsafe {
            let mbufs = batch.as_mut_ptr().add(batch.len()) as *mut *mut ffi::rte_mbuf;
            let nb_rx = usize::from(ffi::rte_eth_rx_burst_(self.port_id, self.qid, mbufs, remaining as u16));
            batch.set_len(batch.len() + nb_rx);
            nb_rx
        }
    }

    unsafe fn try_create(
        port_id: u16,
        rx_queue_id: u16,
        nb_rx_desc: u16,
        socket_id: u32,
        mp: *mut ffi::rte_mempool,
    ) -> Result<Self> {
        let res = ffi::rte_eth_rx_queue_setup(port_id, rx_queue_id, nb_rx_desc, socket_id, std::ptr::null(), mp);
        if res != 0 {
            Err(ffi_err(res, "failed to set up rx queue"))
        } else {
            Ok(Self { port_id, qid: rx_queue_id, counter: Arc::new(()) })
        }
    }

    fn clone_once(&self) -> Result<RxQueue> {
        if self.in_use() {
            return Err(service_err("rx queue is already claimed by a worker"));
        }
        Ok(RxQueue { port_id: self.port_id, qid: self.qid, counter: self.counter.clone() })
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }
}

pub struct TxQueue {
    port_id: u16,
    qid: u16,
    counter: Arc<()>,
}

impl TxQueue {
    /// Transmit as many mbufs from `batch` as the driver accepts; the caller
    /// (worker engine) is responsible for the §4.5 `BURST_TX_RETRIES` retry
    /// policy on the remainder.
    #[inline]
    pub fn tx<const N: usize>(&mut self, batch: &mut ArrayVec<Mbuf, N>) -> usize {
        unsafe {
            let mbufs = batch.as_mut_ptr() as *mut *mut ffi::rte_mbuf;
            let nb_tx = usize::from(ffi::rte_eth_tx_burst_(self.port_id, self.qid, mbufs, batch.len() as u16));
            let remaining = batch.len() - nb_tx;
            std::ptr::copy(mbufs.add(nb_tx), mbufs, remaining);
            batch.set_len(remaining);
            nb_tx
        }
    }

    fn try_create(port_id: u16, tx_queue_id: u16, nb_tx_desc: u16, socket_id: u32) -> Result<Self> {
        let res = unsafe { ffi::rte_eth_tx_queue_setup(port_id, tx_queue_id, nb_tx_desc, socket_id, std::ptr::null()) };
        if res != 0 {
            Err(ffi_err(res, "failed to set up tx queue"))
        } else {
            Ok(Self { port_id, qid: tx_queue_id, counter: Arc::new(()) })
        }
    }

    fn clone_once(&self) -> Result<TxQueue> {
        if self.in_use() {
            return Err(service_err("tx queue is already claimed by a worker"));
        }
        Ok(TxQueue { port_id: self.port_id, qid: self.qid, counter: self.counter.clone() })
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }
}

/// Per-port counters, mirroring the original's `sc_port_statistics`
/// (`src/sc_port.cpp`) and the teacher's `PortStats`.
#[derive(Clone, Copy)]
pub struct PortStats(ffi::rte_eth_stats);

impl PortStats {
    pub fn ipackets(&self) -> u64 {
        self.0.ipackets
    }
    pub fn opackets(&self) -> u64 {
        self.0.opackets
    }
    pub fn ibytes(&self) -> u64 {
        self.0.ibytes
    }
    pub fn obytes(&self) -> u64 {
        self.0.obytes
    }
    pub fn imissed(&self) -> u64 {
        self.0.imissed
    }
    pub fn oerrors(&self) -> u64 {
        self.0.oerrors
    }
    pub fn rx_nombuf(&self) -> u64 {
        self.0.rx_nombuf
    }
}

impl Default for PortStats {
    fn default() -> Self {
        Self(unsafe { std::mem::zeroed() })
    }
}

pub struct StatsQueryContext {
    port_id: u16,
    counter: Arc<()>,
}

impl StatsQueryContext {
    pub fn query(&mut self) -> PortStats {
        let mut stats: ffi::rte_eth_stats = unsafe { std::mem::zeroed() };
        let res = unsafe { ffi::rte_eth_stats_get(self.port_id, &mut stats) };
        debug_assert_eq!(res, 0);
        PortStats(stats)
    }

    fn clone_once(&self) -> Result<Self> {
        if self.in_use() {
            return Err(service_err("port stats query is already claimed"));
        }
        Ok(Self { port_id: self.port_id, counter: self.counter.clone() })
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }
}

/// Render a MAC address as `XX:XX:XX:XX:XX:XX`, matching the original's
/// `RTE_ETHER_ADDR_FMT_SIZE`-based formatting (`sc_port.c`).
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
