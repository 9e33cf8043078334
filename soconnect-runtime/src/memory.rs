//! Memory-buffer provisioning (spec §4.3): one RX and one TX pool per
//! (port, queue), plus one shared pool for out-of-fast-path allocation.

use soconnect_dpdk::{DpdkService, Mempool, MempoolConf};
use soconnect_pkt::{Error, Result};

use crate::config::RuntimeConfig;

pub struct BufferPools {
    /// Indexed `[logical_port][queue]`.
    pub rx_pools: Vec<Vec<Mempool>>,
    pub tx_pools: Vec<Vec<Mempool>>,
    pub shared_pool: Mempool,
}

impl BufferPools {
    /// Create every pool named by spec §4.3 ahead of any port being
    /// started. `nb_ports` is the number of selected ports (`P`); `socket_id`
    /// is assumed uniform across the selected ports, matching single-NUMA
    /// deployments (multi-socket placement is not named by the spec).
    pub fn provision(service: &DpdkService, cfg: &RuntimeConfig, nb_ports: usize, socket_id: u32) -> Result<Self> {
        let nb_rx_rings = cfg.nb_rx_rings_per_port as usize;
        let nb_tx_rings = cfg.nb_tx_rings_per_port as usize;

        let per_queue_nb_mbufs =
            |depth: u16| -> u32 { 2u32.saturating_mul(depth as u32).saturating_sub(1) };

        let mut rx_pools = Vec::with_capacity(nb_ports);
        let mut tx_pools = Vec::with_capacity(nb_ports);

        for logical_port in 0..nb_ports {
            let mut rxq_pools = Vec::with_capacity(nb_rx_rings);
            for queue in 0..nb_rx_rings {
                let name = format!("rx_p{logical_port}_q{queue}");
                let conf = MempoolConf::new(per_queue_nb_mbufs(cfg.rx_queue_len), socket_id);
                rxq_pools.push(
                    service
                        .mempool_create(&name, &conf)
                        .map_err(|e| Error::memory(format!("failed to create pool '{name}': {e}")))?,
                );
            }
            rx_pools.push(rxq_pools);

            let mut txq_pools = Vec::with_capacity(nb_tx_rings);
            for queue in 0..nb_tx_rings {
                let name = format!("tx_p{logical_port}_q{queue}");
                let conf = MempoolConf::new(per_queue_nb_mbufs(cfg.tx_queue_len), socket_id);
                txq_pools.push(
                    service
                        .mempool_create(&name, &conf)
                        .map_err(|e| Error::memory(format!("failed to create pool '{name}': {e}")))?,
                );
            }
            tx_pools.push(txq_pools);
        }

        let nb_cores = cfg.used_core_ids.len().max(1) as u32;
        let shared_nb_mbufs = (cfg.rx_queue_len as u32 + cfg.tx_queue_len as u32)
            .saturating_mul(nb_cores)
            .saturating_sub(1);
        let shared_pool = service
            .mempool_create("shared_pool", &MempoolConf::new(shared_nb_mbufs, socket_id))
            .map_err(|e| Error::memory(format!("failed to create shared pool: {e}")))?;

        Ok(Self { rx_pools, tx_pools, shared_pool })
    }
}
