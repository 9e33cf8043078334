//! Port initializer (spec §4.4): match configured MACs against the ports the
//! driver reports, configure each one, and publish its `PortView`.

use soconnect_dpdk::{format_mac, DpdkService, EthConf, PortView, RssHashFunc};
use soconnect_pkt::{Error, Result};
use tracing::info;

use crate::config::{HashField, RuntimeConfig};
use crate::memory::BufferPools;

/// Translate spec §6's `rss_hash_field` tokens into the driver's bitset.
fn requested_rss_mask(fields: &[HashField]) -> RssHashFunc {
    let mut mask = RssHashFunc::ALL_DISABLED;
    for field in fields {
        match field {
            HashField::Ip => {
                mask.enable_ipv4();
                mask.enable_ipv6();
            }
            HashField::Ipv4 => mask.enable_ipv4(),
            HashField::Ipv6 => mask.enable_ipv6(),
            HashField::Tcp => {
                mask.enable_nonfrag_ipv4_tcp();
                mask.enable_nonfrag_ipv6_tcp();
            }
            HashField::Udp => {
                mask.enable_nonfrag_ipv4_udp();
                mask.enable_nonfrag_ipv6_udp();
            }
            HashField::Sctp => {
                mask.enable_nonfrag_ipv4_sctp();
                mask.enable_nonfrag_ipv6_sctp();
            }
        }
    }
    mask
}

/// Configure one port per selected MAC (spec §4.4) and return the published
/// `PortView`s in configuration order. `pools` must already be provisioned
/// (spec §4.3 runs strictly before this step).
pub fn init_ports(service: &DpdkService, cfg: &RuntimeConfig, pools: &BufferPools) -> Result<Vec<PortView>> {
    let nb_physical_ports = service.port_num()?;

    let mut views = Vec::with_capacity(cfg.port_mac.len());
    for (logical_id, target_mac) in cfg.port_mac.iter().enumerate() {
        let physical_id = (0..nb_physical_ports)
            .find(|&pid| {
                service
                    .port_info(pid)
                    .map(|info| &info.eth_addr == target_mac)
                    .unwrap_or(false)
            })
            .ok_or_else(|| Error::not_exist(format!("no port advertises MAC {}", format_mac(target_mac))))?;

        let dev_info = service.port_info(physical_id)?;
        let mut eth_conf = EthConf::from_dev_info(&dev_info, cfg.enable_rss, cfg.rss_symmetric_mode)?;
        if cfg.enable_rss {
            let requested = requested_rss_mask(&cfg.rss_hash_field);
            eth_conf.set_rss_hf(dev_info.flow_type_rss_offloads().intersect(requested));
        }
        eth_conf.set_enable_promiscuous(cfg.enable_promiscuous);

        let rxq_confs: Vec<(u16, u32, String)> = (0..cfg.nb_rx_rings_per_port as usize)
            .map(|q| (cfg.rx_queue_len, dev_info.socket_id, format!("rx_p{logical_id}_q{q}")))
            .collect();
        let txq_confs: Vec<(u16, u32)> =
            (0..cfg.nb_tx_rings_per_port as usize).map(|_| (cfg.tx_queue_len, dev_info.socket_id)).collect();

        debug_assert_eq!(rxq_confs.len(), pools.rx_pools[logical_id].len());

        let view = service.port_configure(logical_id as u16, physical_id, &eth_conf, &rxq_confs, &txq_confs)?;
        info!(physical_id, logical_id, mac = %format_mac(target_mac), "port initialized");
        views.push(view);
    }

    Ok(views)
}
