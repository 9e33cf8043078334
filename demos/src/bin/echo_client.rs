//! Reference `WorkerHooks`/`ControlHooks` module: an echo client that paces
//! itself with an exponential inter-burst generator (spec §4.7), stamps
//! `client_send`/`client_recv` into each packet's `TsTable(Full)`, and
//! reports tail latency on exit. Exercises the S2 scenario's client half.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use arrayvec::ArrayVec;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use soconnect_dpdk::{service, DpdkOption, Mbuf, Mempool, TxQueue};
use soconnect_pkt::hdr::{assemble_into_mbuf, L3Addr, L3Variant, L4Variant, PktHdr};
use soconnect_pkt::tstable::{TsSlot, TsTable, TsTag, TSTABLE_FULL_LEN};
use soconnect_pkt::{Error, Result};
use soconnect_runtime::{
    tail_latency, tx_burst_retrying, AppConfig, ControlHooks, Runtime, RuntimeConfig, TsRing, WorkerHooks,
    MAX_RX_BURST,
};
use soconnect_time::{BaseFreq, DistributionGenerator, ExponentialGenerator, Instant as SoInstant};
use tracing::{info, warn};

const ETH_LEN: usize = soconnect_pkt::ether::ETHER_HEADER_LEN;
const IPV4_LEN: usize = soconnect_pkt::ipv4::IPV4_HEADER_LEN;
const UDP_LEN: usize = soconnect_pkt::udp::UDP_HEADER_LEN;
const PAYLOAD_OFFSET: usize = ETH_LEN + IPV4_LEN + UDP_LEN;

#[derive(Parser)]
#[command(about = "SoConnect echo client demo")]
struct Args {
    /// Path to the SoConnect configuration file.
    config: PathBuf,
}

/// App-level keys this module recognizes in the config file, beyond the
/// framework's own (spec §6's `init_app`/`parse_app_kv_pair` contract).
struct EchoClientConfig {
    peer_mac: [u8; 6],
    self_ip: u32,
    peer_ip: u32,
    udp_port: u16,
    nb_packets: u64,
    burst_size: usize,
    target_pps: u64,
    exp_mean_ns: u64,
}

impl Default for EchoClientConfig {
    fn default() -> Self {
        Self {
            peer_mac: [0; 6],
            self_ip: 0,
            peer_ip: 0,
            udp_port: 9,
            nb_packets: 1_000,
            burst_size: 1,
            target_pps: 10_000,
            exp_mean_ns: 1_000_000,
        }
    }
}

impl AppConfig for EchoClientConfig {
    fn parse_app_kv_pair(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "peer_mac" => self.peer_mac = parse_mac(value)?,
            "self_ip" => self.self_ip = parse_ipv4(value)?,
            "peer_ip" => self.peer_ip = parse_ipv4(value)?,
            "udp_port" => self.udp_port = parse_int(key, value)?,
            "nb_packets" => self.nb_packets = parse_int(key, value)?,
            "burst_size" => self.burst_size = parse_int::<u32>(key, value)? as usize,
            "target_pps" => self.target_pps = parse_int(key, value)?,
            other => return Err(Error::invalid_value(format!("unrecognized key '{other}'"))),
        }
        Ok(())
    }

    /// Derive the per-core exponential mean from the target rate (spec
    /// §4.7: `1e9 * b / (R / nb_sender_cores)`).
    fn init_app_internal(&mut self, rt: &RuntimeConfig) -> Result<()> {
        let nb_sender_cores = rt.sender_cores().len().max(1) as u64;
        let per_core_rate = (self.target_pps / nb_sender_cores).max(1);
        self.exp_mean_ns = 1_000_000_000u64.saturating_mul(self.burst_size as u64) / per_core_rate;
        Ok(())
    }
}

pub struct ClientState {
    txq: Option<TxQueue>,
    pool: Option<Mempool>,
    self_mac: [u8; 6],
    base_freq: BaseFreq,
    gen: ExponentialGenerator<StdRng>,
    next_send_at: SoInstant,
    sequence: u64,
    sent: u64,
    received: u64,
    ring: TsRing,
}

impl ClientState {
    fn new(logical_core: u32, exp_mean_ns: u64) -> Self {
        Self {
            txq: None,
            pool: None,
            self_mac: [0; 6],
            base_freq: BaseFreq::new(),
            gen: ExponentialGenerator::new(StdRng::seed_from_u64(u64::from(logical_core)), exp_mean_ns.max(1)),
            next_send_at: SoInstant::now(),
            sequence: 0,
            sent: 0,
            received: 0,
            ring: TsRing::new(),
        }
    }

    fn build_packet(&mut self, cfg: &EchoClientConfig) -> Result<Mbuf> {
        let pool = self.pool.as_mut().ok_or_else(|| Error::internal("tx pool not initialized"))?;

        let mut table_buf = alloc_table_buf();
        {
            let mut table = TsTable::init(&mut table_buf[..], TsTag::Full, self.sequence);
            table.set(TsSlot::ClientSend, now_ns())?;
        }

        let mut hdr = PktHdr {
            eth_src: self.self_mac,
            eth_dst: cfg.peer_mac,
            vlan_id: None,
            l3: L3Variant::V4,
            src_addr: L3Addr::V4(cfg.self_ip),
            dst_addr: L3Addr::V4(cfg.peer_ip),
            l4: L4Variant::Udp,
            src_port: cfg.udp_port,
            dst_port: cfg.udp_port,
            sctp_tag: 0,
            pkt_len: PAYLOAD_OFFSET + TSTABLE_FULL_LEN,
            payload: table_buf,
            payload_offset: 0,
        };

        let segments = assemble_into_mbuf(pool, &mut hdr)?;
        self.sequence += 1;
        segments
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("assembly produced an empty segment chain"))
    }
}

fn alloc_table_buf() -> Vec<u8> {
    vec![0u8; TSTABLE_FULL_LEN]
}

impl WorkerHooks<ClientState> for EchoClientConfig {
    fn process_enter(&self, rt: &RuntimeConfig, state: &mut ClientState, logical_core: u32) -> Result<()> {
        let port = rt.ports.first().ok_or_else(|| Error::not_exist("no port configured"))?;
        let queue = logical_core % rt.nb_tx_rings_per_port as u32;
        state.txq = Some(service().tx_queue(port.physical_id, queue as u16)?);
        state.pool = Some(service().mempool(&format!("tx_p{}_q{queue}", port.logical_id))?);
        state.self_mac = port.mac;
        state.next_send_at = SoInstant::now();
        info!(logical_core, queue, port = port.physical_id, "echo client worker entered");
        Ok(())
    }

    fn process_exit(&self, _rt: &RuntimeConfig, state: &mut ClientState, logical_core: u32) -> Result<()> {
        let loss = state.sent.saturating_sub(state.received);
        let samples = state.ring.samples();
        if samples.is_empty() {
            info!(logical_core, sent = state.sent, received = state.received, loss, "echo client worker exiting, no completed round trips");
        } else {
            let tl = tail_latency(&samples);
            info!(
                logical_core,
                sent = state.sent,
                received = state.received,
                loss,
                p50_ns = tl.p50,
                p99_ns = tl.p99,
                "echo client worker exiting"
            );
        }
        Ok(())
    }

    fn process_pkt(
        &self,
        pkts: &mut ArrayVec<Mbuf, MAX_RX_BURST>,
        _rt: &RuntimeConfig,
        state: &mut ClientState,
        _queue: u16,
        _recv_port: u16,
    ) -> Result<()> {
        for mut mbuf in pkts.drain(..) {
            match record_round_trip(&mut mbuf) {
                Ok(latency_ns) => {
                    state.received += 1;
                    state.ring.push(latency_ns);
                }
                Err(e) => warn!(error = %e, "dropping a reply that could not be matched to a TsTable"),
            }
        }
        Ok(())
    }

    fn process_client(&self, _rt: &RuntimeConfig, state: &mut ClientState, _queue: u16, ready_to_exit: &mut bool) -> Result<()> {
        if state.sent >= self.nb_packets {
            *ready_to_exit = true;
            return Ok(());
        }
        if SoInstant::now() < state.next_send_at {
            return Ok(());
        }

        let mut batch = ArrayVec::<Mbuf, MAX_RX_BURST>::new();
        while batch.len() < self.burst_size && state.sent < self.nb_packets {
            match state.build_packet(self) {
                Ok(mbuf) => {
                    batch.push(mbuf);
                    state.sent += 1;
                }
                Err(e) => {
                    warn!(error = %e, "failed to build an echo request");
                    break;
                }
            }
        }
        if let Some(txq) = state.txq.as_mut() {
            tx_burst_retrying(txq, &mut batch);
        }

        let interval_ns = state.gen.next();
        state.next_send_at = SoInstant::now() + state.base_freq.ns_to_cycles(interval_ns as f64);
        Ok(())
    }
}

impl ControlHooks<ClientState> for EchoClientConfig {
    fn infly_interval_ns(&self) -> u64 {
        1_000_000_000
    }

    fn control_infly(&self, _rt: &RuntimeConfig, state: &mut ClientState, worker_core_id: u32) -> Result<()> {
        info!(worker_core_id, sent = state.sent, received = state.received, "echo client tick");
        Ok(())
    }
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
}

/// Stamp `ClientRecv` and fold the completed table into a round-trip
/// latency in nanoseconds.
fn record_round_trip(mbuf: &mut Mbuf) -> Result<u64> {
    let recv_ns = now_ns();
    let data = mbuf.data_mut();
    if data.len() < PAYLOAD_OFFSET + TSTABLE_FULL_LEN {
        return Err(Error::invalid_value("packet too short to carry a TsTable(Full)"));
    }

    let mut table = TsTable::new_unchecked(&mut data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + TSTABLE_FULL_LEN]);
    table.set(TsSlot::ClientRecv, recv_ns)?;
    if !table.is_complete() {
        return Err(Error::invalid_value("echoed TsTable is missing a slot"));
    }

    let client_send = table.get(TsSlot::ClientSend).ok_or_else(|| Error::internal("missing client_send slot"))?;
    Ok(recv_ns.saturating_sub(client_send))
}

fn parse_mac(s: &str) -> Result<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(':');
    for byte in mac.iter_mut() {
        let token = parts.next().ok_or_else(|| Error::invalid_value(format!("malformed MAC address '{s}'")))?;
        *byte = u8::from_str_radix(token, 16).map_err(|_| Error::invalid_value(format!("malformed MAC address '{s}'")))?;
    }
    if parts.next().is_some() {
        return Err(Error::invalid_value(format!("malformed MAC address '{s}'")));
    }
    Ok(mac)
}

fn parse_ipv4(s: &str) -> Result<u32> {
    s.parse::<std::net::Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::invalid_value(format!("malformed IPv4 address '{s}'")))
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::invalid_value(format!("'{key}' is not a valid integer: '{value}'")))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(e) = DpdkOption::default().init() {
        eprintln!("failed to initialize the dpdk eal: {e}");
        std::process::exit(1);
    }

    let runtime = match Runtime::init_app(&args.config, EchoClientConfig::default()) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to initialize echo client: {e}");
            std::process::exit(1);
        }
    };

    let exp_mean_ns = runtime.app_config().exp_mean_ns;

    if let Err(e) = runtime.run(service(), move |logical_core| ClientState::new(logical_core, exp_mean_ns)) {
        eprintln!("echo client exited with an error: {e}");
        std::process::exit(1);
    }
}
