//! Reference `WorkerHooks`/`ControlHooks` module: a UDP echo server that
//! stamps the two server-side slots of an embedded `TsTable(Full)` (spec
//! §4.7) before reflecting each packet back to its sender. Exercises the
//! S2 scenario's server half.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use arrayvec::ArrayVec;
use clap::Parser;
use soconnect_dpdk::{service, DpdkOption, Mbuf, TxQueue};
use soconnect_pkt::tstable::{TsSlot, TsTable, TSTABLE_FULL_LEN};
use soconnect_pkt::{Error, Result};
use soconnect_runtime::{
    tx_burst_retrying, AppConfig, ControlHooks, Runtime, RuntimeConfig, WorkerHooks, MAX_RX_BURST,
};
use tracing::{info, warn};

const ETH_LEN: usize = soconnect_pkt::ether::ETHER_HEADER_LEN;
const IPV4_LEN: usize = soconnect_pkt::ipv4::IPV4_HEADER_LEN;
const UDP_LEN: usize = soconnect_pkt::udp::UDP_HEADER_LEN;
const PAYLOAD_OFFSET: usize = ETH_LEN + IPV4_LEN + UDP_LEN;

#[derive(Parser)]
#[command(about = "SoConnect echo server demo")]
struct Args {
    /// Path to the SoConnect configuration file.
    config: PathBuf,
}

/// Nothing beyond the framework's own recognized keys.
#[derive(Default)]
struct EchoServerConfig;

impl AppConfig for EchoServerConfig {}

pub struct ServerState {
    txq: Option<TxQueue>,
    echoed: u64,
    malformed: u64,
}

impl ServerState {
    fn new() -> Self {
        Self { txq: None, echoed: 0, malformed: 0 }
    }
}

impl WorkerHooks<ServerState> for EchoServerConfig {
    fn process_enter(&self, rt: &RuntimeConfig, state: &mut ServerState, logical_core: u32) -> Result<()> {
        let port = rt.ports.first().ok_or_else(|| Error::not_exist("no port configured"))?;
        let queue = logical_core % rt.nb_tx_rings_per_port as u32;
        state.txq = Some(service().tx_queue(port.physical_id, queue as u16)?);
        info!(logical_core, queue, port = port.physical_id, "echo server worker entered");
        Ok(())
    }

    fn process_exit(&self, _rt: &RuntimeConfig, state: &mut ServerState, logical_core: u32) -> Result<()> {
        info!(logical_core, echoed = state.echoed, malformed = state.malformed, "echo server worker exiting");
        Ok(())
    }

    fn process_pkt(
        &self,
        pkts: &mut ArrayVec<Mbuf, MAX_RX_BURST>,
        _rt: &RuntimeConfig,
        state: &mut ServerState,
        _queue: u16,
        _recv_port: u16,
    ) -> Result<()> {
        let mut reply = ArrayVec::<Mbuf, MAX_RX_BURST>::new();
        for mut mbuf in pkts.drain(..) {
            match reflect(&mut mbuf) {
                Ok(()) => {
                    state.echoed += 1;
                    reply.push(mbuf);
                }
                Err(e) => {
                    state.malformed += 1;
                    warn!(error = %e, "dropping packet that cannot be echoed");
                }
            }
        }
        if let Some(txq) = state.txq.as_mut() {
            tx_burst_retrying(txq, &mut reply);
        }
        Ok(())
    }
}

impl ControlHooks<ServerState> for EchoServerConfig {
    fn infly_interval_ns(&self) -> u64 {
        1_000_000_000
    }

    fn control_infly(&self, _rt: &RuntimeConfig, state: &mut ServerState, worker_core_id: u32) -> Result<()> {
        info!(worker_core_id, echoed = state.echoed, "echo server tick");
        Ok(())
    }
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
}

/// Swap Ethernet/IPv4/UDP endpoints in place and stamp `ServerRecv`/
/// `ServerSend`. Ones-complement checksums are invariant under swapping two
/// complete fields, so neither the IPv4 nor the UDP checksum needs
/// recomputing.
fn reflect(mbuf: &mut Mbuf) -> Result<()> {
    let recv_ns = now_ns();
    let data = mbuf.data_mut();
    if data.len() < PAYLOAD_OFFSET + TSTABLE_FULL_LEN {
        return Err(Error::invalid_value("packet too short to carry a TsTable(Full)"));
    }

    for i in 0..6 {
        data.swap(i, 6 + i);
    }
    for i in 0..4 {
        data.swap(ETH_LEN + 12 + i, ETH_LEN + 16 + i);
    }
    for i in 0..2 {
        data.swap(ETH_LEN + IPV4_LEN + i, ETH_LEN + IPV4_LEN + 2 + i);
    }

    let mut table = TsTable::new_unchecked(&mut data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + TSTABLE_FULL_LEN]);
    table.set(TsSlot::ServerRecv, recv_ns)?;
    table.set(TsSlot::ServerSend, now_ns())?;
    Ok(())
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

    let runtime = match Runtime::init_app(&args.config, EchoServerConfig::default()) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to initialize echo server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.run(service(), |_logical_core| ServerState::new()) {
        eprintln!("echo server exited with an error: {e}");
        std::process::exit(1);
    }
}
