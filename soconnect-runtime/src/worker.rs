//! Per-core worker engine (spec §4.5): one pinned OS thread per selected
//! worker core, driving the server (`rx_burst`/`process_pkt`) and client
//! (`process_client`) hooks until the quit flag is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use arrayvec::ArrayVec;
use soconnect_dpdk::{DpdkService, Mbuf, PortView, TxQueue};
use soconnect_pkt::{Error, ErrorKind, Result};
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::hooks::{WorkerHooks, MAX_RX_BURST};

/// Transmit attempts made on a burst before the remainder is given up on
/// (spec §4.5).
pub const BURST_TX_RETRIES: usize = 16;

/// Send as much of `batch` as the driver accepts, retrying the remainder up
/// to `BURST_TX_RETRIES` times. Whatever is still queued afterwards is
/// dropped by the caller (an `Mbuf`'s `Drop` returns it to its pool).
pub fn tx_burst_retrying<const N: usize>(txq: &mut TxQueue, batch: &mut ArrayVec<Mbuf, N>) -> usize {
    let mut sent = 0;
    for _ in 0..BURST_TX_RETRIES {
        if batch.is_empty() {
            break;
        }
        sent += txq.tx(batch);
    }
    sent
}

fn is_noop(e: &Error) -> bool {
    matches!(e.kind(), ErrorKind::NotImplemented)
}

/// Run one worker to completion. `logical_core` is the index used to compute
/// this worker's queue id and threaded into every hook call, per spec §4.5's
/// `lcore_index mod nb_rx_rings_per_port` rule and §9's explicit-index
/// re-architecture.
///
/// `state` is shared with the control thread (spec §3's per-core
/// `PerCoreAppState` array, readable by the control plane): the worker locks
/// it once per poll iteration rather than holding it for the run's
/// duration, so `control_infly` can observe a consistent, live snapshot
/// between bursts instead of a disjoint object no worker ever touches.
pub fn run_worker<H, State>(
    service: &DpdkService,
    hooks: &H,
    cfg: &RuntimeConfig,
    ports: &[PortView],
    logical_core: u32,
    state: &Mutex<State>,
    quit: &AtomicBool,
) -> Result<()>
where
    H: WorkerHooks<State>,
{
    let queue = logical_core % cfg.nb_rx_rings_per_port as u32;

    // TX queues are the hook's own concern (opened via the global service
    // accessor, typically during `process_enter`); the engine only owns the
    // rx side it polls unconditionally (spec §4.5's server role).
    let mut rxqs = Vec::with_capacity(ports.len());
    for port in ports {
        rxqs.push((port.physical_id, service.rx_queue(port.physical_id, queue as u16)?));
    }

    match hooks.process_enter(cfg, &mut state.lock().unwrap(), logical_core) {
        Ok(()) => {}
        Err(e) => {
            warn!(logical_core, error = %e, "process_enter failed, aborting worker");
            quit.store(true, Ordering::Release);
            return Err(e);
        }
    }
    info!(logical_core, queue, "worker entered");

    let mut ready_to_exit = false;
    while !quit.load(Ordering::Acquire) && !ready_to_exit {
        let mut guard = state.lock().unwrap();
        for (port_id, rxq) in rxqs.iter_mut() {
            let mut batch = ArrayVec::<Mbuf, MAX_RX_BURST>::new();
            let n = rxq.rx(&mut batch);
            if n == 0 {
                continue;
            }
            match hooks.process_pkt(&mut batch, cfg, &mut guard, queue as u16, *port_id) {
                Ok(()) => {}
                Err(e) if is_noop(&e) => {}
                Err(e) => warn!(logical_core, port_id, error = %e, "process_pkt reported an error"),
            }
            if !batch.is_empty() {
                if let Err(e) = hooks.process_pkt_drop(cfg, &mut guard, batch) {
                    if !is_noop(&e) {
                        warn!(logical_core, port_id, error = %e, "process_pkt_drop reported an error");
                    }
                }
            }
        }

        match hooks.process_client(cfg, &mut guard, queue as u16, &mut ready_to_exit) {
            Ok(()) => {}
            Err(e) if is_noop(&e) => {}
            Err(e) => warn!(logical_core, error = %e, "process_client reported an error"),
        }
        drop(guard);
    }

    match hooks.process_exit(cfg, &mut state.lock().unwrap(), logical_core) {
        Ok(()) => info!(logical_core, "worker exited cleanly"),
        Err(e) if is_noop(&e) => info!(logical_core, "worker exited"),
        Err(e) => warn!(logical_core, error = %e, "process_exit reported an error"),
    }

    Ok(())
}
