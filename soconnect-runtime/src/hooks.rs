//! The application hook boundary (spec §6), re-architected per spec §9's
//! design notes: the framework is parameterized over two user types, `Cfg`
//! and `State`, instead of the original's opaque `void*` `internal_config`/
//! `per_core_app_meta` pointers. Per-core identity is threaded explicitly as
//! an index argument rather than read from thread-local state.

use arrayvec::ArrayVec;
use soconnect_dpdk::Mbuf;
use soconnect_pkt::Result as Status;

use crate::config::RuntimeConfig;

pub const MAX_RX_BURST: usize = 32;

/// Hooks invoked by one worker's tight poll loop. `State` is the per-core
/// application state the worker exclusively owns (spec §5: "single-writer by
/// construction").
pub trait WorkerHooks<State> {
    fn process_enter(&self, rt: &RuntimeConfig, state: &mut State, logical_core: u32) -> Status<()>;

    fn process_exit(&self, rt: &RuntimeConfig, state: &mut State, logical_core: u32) -> Status<()>;

    /// Server role: `pkts` is the just-received burst. Returning
    /// `Error::not_implemented` is treated as a no-op by the worker engine.
    fn process_pkt(
        &self,
        _pkts: &mut ArrayVec<Mbuf, MAX_RX_BURST>,
        _rt: &RuntimeConfig,
        _state: &mut State,
        _queue: u16,
        _recv_port: u16,
    ) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("process_pkt"))
    }

    fn process_pkt_drop(&self, _rt: &RuntimeConfig, _state: &mut State, _pkts: ArrayVec<Mbuf, MAX_RX_BURST>) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("process_pkt_drop"))
    }

    /// Client role: the hook paces its own sends (spec §4.7) and sets
    /// `ready_to_exit` once it has nothing left to do.
    fn process_client(&self, _rt: &RuntimeConfig, _state: &mut State, _queue: u16, _ready_to_exit: &mut bool) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("process_client"))
    }
}

/// Hooks invoked by the single control-plane thread.
pub trait ControlHooks<State> {
    fn control_enter(&self, _rt: &RuntimeConfig, _state: &mut State, _worker_core_id: u32) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("control_enter"))
    }

    fn control_infly(&self, _rt: &RuntimeConfig, _state: &mut State, _worker_core_id: u32) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("control_infly"))
    }

    fn control_exit(&self, _rt: &RuntimeConfig, _state: &mut State, _worker_core_id: u32) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented("control_exit"))
    }

    /// Nanoseconds between `control_infly` invocations for a given worker.
    fn infly_interval_ns(&self) -> u64;
}

/// The config-parsing / shutdown-aggregation surface each module supplies
/// (spec §6's `init_app`/`worker_all_exit`). Unlike `WorkerHooks`/
/// `ControlHooks` this trait has no per-core state to thread through: both
/// of its calls operate purely on the shared, read-only `RuntimeConfig`.
pub trait AppConfig {
    fn parse_app_kv_pair(&mut self, key: &str, value: &str) -> Status<()> {
        Err(soconnect_pkt::Error::not_implemented(format!("unrecognized key '{key}'")))
    }

    fn init_app_internal(&mut self, _rt: &RuntimeConfig) -> Status<()> {
        Ok(())
    }

    fn worker_all_exit(&mut self, _rt: &RuntimeConfig) -> Status<()> {
        Ok(())
    }
}
