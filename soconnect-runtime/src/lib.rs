#![warn(rust_2018_idioms)]

//! The SoConnect runtime: configuration loading, memory/port bring-up, the
//! per-core worker and control-plane engines, and tail-latency
//! instrumentation built on top of `soconnect-dpdk`'s driver wrapper.

mod config;
mod control;
mod hooks;
mod latency;
mod lcore;
mod memory;
mod port_init;
mod runtime;
mod worker;

pub use config::{HashField, RuntimeConfig};
pub use control::{run_control, WallClock};
pub use hooks::{AppConfig, ControlHooks, WorkerHooks, MAX_RX_BURST};
pub use latency::{fuse_sec_usec, merge_sort, percentile, tail_latency, TailLatency, TsRing, RING_CAPACITY};
pub use lcore::Lcore;
pub use memory::BufferPools;
pub use port_init::init_ports;
pub use runtime::Runtime;
pub use worker::{run_worker, tx_burst_retrying, BURST_TX_RETRIES};
