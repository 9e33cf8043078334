//! Thin re-export of the driver's lcore abstraction; no new logic here, the
//! runtime only needs to bind worker/control threads to their cores.

pub use soconnect_dpdk::Lcore;
