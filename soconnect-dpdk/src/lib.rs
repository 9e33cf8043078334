//! Safe wrapper over the SoConnect poll-mode driver boundary: mempools,
//! mbufs, port/queue setup, lcore detection and pinning, and the process-wide
//! [`service`] singleton. This crate is the concrete implementation of the
//! "out of scope, consumed only" driver primitives named in spec §6.

#![warn(rust_2018_idioms)]

mod error;
mod lcore;
mod mbuf;
mod mempool;
mod offload;
mod port;
mod service;

pub use error::{Error, Result};
pub use lcore::Lcore;
pub use mbuf::Mbuf;
pub use mempool::{Mempool, MempoolConf};
pub use offload::{
    DevRxOffload, DevTxOffload, MbufRxOffload, MbufTxOffload, RssHashFunc, DEFAULT_RSS_KEY_40B,
    DEFAULT_RSS_KEY_40B_ASYMMETRIC,
};
pub use port::{format_mac, DescLim, DevInfo, EthConf, PortStats, PortView, RxQueue, StatsQueryContext, TxQueue};
pub use service::{service, try_service, DpdkOption, DpdkService};
