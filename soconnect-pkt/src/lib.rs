#![warn(missing_debug_implementations, rust_2018_idioms)]
#![no_std]

//! Packet-header toolkit, RSS calculator and wire-format timestamp table
//! shared by every SoConnect crate.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod error;
pub use error::{Error, ErrorKind, Result};

pub mod netbytes;
pub mod checksum;

pub mod ether;
pub mod vlan;
pub mod ipv4;
pub mod ipv6;
pub mod udp;
pub mod tcp;
pub mod sctp;

pub mod rss;
pub mod tstable;
pub mod hdr;
