//! High-precision rdtsc-based clock and per-core distribution generators
//! for SoConnect's client rate shaping.
//!
//! This crate only targets Linux/x86_64 and aarch64, the same platforms the
//! teacher's `rpkt-dpdk`/`rpkt-time` crates target.

mod rdtsc;
pub use rdtsc::{rdtsc as read_tsc, BaseFreq};

mod instant;
pub use instant::Instant;

mod dist;
pub use dist::{BimodalGenerator, DistributionGenerator, ExponentialGenerator, UniformGenerator};
