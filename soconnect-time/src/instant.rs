//! A monotonically non-decreasing clock backed by the TSC, ported from the
//! teacher's `rpkt-time/src/instant.rs` (itself adapted from minstant).
//! Conversion to/from wall-clock durations goes through a caller-supplied
//! `BaseFreq` rather than minstant's sysfs-calibrated `Anchor`, since this
//! crate derives its own calibration in `rdtsc.rs`.

use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::Duration;

use crate::rdtsc::{rdtsc, BaseFreq};

/// A raw TSC sample. Cheap to take; convert to `Duration` via `BaseFreq`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Instant(u64);

impl Instant {
    #[inline]
    pub fn now() -> Instant {
        Instant(rdtsc())
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn duration_since(&self, earlier: Instant, base_freq: &BaseFreq) -> Duration {
        self.checked_duration_since(earlier, base_freq).unwrap_or_default()
    }

    #[inline]
    pub fn checked_duration_since(&self, earlier: Instant, base_freq: &BaseFreq) -> Option<Duration> {
        let cycles = self.0.checked_sub(earlier.0)?;
        Some(Duration::from_nanos(base_freq.cycles_to_ns(cycles) as u64))
    }

    #[inline]
    pub fn elapsed(&self, base_freq: &BaseFreq) -> Duration {
        Instant::now().duration_since(*self, base_freq)
    }

    #[inline]
    pub fn checked_add(&self, duration: Duration, base_freq: &BaseFreq) -> Option<Instant> {
        self.0
            .checked_add(base_freq.ns_to_cycles(duration.as_nanos() as f64))
            .map(Instant)
    }
}

/// Add/subtract cycle counts directly, for rate-shaping code that compares
/// two `Instant`s without going through a `Duration` (spec §4.7: rate
/// shaping is a timestamp comparison, not a sleep).
impl Add<u64> for Instant {
    type Output = Instant;

    #[inline]
    fn add(self, cycles: u64) -> Instant {
        Instant(self.0.wrapping_add(cycles))
    }
}

impl AddAssign<u64> for Instant {
    #[inline]
    fn add_assign(&mut self, cycles: u64) {
        self.0 = self.0.wrapping_add(cycles);
    }
}

impl Sub<u64> for Instant {
    type Output = Instant;

    #[inline]
    fn sub(self, cycles: u64) -> Instant {
        Instant(self.0.wrapping_sub(cycles))
    }
}

impl SubAssign<u64> for Instant {
    #[inline]
    fn sub_assign(&mut self, cycles: u64) {
        self.0 = self.0.wrapping_sub(cycles);
    }
}

impl Sub<Instant> for Instant {
    type Output = u64;

    #[inline]
    fn sub(self, other: Instant) -> u64 {
        self.0.saturating_sub(other.0)
    }
}
