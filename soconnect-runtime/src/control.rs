//! Control-plane engine (spec §4.6): one supervisory thread pinned to the
//! control core, ticking the wall-clock string, the per-worker
//! `control_infly` cadence, and the test-duration cutoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::hooks::ControlHooks;

/// Shared human-readable wall-clock string, refreshed once per control tick.
pub struct WallClock(Mutex<String>);

impl WallClock {
    pub fn new() -> Self {
        Self(Mutex::new(String::new()))
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap().clone()
    }

    fn set(&self, value: String) {
        *self.0.lock().unwrap() = value;
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

struct WorkerTick {
    logical_core: u32,
    last_invocation: Instant,
}

/// Run the control plane until `quit` is observed. `worker_core_ids` is the
/// set of worker logical-core ids in the order `control_infly` is invoked
/// (spec §4.6: "for each worker in logical-core order"), and `states` is
/// the same order's shared per-worker state (spec §3's `PerCoreAppState`
/// array): every `control_*` call reads the real worker's state rather than
/// a control-private copy, locking only for the duration of the call.
pub fn run_control<H, State>(
    hooks: &H,
    cfg: &RuntimeConfig,
    states: &[Arc<Mutex<State>>],
    worker_core_ids: &[u32],
    wall_clock: &WallClock,
    quit: &AtomicBool,
    tick_period: Duration,
) where
    H: ControlHooks<State>,
{
    let mut ticks: Vec<WorkerTick> =
        worker_core_ids.iter().map(|&logical_core| WorkerTick { logical_core, last_invocation: Instant::now() }).collect();

    for (&logical_core, state) in worker_core_ids.iter().zip(states) {
        if let Err(e) = hooks.control_enter(cfg, &mut state.lock().unwrap(), logical_core) {
            if !matches!(e.kind(), soconnect_pkt::ErrorKind::NotImplemented) {
                warn!(logical_core, error = %e, "control_enter reported an error");
            }
        }
    }

    let interval = Duration::from_nanos(hooks.infly_interval_ns());
    let test_start = Instant::now();

    loop {
        if quit.load(Ordering::Acquire) {
            break;
        }

        wall_clock.set(format!("{:?}", std::time::SystemTime::now()));

        let now = Instant::now();
        for (tick, state) in ticks.iter_mut().zip(states) {
            if now.duration_since(tick.last_invocation) >= interval {
                let sampled_at = Instant::now();
                match hooks.control_infly(cfg, &mut state.lock().unwrap(), tick.logical_core) {
                    Ok(()) => debug!(logical_core = tick.logical_core, "control_infly ticked"),
                    Err(e) if matches!(e.kind(), soconnect_pkt::ErrorKind::NotImplemented) => {}
                    Err(e) => warn!(logical_core = tick.logical_core, error = %e, "control_infly reported an error"),
                }
                tick.last_invocation = sampled_at;
            }
        }

        if cfg.enable_test_duration_limit && now.duration_since(test_start) >= Duration::from_secs(cfg.test_duration_secs) {
            info!(elapsed_secs = cfg.test_duration_secs, "test duration limit reached, requesting shutdown");
            quit.store(true, Ordering::Release);
            break;
        }

        std::thread::sleep(tick_period);
    }

    for (&logical_core, state) in worker_core_ids.iter().zip(states) {
        if let Err(e) = hooks.control_exit(cfg, &mut state.lock().unwrap(), logical_core) {
            if !matches!(e.kind(), soconnect_pkt::ErrorKind::NotImplemented) {
                warn!(logical_core, error = %e, "control_exit reported an error");
            }
        }
    }
}
