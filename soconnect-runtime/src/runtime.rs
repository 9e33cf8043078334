//! Top-level orchestrator: loads configuration, provisions pools, brings up
//! ports, then spawns and joins the worker/control threads (spec §5).
//!
//! Re-architected per spec §9: the framework is generic over an
//! application-supplied `Cfg` (which implements `WorkerHooks`/`ControlHooks`/
//! `AppConfig`) and a per-core `State`, rather than threading opaque
//! pointers through thread-local slots.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use soconnect_dpdk::DpdkService;
use soconnect_pkt::Result;
use tracing::{error, info};

use crate::config::RuntimeConfig;
use crate::control::{run_control, WallClock};
use crate::hooks::{AppConfig, ControlHooks, WorkerHooks};
use crate::memory::BufferPools;
use crate::port_init::init_ports;
use crate::worker::run_worker;

/// The control thread re-checks its cadence/duration conditions this often.
const CONTROL_TICK: Duration = Duration::from_millis(10);

pub struct Runtime<Cfg> {
    rt_config: RuntimeConfig,
    cfg: Cfg,
    quit: Arc<AtomicBool>,
    wall_clock: Arc<WallClock>,
}

impl<Cfg: AppConfig> Runtime<Cfg> {
    /// Spec §6's `init_app(rt, path)`: parse the config file, handing any
    /// key the framework doesn't recognize to `cfg.parse_app_kv_pair`, then
    /// call `cfg.init_app_internal`.
    pub fn init_app<P: AsRef<Path>>(path: P, mut cfg: Cfg) -> Result<Self> {
        let rt_config = RuntimeConfig::from_file(path, |key, value| cfg.parse_app_kv_pair(key, value))?;
        rt_config.validate()?;
        cfg.init_app_internal(&rt_config)?;
        Ok(Self { rt_config, cfg, quit: Arc::new(AtomicBool::new(false)), wall_clock: Arc::new(WallClock::new()) })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.rt_config
    }

    /// The application-supplied config/hooks object, for reading fields
    /// `init_app_internal` derived (e.g. a per-core pacing interval) before
    /// `run`'s `make_state` closures are built.
    pub fn app_config(&self) -> &Cfg {
        &self.cfg
    }

    pub fn wall_clock(&self) -> String {
        self.wall_clock.get()
    }
}

impl<Cfg> Runtime<Cfg>
where
    Cfg: Send + Sync + 'static,
{
    /// Provision pools, initialize ports, then spawn and join the worker and
    /// control threads. `make_state` builds the per-core `State` for each
    /// worker logical core; the resulting object is shared with the control
    /// thread (spec §3's `PerCoreAppState` array) behind a `Mutex`, not
    /// duplicated for it. `make_state` is called once per worker core, never
    /// concurrently with itself.
    pub fn run<State, F>(mut self, service: &'static DpdkService, make_state: F) -> Result<()>
    where
        Cfg: WorkerHooks<State> + ControlHooks<State> + AppConfig,
        State: Send + 'static,
        F: Fn(u32) -> State,
    {
        let quit_for_signal = self.quit.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            quit_for_signal.store(true, Ordering::Release);
        })
        .map_err(|e| soconnect_pkt::Error::internal(format!("failed to install signal handler: {e}")))?;

        let nb_ports = self.rt_config.port_mac.len();
        let socket_id = service.lcores().first().map(|l| l.socket_id).unwrap_or(0);
        let pools = BufferPools::provision(service, &self.rt_config, nb_ports, socket_id)?;
        let ports = init_ports(service, &self.rt_config, &pools)?;
        info!(nb_ports = ports.len(), "ports initialized");
        self.rt_config.ports = ports.clone();

        let cfg = Arc::new(self.cfg);
        let ports = Arc::new(ports);

        // One shared State per worker core (spec §3's per-core PerCoreAppState
        // array): the control thread reads the same objects the workers
        // write, rather than a disjoint copy of its own.
        let worker_ids = self.rt_config.used_core_ids.clone();
        let states: Vec<Arc<Mutex<State>>> =
            worker_ids.iter().map(|&logical_core| Arc::new(Mutex::new(make_state(logical_core)))).collect();

        let mut worker_handles = Vec::with_capacity(worker_ids.len());
        for (&logical_core, state) in worker_ids.iter().zip(&states) {
            let service = service;
            let cfg = cfg.clone();
            let ports = ports.clone();
            let quit = self.quit.clone();
            let rt_config = self.rt_config.clone();
            let state = state.clone();
            worker_handles.push(std::thread::spawn(move || -> Result<()> {
                service.lcore_bind(logical_core)?;
                run_worker(service, cfg.as_ref(), &rt_config, &ports, logical_core, &state, &quit)
            }));
        }

        let control_core = self.rt_config.control_core_id;
        let control_handle = {
            let cfg = cfg.clone();
            let quit = self.quit.clone();
            let wall_clock = self.wall_clock.clone();
            let rt_config = self.rt_config.clone();
            let worker_ids = worker_ids.clone();
            let states = states.clone();
            std::thread::spawn(move || -> Result<()> {
                service.lcore_bind(control_core)?;
                run_control(cfg.as_ref(), &rt_config, &states, &worker_ids, &wall_clock, &quit, CONTROL_TICK);
                Ok(())
            })
        };

        let mut first_err = None;
        for handle in worker_handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "worker returned an error");
                    first_err.get_or_insert(e);
                }
                Err(_) => error!("worker thread panicked"),
            }
        }
        self.quit.store(true, Ordering::Release);
        if control_handle.join().is_err() {
            error!("control thread panicked");
        }

        match Arc::try_unwrap(cfg) {
            Ok(mut cfg) => cfg.worker_all_exit(&self.rt_config)?,
            Err(_) => return Err(soconnect_pkt::Error::internal("worker threads outlived their handles")),
        }

        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(())
    }
}
