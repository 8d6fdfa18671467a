//! Watcher supervision: spawning, liveness monitoring and drain.
//!
//! The [`Supervisor`] owns every watcher thread of the daemon. It is shared
//! by `Arc` between the signal handler side (tokio) and the blocking
//! monitor and drain calls, which run on `spawn_blocking` threads.
//!
//! # Lifecycle
//!
//! ```text
//! Init --spawn()--> Running --drain()--> Draining --> Stopped
//! ```
//!
//! Watchers are stopped cooperatively. A watcher whose producer ignores the
//! stop request is reported as stuck after the bounded drain and its thread
//! is abandoned.

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use logwatch_core::config::{SupervisorConfig, WatcherConfig};
use logwatch_core::error::{PluginError, PluginRole, WatcherError};
use logwatch_core::metrics as m;
use logwatch_core::stop::{STOP_POLL_SLICE, StopFlag};
use logwatch_pipeline::{PluginRegistry, Watcher, WatcherBuilder};

use crate::health::{SupervisorHealth, WatcherHealth, aggregate_status};

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// Created, nothing spawned yet.
    Init,
    /// Watchers spawned.
    Running,
    /// Stop requested, waiting for watcher threads.
    Draining,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why [`Supervisor::monitor`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The supervisor was asked to stop.
    Stopped,
    /// Every watcher thread has exited on its own.
    AllExited,
}

/// Outcome of [`Supervisor::drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Watchers whose thread exited.
    pub stopped: Vec<String>,
    /// Watchers still running after the last attempt.
    pub stuck: Vec<String>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.stuck.is_empty()
    }
}

struct Worker {
    watcher: Arc<Watcher>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Owner of all watcher threads.
pub struct Supervisor {
    config: SupervisorConfig,
    registry: PluginRegistry,
    debug: bool,
    state: Mutex<SupervisorState>,
    stop: StopFlag,
    workers: Mutex<Vec<Worker>>,
    started: Instant,
}

impl Supervisor {
    /// Creates an idle supervisor resolving plugins through `registry`.
    ///
    /// `debug` turns on per-plugin debug output in every watcher.
    pub fn new(config: SupervisorConfig, registry: PluginRegistry, debug: bool) -> Self {
        Self {
            config,
            registry,
            debug,
            state: Mutex::new(SupervisorState::Init),
            stop: StopFlag::new(),
            workers: Mutex::new(Vec::new()),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        *self.lock_state()
    }

    /// Builds and starts every enabled watcher, each on its own thread.
    ///
    /// A watcher that fails validation, names an unknown plugin, repeats an
    /// earlier name or cannot get a thread is logged and skipped; the others
    /// are unaffected. Returns the number of watchers started.
    pub fn spawn(&self, watchers: &[WatcherConfig]) -> usize {
        {
            let mut state = self.lock_state();
            if *state != SupervisorState::Init {
                warn!(state = %*state, "spawn called twice, ignoring");
                return 0;
            }
            *state = SupervisorState::Running;
        }

        let mut names = HashSet::new();
        let mut workers = self.workers();
        for config in watchers {
            if !config.enabled {
                info!(watcher = %config.name, "watcher disabled");
                continue;
            }
            if !names.insert(config.name.as_str()) {
                error!(watcher = %config.name, "duplicate watcher name, skipping");
                continue;
            }
            match self.start(config) {
                Ok(worker) => workers.push(worker),
                Err(e) => error!(watcher = %config.name, error = %e, "failed to start watcher, skipping"),
            }
        }

        let spawned = workers.len();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::WATCHERS_RUNNING).set(spawned as f64);
        if spawned == 0 {
            error!(configured = watchers.len(), "no watcher started");
        } else {
            info!(spawned, configured = watchers.len(), "watchers started");
        }
        spawned
    }

    fn start(&self, config: &WatcherConfig) -> Result<Worker, WatcherError> {
        // a plugin constructor that panics fails this watcher only
        let built = catch_unwind(AssertUnwindSafe(|| {
            WatcherBuilder::from_config(config, &self.registry, self.debug)?.build()
        }));
        let watcher = match built {
            Ok(result) => Arc::new(result?),
            Err(_) => {
                return Err(WatcherError::Plugin(PluginError::Failed(
                    "plugin construction panicked".to_owned(),
                )));
            }
        };
        let runner = Arc::clone(&watcher);
        let handle = thread::Builder::new()
            .name(format!("{}.watcher", config.name))
            .spawn(move || run_watcher(&runner))
            .map_err(|source| WatcherError::Spawn {
                name: config.name.clone(),
                source,
            })?;
        debug!(watcher = %config.name, "watcher thread spawned");
        Ok(Worker {
            watcher,
            handle: Some(handle),
        })
    }

    /// Blocks until the supervisor is stopped or every watcher has exited.
    ///
    /// Checks liveness every `monitor_interval` and warns whenever more
    /// watchers have died since the last check.
    pub fn monitor(&self) -> MonitorExit {
        let spawned = self.workers().len();
        let mut last_alive = spawned;
        loop {
            if !self.stop.sleep(self.config.monitor_interval()) {
                return MonitorExit::Stopped;
            }
            let health = self.health();
            let alive = health.alive();
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::WATCHERS_RUNNING).set(alive as f64);
            debug!(alive, spawned, status = %health.status, "watcher liveness");

            if alive == 0 {
                for watcher in &health.watchers {
                    error!(watcher = %watcher.name, state = %watcher.state, "watcher exited");
                }
                error!(spawned, "all watchers have exited");
                return MonitorExit::AllExited;
            }
            if alive < last_alive {
                warn!(alive, spawned, status = %health.status, "watchers have exited");
            }
            last_alive = alive;
        }
    }

    /// Stops every watcher and waits for their threads.
    ///
    /// Liveness is polled every `stop_poll_interval`, at most
    /// `stop_attempts` times. Watchers still alive after that are reported
    /// as stuck and left behind.
    pub fn drain(&self) -> DrainReport {
        self.set_state(SupervisorState::Draining);
        self.stop.raise();

        let mut workers = self.workers();
        for worker in workers.iter() {
            worker.watcher.stop();
        }
        info!(watchers = workers.len(), "stopping watchers");

        let attempts = self.config.stop_attempts;
        for attempt in 1..=attempts {
            let remaining = workers.iter().filter(|w| w.is_alive()).count();
            if remaining == 0 {
                break;
            }
            info!(remaining, attempt, attempts, "waiting for watchers to stop");
            wait_until(self.config.stop_poll_interval(), || {
                workers.iter().all(|w| !w.is_alive())
            });
        }

        let mut report = DrainReport::default();
        for worker in workers.iter_mut() {
            let name = worker.watcher.name().to_owned();
            if worker.is_alive() {
                warn!(watcher = %name, state = %worker.watcher.state(), "watcher did not stop, abandoning its thread");
                report.stuck.push(name);
            } else {
                if let Some(handle) = worker.handle.take() {
                    let _ = handle.join();
                }
                report.stopped.push(name);
            }
        }
        drop(workers);

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::WATCHERS_RUNNING).set(report.stuck.len() as f64);
        self.set_state(SupervisorState::Stopped);
        info!(
            stopped = report.stopped.len(),
            stuck = report.stuck.len(),
            "supervisor stopped"
        );
        report
    }

    /// Current health of every spawned watcher.
    pub fn health(&self) -> SupervisorHealth {
        let watchers: Vec<WatcherHealth> = self
            .workers()
            .iter()
            .map(|w| {
                WatcherHealth::new(w.watcher.name(), w.is_alive(), w.watcher.state().to_string())
            })
            .collect();
        SupervisorHealth {
            state: self.state(),
            status: aggregate_status(&watchers),
            uptime_secs: self.started.elapsed().as_secs(),
            watchers,
        }
    }

    fn workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SupervisorState) {
        *self.lock_state() = state;
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state())
            .field("watchers", &self.workers().len())
            .finish()
    }
}

/// Thread body of one watcher. Nothing escapes it unlogged.
fn run_watcher(watcher: &Arc<Watcher>) {
    match catch_unwind(AssertUnwindSafe(|| watcher.run())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(watcher = watcher.name(), error = %e, "watcher failed"),
        Err(_) => error!(watcher = watcher.name(), "watcher thread panicked"),
    }
}

/// Sleeps until `done` holds or `timeout` elapses, polling in short slices.
fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !done() {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL_SLICE));
    }
}

/// Checks watcher definitions without constructing any plugin.
///
/// Used by `--validate`: reports invalid options, duplicate names and
/// plugin kinds missing from `registry`. An empty result means the
/// definitions are usable.
pub fn check_watchers(watchers: &[WatcherConfig], registry: &PluginRegistry) -> Vec<String> {
    let mut problems = Vec::new();
    let mut names = HashSet::new();
    for config in watchers {
        if let Err(e) = config.validate() {
            problems.push(format!("watcher '{}': {e}", config.name));
        }
        if !names.insert(config.name.as_str()) {
            problems.push(format!("watcher '{}': duplicate name", config.name));
        }
        let specs = std::iter::once((PluginRole::Producer, &config.producer))
            .chain(config.filters.iter().map(|s| (PluginRole::Filter, s)))
            .chain(config.conditioners.iter().map(|s| (PluginRole::Conditioner, s)))
            .chain(config.consumers.iter().map(|s| (PluginRole::Consumer, s)));
        for (role, spec) in specs {
            let kind = spec.kind.to_ascii_lowercase();
            if !registry.kinds(role).contains(&kind.as_str()) {
                problems.push(format!(
                    "watcher '{}': unknown {role} plugin '{}'",
                    config.name, spec.kind
                ));
            }
        }
    }
    problems
}
